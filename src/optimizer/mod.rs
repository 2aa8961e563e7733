//! Schedule optimization
//!
//! - Evaluator: penalty function over a simulated trajectory
//! - Search: exhaustive enumeration of schedules with at most two switches
//! - Strategies: peak (search) and normal-conditions (all-OFF heuristic first)

pub mod evaluator;
pub mod search;
pub mod strategies;

pub use evaluator::*;
pub use search::*;
pub use strategies::*;
