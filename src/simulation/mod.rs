//! # Thermal Simulation Module
//!
//! Rolls a trained site model forward over a 5-minute on/off schedule.
//!
//! ## Components
//!
//! - **StepClock**: calendar-correct wall clock that drives the time features
//! - **SimulationEngine**: applies passive relaxation every step and adds the
//!   active regressor's energy and temperature change on ON steps
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hvac_optimizer::simulation::{Scenario, SimulationEngine};
//!
//! let engine = SimulationEngine::new(model);
//! let scenario = Scenario::new(25.0, start, outdoor_forecast, 24.0);
//! let result = engine.simulate(&schedule, &scenario)?;
//! println!("{} kWh, ends at {}", result.total_energy, result.final_temperature());
//! ```

pub mod clock;
pub mod engine;

pub use clock::StepClock;
pub use engine::{Scenario, SimulationEngine, SimulationResult};
