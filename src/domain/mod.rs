pub mod history;
pub mod location;
pub mod model;
pub mod sample;
pub mod schedule;

pub use history::*;
pub use location::*;
pub use model::*;
pub use sample::*;
pub use schedule::*;
