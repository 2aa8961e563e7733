//! Location-aware HVAC energy optimization engine.
//!
//! Fits a two-stage thermal model per site from historical sensor data,
//! simulates indoor temperature and energy under on/off schedules, and
//! searches for the schedule with the lowest energy/comfort/switching score.

pub mod config;
pub mod domain;
pub mod error;
pub mod ml;
pub mod optimizer;
pub mod repo;
pub mod service;
pub mod simulation;
pub mod telemetry;
pub mod training;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::EngineError;
