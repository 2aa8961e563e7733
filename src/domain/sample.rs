use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::EngineError;

/// Wall-clock format used by sensor exports and prediction requests
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Parse a `DD/MM/YYYY HH:MM` timestamp
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, EngineError> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .map_err(|_| EngineError::InvalidStartingTime(value.to_string()))
}

/// HVAC operation flag. Serialized as `0`/`1` to match sensor exports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "lowercase")]
pub enum OperationState {
    Off,
    On,
}

impl OperationState {
    pub fn is_on(self) -> bool {
        matches!(self, OperationState::On)
    }

    pub fn toggled(self) -> Self {
        match self {
            OperationState::Off => OperationState::On,
            OperationState::On => OperationState::Off,
        }
    }
}

impl TryFrom<u8> for OperationState {
    type Error = EngineError;

    fn try_from(flag: u8) -> Result<Self, Self::Error> {
        match flag {
            0 => Ok(OperationState::Off),
            1 => Ok(OperationState::On),
            other => Err(EngineError::InvalidRequest(format!(
                "operation flag must be 0 or 1, got {other}"
            ))),
        }
    }
}

impl From<OperationState> for u8 {
    fn from(state: OperationState) -> Self {
        match state {
            OperationState::Off => 0,
            OperationState::On => 1,
        }
    }
}

/// One historical sensor reading (5-minute cadence)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub timestamp: NaiveDateTime,
    pub indoor_temp: f64,
    pub outdoor_temp: f64,
    pub operation: OperationState,
    pub energy_consumption: f64,
    /// Only reported while the unit runs
    pub setpoint: Option<f64>,
    pub inlet_temp: Option<f64>,
    pub outlet_temp: Option<f64>,
}

impl TrainingSample {
    pub fn off(timestamp: NaiveDateTime, indoor_temp: f64, outdoor_temp: f64, energy: f64) -> Self {
        Self {
            timestamp,
            indoor_temp,
            outdoor_temp,
            operation: OperationState::Off,
            energy_consumption: energy,
            setpoint: None,
            inlet_temp: None,
            outlet_temp: None,
        }
    }

    pub fn on(
        timestamp: NaiveDateTime,
        indoor_temp: f64,
        outdoor_temp: f64,
        energy: f64,
        setpoint: f64,
    ) -> Self {
        Self {
            timestamp,
            indoor_temp,
            outdoor_temp,
            operation: OperationState::On,
            energy_consumption: energy,
            setpoint: Some(setpoint),
            inlet_temp: None,
            outlet_temp: None,
        }
    }
}
