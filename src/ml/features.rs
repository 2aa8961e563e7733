//! Feature engineering for the active (HVAC on) regressor

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Column order of [`ActiveFeatures::to_vec`]
pub const ACTIVE_FEATURE_NAMES: [&str; 7] = [
    "prev_indoor_temp",
    "outdoor_temp",
    "setpoint",
    "hour",
    "minute",
    "day_of_week",
    "month",
];

/// Calendar features of one simulation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFeatures {
    /// Hour of day (0-23)
    pub hour: u32,
    /// Minute of hour (0-59)
    pub minute: u32,
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: u32,
    /// Month (1-12)
    pub month: u32,
}

impl TimeFeatures {
    pub fn from_datetime(timestamp: &NaiveDateTime) -> Self {
        Self {
            hour: timestamp.hour(),
            minute: timestamp.minute(),
            day_of_week: timestamp.weekday().num_days_from_monday(),
            month: timestamp.month(),
        }
    }
}

/// Input row of the active regressor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveFeatures {
    pub prev_indoor_temp: f64,
    pub outdoor_temp: f64,
    pub setpoint: f64,
    pub time: TimeFeatures,
}

impl ActiveFeatures {
    pub fn new(
        prev_indoor_temp: f64,
        outdoor_temp: f64,
        setpoint: f64,
        time: TimeFeatures,
    ) -> Self {
        Self {
            prev_indoor_temp,
            outdoor_temp,
            setpoint,
            time,
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.prev_indoor_temp,
            self.outdoor_temp,
            self.setpoint,
            self.time.hour as f64,
            self.time.minute as f64,
            self.time.day_of_week as f64,
            self.time.month as f64,
        ]
    }
}
