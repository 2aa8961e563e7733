use chrono::{Duration, NaiveDateTime};

use crate::domain::STEP_MINUTES;
use crate::ml::TimeFeatures;

/// Wall clock advanced in fixed 5-minute steps.
///
/// Calendar arithmetic is delegated to chrono, so hour, day, month and year
/// roll over exactly (including month lengths and leap days).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepClock {
    current: NaiveDateTime,
}

impl StepClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self { current: start }
    }

    pub fn features(&self) -> TimeFeatures {
        TimeFeatures::from_datetime(&self.current)
    }

    pub fn advance(&mut self) {
        self.current += Duration::minutes(STEP_MINUTES);
    }
}
