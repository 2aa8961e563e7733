use serde::{Deserialize, Serialize};

use super::OperationState;
use crate::error::EngineError;

/// Simulation step length
pub const STEP_MINUTES: i64 = 5;
/// Shortest horizon (one step)
pub const MIN_DURATION: usize = 1;
/// Longest horizon (24 hours of 5-minute steps)
pub const MAX_DURATION: usize = 288;
/// One hour
pub const DEFAULT_DURATION: usize = 12;

/// Bound a requested horizon to `[MIN_DURATION, MAX_DURATION]` steps
pub fn clamp_duration(duration: i64) -> usize {
    duration.clamp(MIN_DURATION as i64, MAX_DURATION as i64) as usize
}

/// On/off plan for the next `len()` 5-minute steps
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationSchedule(Vec<OperationState>);

impl OperationSchedule {
    pub fn new(states: Vec<OperationState>) -> Self {
        Self(states)
    }

    pub fn from_flags(flags: &[u8]) -> Result<Self, EngineError> {
        flags
            .iter()
            .map(|flag| OperationState::try_from(*flag))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn constant(state: OperationState, duration: usize) -> Self {
        Self(vec![state; duration])
    }

    pub fn all_on(duration: usize) -> Self {
        Self::constant(OperationState::On, duration)
    }

    pub fn all_off(duration: usize) -> Self {
        Self::constant(OperationState::Off, duration)
    }

    /// Build a schedule that starts in `initial` and flips state at each
    /// listed step (the flip applies to that step itself).
    pub fn with_switches(
        initial: OperationState,
        switch_positions: &[usize],
        duration: usize,
    ) -> Self {
        let mut current = initial;
        let states = (0..duration)
            .map(|step| {
                if switch_positions.contains(&step) {
                    current = current.toggled();
                }
                current
            })
            .collect();
        Self(states)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn states(&self) -> &[OperationState] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = OperationState> + '_ {
        self.0.iter().copied()
    }

    /// Number of steps whose state differs from the previous step
    pub fn switch_count(&self) -> usize {
        self.0.windows(2).filter(|pair| pair[0] != pair[1]).count()
    }

    pub fn to_flags(&self) -> Vec<u8> {
        self.0.iter().map(|state| u8::from(*state)).collect()
    }

    /// Fail with `InvalidScheduleLength` unless the schedule spans `expected` steps
    pub fn ensure_len(&self, expected: usize) -> Result<(), EngineError> {
        if self.len() != expected {
            return Err(EngineError::InvalidScheduleLength {
                expected,
                actual: self.len(),
            });
        }
        Ok(())
    }
}
