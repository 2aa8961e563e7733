//! Turn a sample stream into passive and active training transitions

use tracing::debug;

use crate::domain::{OperationState, TrainingSample};
use crate::error::EngineError;
use crate::ml::{ActiveFeatures, TimeFeatures};

/// One step with the unit off
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassiveObservation {
    pub prev_indoor: f64,
    pub prev_outdoor: f64,
    pub indoor: f64,
}

impl PassiveObservation {
    /// Regressor input `x = outdoor(t-1) − indoor(t-1)`
    pub fn drive(&self) -> f64 {
        self.prev_outdoor - self.prev_indoor
    }

    /// Regressor target `y = indoor(t) − indoor(t-1)`
    pub fn change(&self) -> f64 {
        self.indoor - self.prev_indoor
    }
}

/// One step with the unit on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveObservation {
    pub passive: PassiveObservation,
    /// Outdoor temperature and calendar are those of sample `t`
    pub features: ActiveFeatures,
    pub energy: f64,
}

impl ActiveObservation {
    /// Temperature change left over after passive relaxation
    pub fn delta_t(&self, a_coefficient: f64) -> f64 {
        self.passive.change() - a_coefficient * self.passive.drive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedData {
    pub passive: Vec<PassiveObservation>,
    pub active: Vec<ActiveObservation>,
    /// Mean energy over every OFF sample
    pub avg_consumption_off: f64,
    pub sample_count: usize,
}

/// Pair consecutive samples and split the pairs by the state of the later
/// sample. ON pairs without a reported setpoint are dropped.
pub fn prepare(samples: &[TrainingSample]) -> Result<PreparedData, EngineError> {
    let mut passive = Vec::new();
    let mut active = Vec::new();
    let mut off_energy = Vec::new();
    let mut missing_setpoint = 0usize;

    for pair in samples.windows(2) {
        let (prev, current) = (&pair[0], &pair[1]);
        let observation = PassiveObservation {
            prev_indoor: prev.indoor_temp,
            prev_outdoor: prev.outdoor_temp,
            indoor: current.indoor_temp,
        };

        match current.operation {
            OperationState::Off => {
                passive.push(observation);
                off_energy.push(current.energy_consumption);
            }
            OperationState::On => {
                let Some(setpoint) = current.setpoint else {
                    missing_setpoint += 1;
                    continue;
                };
                active.push(ActiveObservation {
                    passive: observation,
                    features: ActiveFeatures::new(
                        prev.indoor_temp,
                        current.outdoor_temp,
                        setpoint,
                        TimeFeatures::from_datetime(&current.timestamp),
                    ),
                    energy: current.energy_consumption,
                });
            }
        }
    }

    if missing_setpoint > 0 {
        debug!(missing_setpoint, "dropped ON transitions without a setpoint");
    }

    if passive.is_empty() {
        return Err(EngineError::NoTrainingData(OperationState::Off));
    }
    if active.is_empty() {
        return Err(EngineError::NoTrainingData(OperationState::On));
    }

    // Mean over OFF transitions only
    let avg_consumption_off = off_energy.iter().sum::<f64>() / off_energy.len() as f64;

    Ok(PreparedData {
        passive,
        active,
        avg_consumption_off,
        sample_count: samples.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_timestamp;

    fn ts(value: &str) -> chrono::NaiveDateTime {
        parse_timestamp(value).unwrap()
    }

    #[test]
    fn test_transitions_split_by_later_state() {
        let samples = vec![
            TrainingSample::off(ts("01/07/2024 10:00"), 25.0, 30.0, 0.2),
            TrainingSample::off(ts("01/07/2024 10:05"), 25.5, 30.0, 0.4),
            TrainingSample::on(ts("01/07/2024 10:10"), 25.0, 31.0, 1.5, 23.0),
            TrainingSample::off(ts("01/07/2024 10:15"), 25.2, 31.0, 0.3),
        ];

        let prepared = prepare(&samples).unwrap();
        assert_eq!(prepared.passive.len(), 2);
        assert_eq!(prepared.active.len(), 1);
        assert_eq!(prepared.sample_count, 4);
        // 0.4 and 0.3; the first sample starts no transition
        assert!((prepared.avg_consumption_off - 0.35).abs() < 1e-12);

        let first = prepared.passive[0];
        assert_eq!(first.drive(), 5.0);
        assert_eq!(first.change(), 0.5);

        let on = prepared.active[0];
        assert_eq!(on.features.prev_indoor_temp, 25.5);
        assert_eq!(on.features.outdoor_temp, 31.0);
        assert_eq!(on.features.time.minute, 10);
        // change -0.5, drive 4.5
        assert!((on.delta_t(0.1) - (-0.95)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_partitions() {
        let off_only = vec![
            TrainingSample::off(ts("01/07/2024 10:00"), 25.0, 30.0, 0.2),
            TrainingSample::off(ts("01/07/2024 10:05"), 25.5, 30.0, 0.2),
        ];
        assert_eq!(
            prepare(&off_only).unwrap_err(),
            EngineError::NoTrainingData(OperationState::On)
        );

        let on_only = vec![
            TrainingSample::on(ts("01/07/2024 10:00"), 25.0, 30.0, 1.0, 23.0),
            TrainingSample::on(ts("01/07/2024 10:05"), 24.5, 30.0, 1.0, 23.0),
        ];
        assert_eq!(
            prepare(&on_only).unwrap_err(),
            EngineError::NoTrainingData(OperationState::Off)
        );

        assert_eq!(
            prepare(&[]).unwrap_err(),
            EngineError::NoTrainingData(OperationState::Off)
        );
    }

    #[test]
    fn test_on_without_setpoint_is_dropped() {
        let mut on = TrainingSample::on(ts("01/07/2024 10:05"), 24.5, 30.0, 1.0, 23.0);
        on.setpoint = None;
        let samples = vec![
            TrainingSample::off(ts("01/07/2024 10:00"), 25.0, 30.0, 0.2),
            on,
            TrainingSample::off(ts("01/07/2024 10:10"), 24.8, 30.0, 0.2),
        ];
        assert_eq!(
            prepare(&samples).unwrap_err(),
            EngineError::NoTrainingData(OperationState::On)
        );
    }
}
