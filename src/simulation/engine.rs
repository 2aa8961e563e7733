use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::StepClock;
use crate::domain::{clamp_duration, OperationSchedule, OperationState, TrainedModel};
use crate::error::EngineError;
use crate::ml::ActiveFeatures;

/// Fixed conditions a schedule is simulated under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub starting_temp: f64,
    pub starting_time: NaiveDateTime,
    /// `duration + 1` outdoor temperatures; index 0 is the starting instant
    pub outdoor_forecast: Vec<f64>,
    pub setpoint: f64,
}

impl Scenario {
    pub fn new(
        starting_temp: f64,
        starting_time: NaiveDateTime,
        outdoor_forecast: Vec<f64>,
        setpoint: f64,
    ) -> Self {
        Self {
            starting_temp,
            starting_time,
            outdoor_forecast,
            setpoint,
        }
    }

    /// Number of steps the forecast covers
    pub fn duration(&self) -> usize {
        self.outdoor_forecast.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub total_energy: f64,
    /// `[T_0 .. T_duration]`
    pub temperatures: Vec<f64>,
}

impl SimulationResult {
    pub fn final_temperature(&self) -> f64 {
        self.temperatures.last().copied().unwrap_or(f64::NAN)
    }
}

/// Steps indoor temperature and energy forward under an on/off schedule
#[derive(Debug, Clone)]
pub struct SimulationEngine {
    model: Arc<TrainedModel>,
}

impl SimulationEngine {
    pub fn new(model: Arc<TrainedModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn simulate(
        &self,
        schedule: &OperationSchedule,
        scenario: &Scenario,
    ) -> Result<SimulationResult> {
        let model = self.model.ready()?;

        let duration = schedule.len();
        if clamp_duration(duration as i64) != duration {
            return Err(EngineError::InvalidScheduleLength {
                expected: clamp_duration(duration as i64),
                actual: duration,
            }
            .into());
        }
        if scenario.outdoor_forecast.len() != duration + 1 {
            return Err(EngineError::InvalidScheduleLength {
                expected: duration + 1,
                actual: scenario.outdoor_forecast.len(),
            }
            .into());
        }

        let a = model.a_coefficient;
        let outdoor = &scenario.outdoor_forecast;
        let mut clock = StepClock::new(scenario.starting_time);
        let mut temperatures = Vec::with_capacity(duration + 1);
        temperatures.push(scenario.starting_temp);
        let mut total_energy = 0.0;

        for (i, state) in schedule.iter().enumerate() {
            let current = temperatures[i];
            let passive = current + a * (outdoor[i + 1] - current);

            let next = match state {
                OperationState::On => {
                    let features = ActiveFeatures::new(
                        current,
                        outdoor[i + 1],
                        scenario.setpoint,
                        clock.features(),
                    );
                    let prediction = model.regressor.predict(&features)?;
                    total_energy += prediction.energy;
                    passive + prediction.delta_t
                }
                OperationState::Off => {
                    total_energy += model.avg_consumption_off;
                    passive
                }
            };

            temperatures.push(next);
            clock.advance();
        }

        Ok(SimulationResult {
            total_energy,
            temperatures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{parse_timestamp, Location};
    use crate::fixtures::FixedRegressor;

    fn engine(a: f64, avg_off: f64, regressor: FixedRegressor) -> SimulationEngine {
        let model = TrainedModel::new(Location::new(0.0, 0.0), a, avg_off, Arc::new(regressor));
        SimulationEngine::new(Arc::new(model))
    }

    fn scenario(outdoor: Vec<f64>) -> Scenario {
        Scenario::new(25.0, parse_timestamp("15/07/2024 14:00").unwrap(), outdoor, 24.0)
    }

    #[test]
    fn test_all_off_passive_relaxation() {
        let engine = engine(0.1, 0.2, FixedRegressor::new(1.0, -0.3));
        let result = engine
            .simulate(&OperationSchedule::all_off(4), &scenario(vec![20.0; 5]))
            .unwrap();

        let expected = [25.0, 24.5, 24.05, 23.645, 23.2805];
        for (got, want) in result.temperatures.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
        assert!((result.total_energy - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_on_step_adds_regressor_delta() {
        let engine = engine(0.1, 0.2, FixedRegressor::new(1.5, -0.4));
        let schedule = OperationSchedule::from_flags(&[1, 0]).unwrap();
        let result = engine.simulate(&schedule, &scenario(vec![30.0, 20.0, 20.0])).unwrap();

        // T1 = 25 + 0.1 * (20 - 25) - 0.4
        assert!((result.temperatures[1] - 24.1).abs() < 1e-9);
        // T2 = 24.1 + 0.1 * (20 - 24.1)
        assert!((result.temperatures[2] - 23.69).abs() < 1e-9);
        assert!((result.total_energy - 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_regressor_sees_step_clock_and_next_outdoor() {
        let regressor = FixedRegressor::new(1.0, 0.0);
        let engine = engine(0.1, 0.2, regressor.clone());
        let start = parse_timestamp("15/07/2024 23:55").unwrap();
        let scenario = Scenario::new(25.0, start, vec![10.0, 11.0, 12.0], 23.0);

        engine.simulate(&OperationSchedule::all_on(2), &scenario).unwrap();

        let seen = regressor.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].outdoor_temp, 11.0);
        assert_eq!(seen[1].outdoor_temp, 12.0);
        assert_eq!((seen[0].time.hour, seen[0].time.minute), (23, 55));
        assert_eq!((seen[1].time.hour, seen[1].time.minute), (0, 0));
        assert_eq!(seen[1].time.day_of_week, 1);
        assert_eq!(seen[0].setpoint, 23.0);
    }

    #[test]
    fn test_forecast_length_is_validated() {
        let engine = engine(0.1, 0.2, FixedRegressor::new(1.0, 0.0));
        let err = engine
            .simulate(&OperationSchedule::all_off(4), &scenario(vec![20.0; 4]))
            .unwrap_err();
        assert_eq!(
            EngineError::find(&err),
            Some(&EngineError::InvalidScheduleLength { expected: 5, actual: 4 })
        );
    }

    #[test]
    fn test_empty_schedule_is_rejected() {
        let engine = engine(0.1, 0.2, FixedRegressor::new(1.0, 0.0));
        let err = engine
            .simulate(&OperationSchedule::new(Vec::new()), &scenario(vec![20.0]))
            .unwrap_err();
        assert!(matches!(
            EngineError::find(&err),
            Some(EngineError::InvalidScheduleLength { actual: 0, .. })
        ));
    }

    #[test]
    fn test_unready_model_fails() {
        let mut model = TrainedModel::new(
            Location::new(0.0, 0.0),
            0.1,
            0.2,
            Arc::new(FixedRegressor::new(1.0, 0.0)),
        );
        model.regressor = None;
        let engine = SimulationEngine::new(Arc::new(model));

        let err = engine
            .simulate(&OperationSchedule::all_off(4), &scenario(vec![20.0; 5]))
            .unwrap_err();
        assert_eq!(EngineError::find(&err), Some(&EngineError::ModelNotTrained));
    }
}
