//! Helpers shared by the integration tests

#![allow(dead_code)]

use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use std::sync::Arc;

use hvac_optimizer::domain::{parse_timestamp, Location, TrainedModel, TrainingSample};
use hvac_optimizer::ml::{ActiveFeatures, ActivePrediction, ActiveRegressor};
use hvac_optimizer::simulation::{Scenario, SimulationEngine};

/// Regressor answering the same energy and ΔT for every input
#[derive(Debug, Clone, Copy)]
pub struct ConstantRegressor(pub ActivePrediction);

impl ActiveRegressor for ConstantRegressor {
    fn predict(&self, _features: &ActiveFeatures) -> Result<ActivePrediction> {
        Ok(self.0)
    }

    fn to_artifact(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }
}

pub fn start_time() -> NaiveDateTime {
    parse_timestamp("15/07/2024 14:00").unwrap()
}

pub fn engine(a: f64, avg_off: f64, energy: f64, delta_t: f64) -> SimulationEngine {
    let regressor = ConstantRegressor(ActivePrediction { energy, delta_t });
    let model = TrainedModel::new(Location::new(40.0, -3.7), a, avg_off, Arc::new(regressor));
    SimulationEngine::new(Arc::new(model))
}

pub fn scenario(starting_temp: f64, outdoor: f64, steps: usize, setpoint: f64) -> Scenario {
    Scenario::new(starting_temp, start_time(), vec![outdoor; steps + 1], setpoint)
}

/// Six OFF then six ON steps, repeated. OFF follows
/// `T' = T + a·(out − T)`, ON additionally cools by 0.4°.
pub fn samples(count: usize, a: f64) -> Vec<TrainingSample> {
    let start = parse_timestamp("01/07/2024 00:00").unwrap();
    let outdoor = |t: usize| 30.0 + 3.0 * (t as f64 / 20.0).sin();

    let mut out = Vec::with_capacity(count);
    let mut indoor = 26.0;
    for t in 0..count {
        let timestamp = start + Duration::minutes(5 * t as i64);
        let on = t > 0 && (t / 6) % 2 == 1;
        if t > 0 {
            let prev = indoor;
            indoor = prev + a * (outdoor(t - 1) - prev) - if on { 0.4 } else { 0.0 };
            if on {
                let energy = 1.0 + 0.1 * (prev - 23.0);
                out.push(TrainingSample::on(timestamp, indoor, outdoor(t), energy, 23.0));
                continue;
            }
        }
        out.push(TrainingSample::off(timestamp, indoor, outdoor(t), 0.1));
    }
    out
}
