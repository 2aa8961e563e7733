//! Shared unit-test helpers

use anyhow::Result;
use chrono::Duration;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::domain::{parse_timestamp, TrainingSample};
use crate::ml::{ActiveFeatures, ActivePrediction, ActiveRegressor};

/// Regressor with a constant answer that records what it was asked
#[derive(Debug, Clone)]
pub struct FixedRegressor {
    prediction: ActivePrediction,
    seen: Arc<Mutex<Vec<ActiveFeatures>>>,
}

impl FixedRegressor {
    pub fn new(energy: f64, delta_t: f64) -> Self {
        Self {
            prediction: ActivePrediction { energy, delta_t },
            seen: Arc::default(),
        }
    }

    pub fn seen(&self) -> Vec<ActiveFeatures> {
        self.seen.lock().clone()
    }
}

impl ActiveRegressor for FixedRegressor {
    fn predict(&self, features: &ActiveFeatures) -> Result<ActivePrediction> {
        self.seen.lock().push(*features);
        Ok(self.prediction)
    }

    fn to_artifact(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.prediction)?)
    }
}

/// Noise-free 5-minute stream following the passive law with coefficient
/// `a`, alternating six OFF and six ON steps. ON steps cool by 0.4°.
pub fn synthetic_samples(count: usize, a: f64) -> Vec<TrainingSample> {
    let Ok(start) = parse_timestamp("01/07/2024 00:00") else {
        return Vec::new();
    };
    let outdoor = |t: usize| 30.0 + 3.0 * (t as f64 / 20.0).sin();

    let mut samples = Vec::with_capacity(count);
    let mut indoor = 26.0;
    for t in 0..count {
        let timestamp = start + Duration::minutes(5 * t as i64);
        let on = (t / 6) % 2 == 1;
        if t > 0 {
            let prev = indoor;
            indoor = prev + a * (outdoor(t - 1) - prev) - if on { 0.4 } else { 0.0 };
            if on {
                let energy = 1.0 + 0.1 * (prev - 23.0);
                samples.push(TrainingSample::on(timestamp, indoor, outdoor(t), energy, 23.0));
                continue;
            }
        }
        samples.push(TrainingSample::off(timestamp, indoor, outdoor(t), 0.1));
    }
    samples
}
