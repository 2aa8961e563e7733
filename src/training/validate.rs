use anyhow::Result;

use super::prepare;
use crate::domain::{TrainedModel, TrainingMetrics, TrainingSample};
use crate::ml::{calculate_metrics, ActiveFeatures};

/// One-step accuracy of a loaded model on samples it was not trained on
pub fn validate_model(model: &TrainedModel, samples: &[TrainingSample]) -> Result<TrainingMetrics> {
    let ready = model.ready()?;
    let prepared = prepare(samples)?;
    let a = ready.a_coefficient;

    let passive_pred: Vec<f64> = prepared.passive.iter().map(|o| a * o.drive()).collect();
    let passive_actual: Vec<f64> = prepared.passive.iter().map(|o| o.change()).collect();

    let features: Vec<ActiveFeatures> = prepared.active.iter().map(|o| o.features).collect();
    let predictions = ready.regressor.predict_batch(&features)?;
    let energy_pred: Vec<f64> = predictions.iter().map(|p| p.energy).collect();
    let delta_t_pred: Vec<f64> = predictions.iter().map(|p| p.delta_t).collect();
    let energy_actual: Vec<f64> = prepared.active.iter().map(|o| o.energy).collect();
    let delta_t_actual: Vec<f64> = prepared.active.iter().map(|o| o.delta_t(a)).collect();

    Ok(TrainingMetrics {
        passive: calculate_metrics(&passive_pred, &passive_actual)?,
        active_energy: calculate_metrics(&energy_pred, &energy_actual)?,
        active_delta_t: calculate_metrics(&delta_t_pred, &delta_t_actual)?,
        passive_samples: prepared.passive.len(),
        active_samples: prepared.active.len(),
    })
}
