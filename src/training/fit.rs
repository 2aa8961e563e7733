//! CPU-bound model fitting, run off the async executor

use anyhow::{Context, Result};

use super::PreparedData;
use crate::config::TrainingConfig;
use crate::domain::TrainingMetrics;
use crate::ml::{
    calculate_metrics, metrics::select, ActiveFeatures, ActiveRegressor, ForestRegressor,
    ThroughOriginRegression, TrainTestSplit,
};

/// Both sub-models plus their held-out quality
#[derive(Debug)]
pub struct FittedModel {
    pub a_coefficient: f64,
    pub avg_consumption_off: f64,
    pub regressor: ForestRegressor,
    pub metrics: TrainingMetrics,
}

/// Fit the passive coefficient, then the active forest on the residual ΔT
pub fn fit_models(prepared: &PreparedData, config: &TrainingConfig) -> Result<FittedModel> {
    // Passive stage
    let split = TrainTestSplit::seeded(prepared.passive.len(), config.train_ratio, config.seed);
    let train = select(&prepared.passive, &split.train);
    let drive: Vec<f64> = train.iter().map(|o| o.drive()).collect();
    let change: Vec<f64> = train.iter().map(|o| o.change()).collect();
    let passive_model =
        ThroughOriginRegression::fit(&drive, &change).context("passive fit failed")?;
    let a = passive_model.coefficient;

    let held_out = select(&prepared.passive, split.evaluation_rows());
    let predicted: Vec<f64> = held_out.iter().map(|o| passive_model.predict(o.drive())).collect();
    let actual: Vec<f64> = held_out.iter().map(|o| o.change()).collect();
    let passive_metrics = calculate_metrics(&predicted, &actual)?;

    // Active stage
    let split = TrainTestSplit::seeded(prepared.active.len(), config.train_ratio, config.seed);
    let train = select(&prepared.active, &split.train);
    let features: Vec<ActiveFeatures> = train.iter().map(|o| o.features).collect();
    let energy: Vec<f64> = train.iter().map(|o| o.energy).collect();
    let delta_t: Vec<f64> = train.iter().map(|o| o.delta_t(a)).collect();
    let regressor = ForestRegressor::fit(&features, &energy, &delta_t, config.forest())
        .context("active fit failed")?;

    let held_out = select(&prepared.active, split.evaluation_rows());
    let features: Vec<ActiveFeatures> = held_out.iter().map(|o| o.features).collect();
    let predictions = regressor.predict_batch(&features)?;
    let (energy_pred, delta_t_pred): (Vec<f64>, Vec<f64>) =
        predictions.iter().map(|p| (p.energy, p.delta_t)).unzip();
    let energy_actual: Vec<f64> = held_out.iter().map(|o| o.energy).collect();
    let delta_t_actual: Vec<f64> = held_out.iter().map(|o| o.delta_t(a)).collect();

    let metrics = TrainingMetrics {
        passive: passive_metrics,
        active_energy: calculate_metrics(&energy_pred, &energy_actual)?,
        active_delta_t: calculate_metrics(&delta_t_pred, &delta_t_actual)?,
        passive_samples: prepared.passive.len(),
        active_samples: prepared.active.len(),
    };

    Ok(FittedModel {
        a_coefficient: a,
        avg_consumption_off: prepared.avg_consumption_off,
        regressor,
        metrics,
    })
}
