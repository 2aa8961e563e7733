//! Machine Learning Module
//!
//! The thermal model of a site has two stages:
//! - a passive stage, one coefficient `a` fitted by least squares through the
//!   origin on HVAC-off transitions (`ΔT_in = a·(T_out − T_in)`)
//! - an active stage, a random forest fitted on HVAC-on transitions that
//!   predicts step energy and the residual temperature change the passive
//!   stage does not explain
//!
//! The active stage sits behind [`ActiveRegressor`] so simulation code never
//! depends on the concrete learner.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod features;
pub mod forest;
pub mod linear;
pub mod metrics;

pub use features::{ActiveFeatures, TimeFeatures, ACTIVE_FEATURE_NAMES};
pub use forest::{ForestParameters, ForestRegressor};
pub use linear::ThroughOriginRegression;
pub use metrics::{calculate_metrics, TrainTestSplit, ValidationMetrics};

/// Output of the active regressor for one step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivePrediction {
    /// Energy consumed during the step
    pub energy: f64,
    /// Temperature change on top of passive relaxation
    pub delta_t: f64,
}

/// Nonlinear map from [`ActiveFeatures`] to `[energy, ΔT]`
pub trait ActiveRegressor: std::fmt::Debug + Send + Sync {
    fn predict(&self, features: &ActiveFeatures) -> Result<ActivePrediction>;

    fn predict_batch(&self, features: &[ActiveFeatures]) -> Result<Vec<ActivePrediction>> {
        features.iter().map(|f| self.predict(f)).collect()
    }

    /// Opaque bytes for the artifact store
    fn to_artifact(&self) -> Result<Vec<u8>>;
}
