use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::Location;
use crate::error::EngineError;
use crate::ml::{ActiveRegressor, ValidationMetrics};

/// Fit quality of both sub-models, measured on held-out transitions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Passive stage, target = one-step indoor change
    pub passive: ValidationMetrics,
    pub active_energy: ValidationMetrics,
    pub active_delta_t: ValidationMetrics,
    pub passive_samples: usize,
    pub active_samples: usize,
}

/// Thermal/energy model of one site
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub id: Uuid,
    pub location: Location,
    /// Passive heat-transfer factor per 5-minute step
    pub a_coefficient: Option<f64>,
    /// Mean energy per step while the unit is off
    pub avg_consumption_off: Option<f64>,
    pub regressor: Option<Arc<dyn ActiveRegressor>>,
    pub metrics: Option<TrainingMetrics>,
    pub data_hash: String,
    pub knowledge_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Borrowed view of a model with every component present
#[derive(Debug, Clone, Copy)]
pub struct ReadyModel<'a> {
    pub a_coefficient: f64,
    pub avg_consumption_off: f64,
    pub regressor: &'a dyn ActiveRegressor,
}

impl TrainedModel {
    pub fn new(
        location: Location,
        a_coefficient: f64,
        avg_consumption_off: f64,
        regressor: Arc<dyn ActiveRegressor>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            location,
            a_coefficient: Some(a_coefficient),
            avg_consumption_off: Some(avg_consumption_off),
            regressor: Some(regressor),
            metrics: None,
            data_hash: String::new(),
            knowledge_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metrics(mut self, metrics: TrainingMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_data_hash(mut self, data_hash: impl Into<String>) -> Self {
        self.data_hash = data_hash.into();
        self
    }

    pub fn with_knowledge_id(mut self, knowledge_id: Option<i64>) -> Self {
        self.knowledge_id = knowledge_id;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.a_coefficient.is_some()
            && self.avg_consumption_off.is_some()
            && self.regressor.is_some()
    }

    /// All components, or `ModelNotTrained`
    pub fn ready(&self) -> Result<ReadyModel<'_>, EngineError> {
        match (self.a_coefficient, self.avg_consumption_off, self.regressor.as_deref()) {
            (Some(a_coefficient), Some(avg_consumption_off), Some(regressor)) => Ok(ReadyModel {
                a_coefficient,
                avg_consumption_off,
                regressor,
            }),
            _ => Err(EngineError::ModelNotTrained),
        }
    }
}

/// Listing entry for stored models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub id: Uuid,
    pub location: Location,
    pub a_coefficient: Option<f64>,
    pub avg_consumption_off: Option<f64>,
    pub metrics: Option<TrainingMetrics>,
    pub data_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
