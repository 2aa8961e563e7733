use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::{Location, TrainingMetrics};
use crate::error::EngineError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TrainingStatus {
    Started,
    Completed,
    Failed,
}

impl TrainingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TrainingStatus::Completed | TrainingStatus::Failed)
    }
}

/// Hyperparameters a run was executed with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub location_tolerance: f64,
    pub n_estimators: usize,
    pub max_depth: u16,
    pub seed: u64,
    pub train_ratio: f64,
}

/// Lifecycle record of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub id: Uuid,
    pub location: Location,
    pub sensor_id: Option<i64>,
    pub status: TrainingStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metrics: Option<TrainingMetrics>,
    pub data_size: Option<usize>,
    pub model_parameters: Option<ModelParameters>,
    pub model_id: Option<Uuid>,
    /// Error text of a failed run
    pub notes: Option<String>,
}

impl TrainingHistory {
    pub fn start(location: Location, sensor_id: Option<i64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            location,
            sensor_id,
            status: TrainingStatus::Started,
            started_at: Utc::now(),
            completed_at: None,
            metrics: None,
            data_size: None,
            model_parameters: None,
            model_id: None,
            notes: None,
        }
    }

    pub fn complete(
        &mut self,
        model_id: Uuid,
        metrics: TrainingMetrics,
        data_size: usize,
        parameters: ModelParameters,
    ) -> Result<(), EngineError> {
        self.transition(TrainingStatus::Completed)?;
        self.model_id = Some(model_id);
        self.metrics = Some(metrics);
        self.data_size = Some(data_size);
        self.model_parameters = Some(parameters);
        Ok(())
    }

    pub fn fail(&mut self, notes: impl Into<String>) -> Result<(), EngineError> {
        self.transition(TrainingStatus::Failed)?;
        self.notes = Some(notes.into());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall time of a finished run
    pub fn duration_seconds(&self) -> Option<f64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    fn transition(&mut self, to: TrainingStatus) -> Result<(), EngineError> {
        if self.status != TrainingStatus::Started {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}
