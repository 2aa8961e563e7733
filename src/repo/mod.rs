//! Persistence of trained models and training history.
//!
//! Rows are append-only: a newer model for a location supersedes older ones
//! at lookup time instead of overwriting them.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{BoundingBox, Location, ModelSummary, TrainingHistory, TrainingMetrics};

pub mod artifacts;
pub mod cache;
pub mod jsonl;
pub mod memory;
#[cfg(feature = "db")]
pub mod pg;
pub mod repository;

pub use artifacts::ArtifactStore;
pub use cache::ModelCache;
pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use repository::ModelRepository;

/// Scalar columns of a trained model; the regressor lives in the artifact store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: Uuid,
    pub location: Location,
    pub a_coefficient: Option<f64>,
    pub avg_consumption_off: Option<f64>,
    /// SHA-256 key of the regressor artifact
    pub artifact: Option<String>,
    pub metrics: Option<TrainingMetrics>,
    pub data_hash: String,
    pub knowledge_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelRecord {
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            id: self.id,
            location: self.location,
            a_coefficient: self.a_coefficient,
            avg_consumption_off: self.avg_consumption_off,
            metrics: self.metrics,
            data_hash: self.data_hash.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Most recently updated record, later insertions winning ties.
/// `records` must be in insertion order.
pub(crate) fn latest<'a>(
    records: impl IntoIterator<Item = &'a ModelRecord>,
    bounds: &BoundingBox,
) -> Option<&'a ModelRecord> {
    records
        .into_iter()
        .filter(|record| bounds.contains(&record.location))
        .fold(None, |best: Option<&ModelRecord>, record| match best {
            Some(current) if current.updated_at > record.updated_at => Some(current),
            _ => Some(record),
        })
}

#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn insert_model(&self, record: &ModelRecord) -> Result<()>;

    /// Newest record whose location falls inside `bounds`
    async fn latest_model(&self, bounds: &BoundingBox) -> Result<Option<ModelRecord>>;

    async fn find_model(&self, id: Uuid) -> Result<Option<ModelRecord>>;

    /// Drop a record written by a run that could not be completed
    async fn delete_model(&self, id: Uuid) -> Result<()>;

    /// Every record, newest first
    async fn list_models(&self) -> Result<Vec<ModelRecord>>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert_history(&self, history: &TrainingHistory) -> Result<()>;

    /// Replace the stored state of an existing run
    async fn update_history(&self, history: &TrainingHistory) -> Result<()>;

    async fn find_history(&self, id: Uuid) -> Result<Option<TrainingHistory>>;

    /// Runs inside `bounds`, newest first
    async fn history_in(&self, bounds: &BoundingBox) -> Result<Vec<TrainingHistory>>;
}

/// Model and history stores selected from configuration
#[derive(Clone)]
pub struct Repositories {
    pub models: Arc<dyn ModelStore>,
    pub history: Arc<dyn HistoryStore>,
}

impl Repositories {
    pub async fn new(cfg: &Config) -> Result<Self> {
        #[cfg(feature = "db")]
        {
            if let Some(url) = &cfg.db.url {
                let store = Arc::new(pg::PgStore::connect(url).await?);
                store.ensure_schema().await?;
                return Ok(Self {
                    models: store.clone(),
                    history: store,
                });
            }
        }

        let store = Arc::new(JsonlStore::open(&cfg.storage.data_dir).await?);
        Ok(Self {
            models: store.clone(),
            history: store,
        })
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            models: store.clone(),
            history: store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn record(lat: f64, lon: f64, updated_at: DateTime<Utc>) -> ModelRecord {
        ModelRecord {
            id: Uuid::new_v4(),
            location: Location::new(lat, lon),
            a_coefficient: Some(0.1),
            avg_consumption_off: Some(0.2),
            artifact: None,
            metrics: None,
            data_hash: String::new(),
            knowledge_id: None,
            created_at: updated_at,
            updated_at,
        }
    }

    #[test]
    fn test_latest_prefers_newest_then_last_inserted() {
        let now = Utc::now();
        let older = record(10.0, 20.0, now - Duration::hours(1));
        let first = record(10.0, 20.0, now);
        let second = record(10.005, 20.0, now);
        let elsewhere = record(11.0, 20.0, now + Duration::hours(1));
        let records = vec![older, first, second.clone(), elsewhere];

        let bounds = Location::new(10.0, 20.0).bounds(0.01);
        assert_eq!(latest(&records, &bounds).map(|r| r.id), Some(second.id));
        assert!(latest(&records, &Location::new(50.0, 50.0).bounds(0.01)).is_none());
    }
}
