use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{latest, HistoryStore, ModelRecord, ModelStore};
use crate::domain::{BoundingBox, TrainingHistory};

/// Process-local store, used when embedding the engine and in tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    models: RwLock<Vec<ModelRecord>>,
    history: RwLock<Vec<TrainingHistory>>,
}

#[async_trait]
impl ModelStore for MemoryStore {
    async fn insert_model(&self, record: &ModelRecord) -> Result<()> {
        self.models.write().push(record.clone());
        Ok(())
    }

    async fn latest_model(&self, bounds: &BoundingBox) -> Result<Option<ModelRecord>> {
        Ok(latest(self.models.read().iter(), bounds).cloned())
    }

    async fn find_model(&self, id: Uuid) -> Result<Option<ModelRecord>> {
        Ok(self.models.read().iter().find(|r| r.id == id).cloned())
    }

    async fn delete_model(&self, id: Uuid) -> Result<()> {
        self.models.write().retain(|r| r.id != id);
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<ModelRecord>> {
        let mut records = self.models.read().clone();
        records.reverse();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn insert_history(&self, history: &TrainingHistory) -> Result<()> {
        self.history.write().push(history.clone());
        Ok(())
    }

    async fn update_history(&self, history: &TrainingHistory) -> Result<()> {
        let mut rows = self.history.write();
        match rows.iter_mut().find(|row| row.id == history.id) {
            Some(row) => *row = history.clone(),
            None => bail!("training history {} not found", history.id),
        }
        Ok(())
    }

    async fn find_history(&self, id: Uuid) -> Result<Option<TrainingHistory>> {
        Ok(self.history.read().iter().find(|h| h.id == id).cloned())
    }

    async fn history_in(&self, bounds: &BoundingBox) -> Result<Vec<TrainingHistory>> {
        let mut rows: Vec<TrainingHistory> = self
            .history
            .read()
            .iter()
            .rev()
            .filter(|h| bounds.contains(&h.location))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(rows)
    }
}
