use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{latest, HistoryStore, ModelRecord, ModelStore};
use crate::domain::{BoundingBox, TrainingHistory};

const MODELS_FILE: &str = "models.jsonl";
const HISTORY_FILE: &str = "history.jsonl";

/// Append-only JSON-lines files.
///
/// History updates append the new state of a run; readers keep the last line
/// per id.
#[derive(Debug)]
pub struct JsonlStore {
    models_path: PathBuf,
    history_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create data dir {}", dir.display()))?;
        Ok(Self {
            models_path: dir.join(MODELS_FILE),
            history_path: dir.join(HISTORY_FILE),
            write_lock: Mutex::new(()),
        })
    }

    async fn append<T: Serialize>(&self, path: &Path, row: &T) -> Result<()> {
        let mut line = serde_json::to_vec(row)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };

        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("{}:{}: invalid row", path.display(), index + 1))
            })
            .collect()
    }

    /// Latest version of every run, in first-seen order
    async fn history_rows(&self) -> Result<Vec<TrainingHistory>> {
        let mut rows: Vec<TrainingHistory> = Vec::new();
        for row in Self::read_all::<TrainingHistory>(&self.history_path).await? {
            match rows.iter_mut().find(|existing| existing.id == row.id) {
                Some(existing) => *existing = row,
                None => rows.push(row),
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl ModelStore for JsonlStore {
    async fn insert_model(&self, record: &ModelRecord) -> Result<()> {
        self.append(&self.models_path, record).await
    }

    async fn latest_model(&self, bounds: &BoundingBox) -> Result<Option<ModelRecord>> {
        let records = Self::read_all::<ModelRecord>(&self.models_path).await?;
        Ok(latest(&records, bounds).cloned())
    }

    async fn find_model(&self, id: Uuid) -> Result<Option<ModelRecord>> {
        let records = Self::read_all::<ModelRecord>(&self.models_path).await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    async fn delete_model(&self, id: Uuid) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let records = Self::read_all::<ModelRecord>(&self.models_path).await?;
        if !records.iter().any(|r| r.id == id) {
            return Ok(());
        }

        let mut contents = Vec::new();
        for record in records.iter().filter(|r| r.id != id) {
            contents.extend(serde_json::to_vec(record)?);
            contents.push(b'\n');
        }
        let tmp = self.models_path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, &contents)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.models_path).await?;
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<ModelRecord>> {
        let mut records = Self::read_all::<ModelRecord>(&self.models_path).await?;
        records.reverse();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }
}

#[async_trait]
impl HistoryStore for JsonlStore {
    async fn insert_history(&self, history: &TrainingHistory) -> Result<()> {
        self.append(&self.history_path, history).await
    }

    async fn update_history(&self, history: &TrainingHistory) -> Result<()> {
        if self.find_history(history.id).await?.is_none() {
            bail!("training history {} not found", history.id);
        }
        self.append(&self.history_path, history).await
    }

    async fn find_history(&self, id: Uuid) -> Result<Option<TrainingHistory>> {
        Ok(self.history_rows().await?.into_iter().find(|h| h.id == id))
    }

    async fn history_in(&self, bounds: &BoundingBox) -> Result<Vec<TrainingHistory>> {
        let mut rows: Vec<TrainingHistory> = self
            .history_rows()
            .await?
            .into_iter()
            .rev()
            .filter(|h| bounds.contains(&h.location))
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, TrainingStatus};
    use crate::repo::tests::record;
    use chrono::Utc;

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let model = record(45.0, 9.0, Utc::now());
        {
            let store = JsonlStore::open(dir.path()).await.unwrap();
            store.insert_model(&model).await.unwrap();
        }

        let store = JsonlStore::open(dir.path()).await.unwrap();
        let found = store
            .latest_model(&Location::new(45.001, 9.0).bounds(0.01))
            .await
            .unwrap();
        assert_eq!(found, Some(model));
    }

    #[tokio::test]
    async fn test_history_last_line_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();

        let mut history = TrainingHistory::start(Location::new(45.0, 9.0), Some(3));
        store.insert_history(&history).await.unwrap();
        history.fail("no training data for HVAC on state").unwrap();
        store.update_history(&history).await.unwrap();

        let rows = store.history_in(&Location::new(45.0, 9.0).bounds(0.01)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, TrainingStatus::Failed);

        let raw = tokio::fs::read_to_string(dir.path().join(HISTORY_FILE)).await.unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_delete_rewrites_models_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();
        let kept = record(45.0, 9.0, Utc::now());
        let dropped = record(45.0, 9.0, Utc::now());
        store.insert_model(&kept).await.unwrap();
        store.insert_model(&dropped).await.unwrap();

        store.delete_model(dropped.id).await.unwrap();
        store.delete_model(Uuid::new_v4()).await.unwrap();

        let reopened = JsonlStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.list_models().await.unwrap(), vec![kept]);
    }

    #[tokio::test]
    async fn test_empty_dir_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path().join("nested")).await.unwrap();
        assert!(store.list_models().await.unwrap().is_empty());
        assert!(store.find_history(Uuid::new_v4()).await.unwrap().is_none());
    }
}
