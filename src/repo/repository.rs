use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ArtifactStore, ModelCache, ModelRecord, ModelStore};
use crate::domain::{Location, ModelSummary, TrainedModel};
use crate::error::EngineError;
use crate::ml::{ActiveRegressor, ForestRegressor};

/// Model lookup and persistence by approximate location
pub struct ModelRepository {
    store: Arc<dyn ModelStore>,
    artifacts: ArtifactStore,
    cache: ModelCache,
}

impl ModelRepository {
    pub fn new(store: Arc<dyn ModelStore>, artifacts: ArtifactStore, cache: ModelCache) -> Self {
        Self {
            store,
            artifacts,
            cache,
        }
    }

    /// Most recently updated model within `tolerance` degrees of `location`
    pub async fn lookup(
        &self,
        location: &Location,
        tolerance: f64,
    ) -> Result<Option<Arc<TrainedModel>>> {
        if let Some(model) = self.cache.get(location, tolerance) {
            return Ok(Some(model));
        }

        let Some(record) = self.store.latest_model(&location.bounds(tolerance)).await? else {
            return Ok(None);
        };

        let model = Arc::new(self.hydrate(record).await);
        self.cache.insert(location, tolerance, model.clone());
        Ok(Some(model))
    }

    /// Persist the scalars and write the regressor to the artifact store
    pub async fn save(&self, model: &TrainedModel) -> Result<ModelRecord> {
        let artifact = match &model.regressor {
            Some(regressor) => Some(self.artifacts.put(&regressor.to_artifact()?).await?),
            None => None,
        };

        let record = ModelRecord {
            id: model.id,
            location: model.location,
            a_coefficient: model.a_coefficient,
            avg_consumption_off: model.avg_consumption_off,
            artifact,
            metrics: model.metrics,
            data_hash: model.data_hash.clone(),
            knowledge_id: model.knowledge_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        };
        self.store.insert_model(&record).await?;
        self.cache.invalidate_containing(&model.location);

        info!(
            model_id = %record.id,
            location = %record.location,
            artifact = record.artifact.as_deref().unwrap_or("-"),
            "model saved"
        );
        Ok(record)
    }

    /// Re-append a stored model with a fresh `updated_at` so lookups at its
    /// location return it again
    pub async fn promote(&self, model_id: Uuid) -> Result<ModelRecord> {
        let Some(existing) = self.store.find_model(model_id).await? else {
            return Err(EngineError::InvalidRequest(format!("unknown model id {model_id}")).into());
        };

        let record = ModelRecord {
            id: Uuid::new_v4(),
            updated_at: Utc::now(),
            ..existing
        };
        self.store.insert_model(&record).await?;
        self.cache.invalidate_containing(&record.location);

        info!(
            promoted_from = %model_id,
            model_id = %record.id,
            location = %record.location,
            "model promoted"
        );
        Ok(record)
    }

    /// Withdraw a saved model. Its artifact stays; blobs are shared by content.
    pub async fn remove(&self, model: &TrainedModel) -> Result<()> {
        self.store.delete_model(model.id).await?;
        self.cache.invalidate_containing(&model.location);
        warn!(model_id = %model.id, location = %model.location, "model withdrawn");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<ModelSummary>> {
        Ok(self.store.list_models().await?.iter().map(ModelRecord::summary).collect())
    }

    /// Rebuild a model from its record. A missing or corrupt artifact leaves
    /// the regressor absent so the model loads but is not ready.
    async fn hydrate(&self, record: ModelRecord) -> TrainedModel {
        let regressor = match &record.artifact {
            Some(key) => match self.load_regressor(key).await {
                Ok(regressor) => Some(regressor),
                Err(e) => {
                    warn!(
                        model_id = %record.id,
                        artifact = %key,
                        error = %e,
                        "failed to load regressor artifact"
                    );
                    None
                }
            },
            None => None,
        };

        TrainedModel {
            id: record.id,
            location: record.location,
            a_coefficient: record.a_coefficient,
            avg_consumption_off: record.avg_consumption_off,
            regressor,
            metrics: record.metrics,
            data_hash: record.data_hash,
            knowledge_id: record.knowledge_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    async fn load_regressor(&self, key: &str) -> Result<Arc<dyn ActiveRegressor>> {
        let bytes = self.artifacts.get(key).await?;
        Ok(Arc::new(ForestRegressor::from_artifact(&bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::MemoryStore;
    use crate::ml::{ActiveFeatures, ForestParameters, TimeFeatures};

    fn forest() -> ForestRegressor {
        let time = TimeFeatures {
            hour: 12,
            minute: 0,
            day_of_week: 2,
            month: 7,
        };
        let features: Vec<ActiveFeatures> = (0..20)
            .map(|i| ActiveFeatures::new(24.0 + (i % 5) as f64, 30.0, 23.0, time))
            .collect();
        let energy: Vec<f64> = (0..20).map(|i| 1.0 + (i % 5) as f64 * 0.1).collect();
        let delta_t = vec![-0.3; 20];
        let params = ForestParameters {
            n_trees: 5,
            max_depth: 4,
            ..ForestParameters::default()
        };
        ForestRegressor::fit(&features, &energy, &delta_t, params).unwrap()
    }

    fn repository(dir: &std::path::Path, capacity: usize) -> ModelRepository {
        ModelRepository::new(
            Arc::new(MemoryStore::default()),
            ArtifactStore::new(dir),
            ModelCache::new(capacity),
        )
    }

    #[tokio::test]
    async fn test_save_lookup_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(dir.path(), 4);
        let location = Location::new(40.0, -3.0);
        let model =
            TrainedModel::new(location, 0.08, 0.15, Arc::new(forest())).with_data_hash("abc");

        let record = repo.save(&model).await.unwrap();
        assert!(record.artifact.is_some());

        let loaded = repo.lookup(&Location::new(40.005, -3.0), 0.01).await.unwrap().unwrap();
        assert_eq!(loaded.id, model.id);
        assert_eq!(loaded.a_coefficient, Some(0.08));
        assert_eq!(loaded.avg_consumption_off, Some(0.15));
        assert_eq!(loaded.data_hash, "abc");
        assert!(loaded.is_ready());

        assert!(repo.lookup(&Location::new(41.0, -3.0), 0.01).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_artifact_loads_unready() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(dir.path(), 0);
        let location = Location::new(40.0, -3.0);
        let record = repo
            .save(&TrainedModel::new(location, 0.08, 0.15, Arc::new(forest())))
            .await
            .unwrap();

        let artifact = record.artifact.unwrap();
        tokio::fs::remove_file(ArtifactStore::new(dir.path()).path_for(&artifact))
            .await
            .unwrap();

        let loaded = repo.lookup(&location, 0.01).await.unwrap().unwrap();
        assert_eq!(loaded.a_coefficient, Some(0.08));
        assert!(!loaded.is_ready());
        assert_eq!(loaded.ready().unwrap_err(), EngineError::ModelNotTrained);
    }

    #[tokio::test]
    async fn test_promote_makes_model_current() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(dir.path(), 4);
        let location = Location::new(40.0, -3.0);

        let first = repo
            .save(&TrainedModel::new(location, 0.05, 0.1, Arc::new(forest())))
            .await
            .unwrap();
        repo.save(&TrainedModel::new(location, 0.09, 0.1, Arc::new(forest())))
            .await
            .unwrap();
        assert_eq!(
            repo.lookup(&location, 0.01).await.unwrap().unwrap().a_coefficient,
            Some(0.09)
        );

        let promoted = repo.promote(first.id).await.unwrap();
        assert_ne!(promoted.id, first.id);
        let current = repo.lookup(&location, 0.01).await.unwrap().unwrap();
        assert_eq!(current.a_coefficient, Some(0.05));
        assert_eq!(repo.list().await.unwrap().len(), 3);

        let err = repo.promote(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(EngineError::find(&err), Some(EngineError::InvalidRequest(_))));
    }
}
