//! Training pipeline
//!
//! Fetches a site's sample stream, fits the passive and active sub-models and
//! persists the result. Every run is recorded in the training history, which
//! moves from `started` to exactly one of `completed` or `failed`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TrainingConfig;
use crate::domain::{Location, TrainedModel, TrainingHistory, TrainingMetrics, TrainingSample};
use crate::error::EngineError;
use crate::repo::{HistoryStore, ModelRepository};

pub mod fit;
pub mod hash;
pub mod preprocess;
pub mod source;
pub mod validate;

pub use fit::{fit_models, FittedModel};
pub use hash::data_hash;
pub use preprocess::{prepare, ActiveObservation, PassiveObservation, PreparedData};
pub use source::{apply_lookback, CsvSampleSource, MemorySampleSource, SampleQuery, SampleSource};
pub use validate::validate_model;

#[cfg(feature = "db")]
pub use source::PgSampleSource;

/// What to train
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingJob {
    pub location: Location,
    pub sensor_id: Option<i64>,
    pub knowledge_id: Option<i64>,
    pub days_back: Option<u32>,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub history_id: Uuid,
    pub model_id: Uuid,
    pub location: Location,
    pub a_coefficient: f64,
    pub avg_consumption_off: f64,
    pub metrics: TrainingMetrics,
    pub data_size: usize,
    pub data_hash: String,
    pub duration_seconds: Option<f64>,
}

pub struct TrainingPipeline {
    repository: Arc<ModelRepository>,
    history: Arc<dyn HistoryStore>,
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(
        repository: Arc<ModelRepository>,
        history: Arc<dyn HistoryStore>,
        config: TrainingConfig,
    ) -> Self {
        Self {
            repository,
            history,
            config,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fetch samples from `source` and train on them
    pub async fn train(
        &self,
        job: &TrainingJob,
        source: &dyn SampleSource,
    ) -> Result<TrainingReport> {
        let query = SampleQuery::new(job.location, job.sensor_id, job.days_back);
        self.execute(job, async move { source.fetch_training_samples(&query).await })
            .await
    }

    /// Train on an already loaded, time-ordered sample stream
    pub async fn train_on_samples(
        &self,
        job: &TrainingJob,
        samples: Vec<TrainingSample>,
    ) -> Result<TrainingReport> {
        self.execute(job, async move { Ok(samples) }).await
    }

    async fn execute<F>(&self, job: &TrainingJob, samples: F) -> Result<TrainingReport>
    where
        F: Future<Output = Result<Vec<TrainingSample>>> + Send,
    {
        let mut history = TrainingHistory::start(job.location, job.sensor_id);
        self.history.insert_history(&history).await?;
        info!(
            history_id = %history.id,
            location = %job.location,
            sensor_id = ?job.sensor_id,
            "training started"
        );

        match self.run(job, &history, samples).await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!(
                    history_id = %history.id,
                    kind = EngineError::find(&e).map_or("Internal", EngineError::kind),
                    error = %format!("{e:#}"),
                    "training failed"
                );
                history.fail(format!("{e:#}"))?;
                if let Err(update) = self.history.update_history(&history).await {
                    warn!(
                        history_id = %history.id,
                        error = %update,
                        "failed to record training failure"
                    );
                }
                Err(e)
            }
        }
    }

    /// Everything after the `started` row. The model row is written last and
    /// withdrawn again if the completed history cannot be recorded.
    async fn run<F>(
        &self,
        job: &TrainingJob,
        history: &TrainingHistory,
        samples: F,
    ) -> Result<TrainingReport>
    where
        F: Future<Output = Result<Vec<TrainingSample>>> + Send,
    {
        let (model, data_size) = self.fit(job, samples.await?).await?;
        let metrics = model
            .metrics
            .ok_or_else(|| EngineError::TrainingFailure("fitted model carries no metrics".into()))?;

        let mut completed = history.clone();
        completed.complete(model.id, metrics, data_size, self.config.model_parameters())?;

        self.repository.save(&model).await?;
        if let Err(e) = self.history.update_history(&completed).await {
            if let Err(remove) = self.repository.remove(&model).await {
                warn!(
                    model_id = %model.id,
                    error = %remove,
                    "failed to withdraw model of unrecorded run"
                );
            }
            return Err(e.context("failed to record training completion"));
        }

        info!(
            history_id = %completed.id,
            model_id = %model.id,
            data_size,
            passive_r2 = metrics.passive.r2,
            energy_r2 = metrics.active_energy.r2,
            "training completed"
        );

        Ok(TrainingReport {
            history_id: completed.id,
            model_id: model.id,
            location: model.location,
            a_coefficient: model.a_coefficient.unwrap_or_default(),
            avg_consumption_off: model.avg_consumption_off.unwrap_or_default(),
            metrics,
            data_size,
            data_hash: model.data_hash,
            duration_seconds: completed.duration_seconds(),
        })
    }

    async fn fit(
        &self,
        job: &TrainingJob,
        samples: Vec<TrainingSample>,
    ) -> Result<(TrainedModel, usize)> {
        let data_hash = data_hash(&samples);
        let previous = self
            .repository
            .lookup(&job.location, self.config.location_tolerance)
            .await
            .ok()
            .flatten();
        if previous.is_some_and(|model| model.data_hash == data_hash) {
            info!(
                location = %job.location,
                data_hash,
                "retraining on data identical to the current model"
            );
        }

        let prepared = prepare(&samples)?;
        let data_size = prepared.sample_count;
        let config = self.config.clone();
        let fitted = tokio::task::spawn_blocking(move || fit_models(&prepared, &config))
            .await
            .context("training task aborted")?
            .map_err(|e| EngineError::TrainingFailure(format!("{e:#}")))?;

        let model = TrainedModel::new(
            job.location,
            fitted.a_coefficient,
            fitted.avg_consumption_off,
            Arc::new(fitted.regressor),
        )
        .with_metrics(fitted.metrics)
        .with_data_hash(data_hash)
        .with_knowledge_id(job.knowledge_id);

        Ok((model, data_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OperationState, TrainingStatus};
    use crate::fixtures::synthetic_samples;
    use crate::repo::{ArtifactStore, MemoryStore, ModelCache, ModelStore};
    use source::MockSampleSource;

    fn pipeline(
        dir: &std::path::Path,
    ) -> (TrainingPipeline, Arc<MemoryStore>, Arc<ModelRepository>) {
        let store = Arc::new(MemoryStore::default());
        let repository = Arc::new(ModelRepository::new(
            store.clone(),
            ArtifactStore::new(dir),
            ModelCache::new(4),
        ));
        let config = TrainingConfig {
            n_estimators: 10,
            max_depth: 6,
            ..TrainingConfig::default()
        };
        (TrainingPipeline::new(repository.clone(), store.clone(), config), store, repository)
    }

    fn job() -> TrainingJob {
        TrainingJob {
            location: Location::new(37.98, 23.72),
            sensor_id: Some(4),
            knowledge_id: Some(9),
            days_back: None,
        }
    }

    #[tokio::test]
    async fn test_train_recovers_passive_coefficient() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, store, repository) = pipeline(dir.path());

        let report = pipeline.train_on_samples(&job(), synthetic_samples(240, 0.05)).await.unwrap();
        assert!((report.a_coefficient - 0.05).abs() < 1e-6);
        assert_eq!(report.data_size, 240);

        let history = store.find_history(report.history_id).await.unwrap().unwrap();
        assert_eq!(history.status, TrainingStatus::Completed);
        assert_eq!(history.model_id, Some(report.model_id));
        assert_eq!(history.model_parameters.unwrap().n_estimators, 10);

        let model = repository.lookup(&job().location, 0.01).await.unwrap().unwrap();
        assert_eq!(model.id, report.model_id);
        assert_eq!(model.knowledge_id, Some(9));
        assert!(model.is_ready());
    }

    #[tokio::test]
    async fn test_missing_on_data_fails_history() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, store, repository) = pipeline(dir.path());

        let off_only: Vec<TrainingSample> = synthetic_samples(60, 0.05)
            .into_iter()
            .filter(|s| s.operation == OperationState::Off)
            .collect();
        let err = pipeline.train_on_samples(&job(), off_only).await.unwrap_err();
        assert_eq!(
            EngineError::find(&err),
            Some(&EngineError::NoTrainingData(OperationState::On))
        );

        let rows = store.history_in(&job().location.bounds(0.01)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, TrainingStatus::Failed);
        assert!(rows[0].notes.as_deref().unwrap().contains("no training data"));
        assert!(repository.lookup(&job().location, 0.01).await.unwrap().is_none());
    }

    /// History store that refuses to record completed runs
    struct RejectsCompletion(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl HistoryStore for RejectsCompletion {
        async fn insert_history(&self, history: &TrainingHistory) -> Result<()> {
            self.0.insert_history(history).await
        }

        async fn update_history(&self, history: &TrainingHistory) -> Result<()> {
            if history.status == TrainingStatus::Completed {
                anyhow::bail!("history table unavailable");
            }
            self.0.update_history(history).await
        }

        async fn find_history(&self, id: Uuid) -> Result<Option<TrainingHistory>> {
            self.0.find_history(id).await
        }

        async fn history_in(
            &self,
            bounds: &crate::domain::BoundingBox,
        ) -> Result<Vec<TrainingHistory>> {
            self.0.history_in(bounds).await
        }
    }

    #[tokio::test]
    async fn test_unrecorded_completion_withdraws_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        let repository = Arc::new(ModelRepository::new(
            store.clone(),
            ArtifactStore::new(dir.path()),
            ModelCache::new(4),
        ));
        let config = TrainingConfig {
            n_estimators: 5,
            max_depth: 5,
            ..TrainingConfig::default()
        };
        let pipeline = TrainingPipeline::new(
            repository.clone(),
            Arc::new(RejectsCompletion(store.clone())),
            config,
        );

        let err = pipeline
            .train_on_samples(&job(), synthetic_samples(120, 0.05))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("history table unavailable"));

        let rows = store.history_in(&job().location.bounds(0.01)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, TrainingStatus::Failed);
        assert!(rows[0].model_id.is_none());
        assert!(store.list_models().await.unwrap().is_empty());
        assert!(repository.lookup(&job().location, 0.01).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_source_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, store, _) = pipeline(dir.path());

        let mut source = MockSampleSource::new();
        source
            .expect_fetch_training_samples()
            .withf(|query| query.sensor_id == Some(4))
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("sensor offline")));

        let err = pipeline.train(&job(), &source).await.unwrap_err();
        assert!(err.to_string().contains("sensor offline"));

        let rows = store.history_in(&job().location.bounds(0.01)).await.unwrap();
        assert_eq!(rows[0].status, TrainingStatus::Failed);
        assert_eq!(rows[0].notes.as_deref(), Some("sensor offline"));
    }
}
