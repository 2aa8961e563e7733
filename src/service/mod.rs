//! Engine facade
//!
//! [`HvacOptimizerService`] wires the repository, training pipeline,
//! simulation engine and schedule search together for the surrounding
//! backend. Each request resolves the model for its location once and works
//! on that immutable snapshot.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::domain::{
    clamp_duration, parse_timestamp, Location, ModelSummary, OperationSchedule, TrainedModel,
    TrainingHistory, TrainingMetrics, TrainingSample,
};
use crate::error::EngineError;
use crate::optimizer::{
    biased_search, normal_conditions_optimizer, EvaluationResult, OptimizationType, Recommendation,
    ScheduleEvaluator, ScheduleScorer, SearchOutcome,
};
use crate::repo::{
    ArtifactStore, HistoryStore, ModelCache, ModelRecord, ModelRepository, Repositories,
};
use crate::simulation::{Scenario, SimulationEngine, SimulationResult};
use crate::training::{validate_model, SampleSource, TrainingJob, TrainingPipeline, TrainingReport};

pub mod requests;
pub mod worker;

pub use requests::{PredictionRequest, PredictionResponse, TrainingRequest};
pub use worker::{spawn_training_worker, TrainingHandle};

/// Operations the backend calls on the engine
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn train(
        &self,
        request: &TrainingRequest,
        source: &dyn SampleSource,
    ) -> Result<TrainingReport>;

    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse>;

    async fn persist(&self, model: &TrainedModel) -> Result<ModelRecord>;

    async fn validate(
        &self,
        location: &Location,
        samples: &[TrainingSample],
    ) -> Result<TrainingMetrics>;

    async fn promote(&self, model_id: Uuid) -> Result<ModelRecord>;
}

/// Simulation and search over one location's model
#[derive(Debug, Clone)]
pub struct LocationOptimizer {
    engine: SimulationEngine,
    comfort_band: f64,
}

impl LocationOptimizer {
    pub fn new(model: Arc<TrainedModel>, comfort_band: f64) -> Self {
        Self {
            engine: SimulationEngine::new(model),
            comfort_band,
        }
    }

    pub fn model(&self) -> &TrainedModel {
        self.engine.model()
    }

    pub fn predict(
        &self,
        schedule: &OperationSchedule,
        scenario: &Scenario,
    ) -> Result<SimulationResult> {
        self.engine.simulate(schedule, scenario)
    }

    pub fn evaluate(
        &self,
        schedule: &OperationSchedule,
        scenario: &Scenario,
    ) -> Result<EvaluationResult> {
        ScheduleEvaluator::new(&self.engine, scenario).evaluate(schedule)
    }

    pub fn biased_search(&self, scenario: &Scenario) -> Result<SearchOutcome> {
        biased_search(&ScheduleEvaluator::new(&self.engine, scenario))
    }

    pub fn normal_conditions(&self, scenario: &Scenario) -> Result<Recommendation> {
        normal_conditions_optimizer(
            &ScheduleEvaluator::new(&self.engine, scenario),
            self.comfort_band,
        )
    }

    pub fn optimize(
        &self,
        scenario: &Scenario,
        optimization: OptimizationType,
    ) -> Result<Recommendation> {
        optimization
            .strategy(self.comfort_band)
            .optimize(&ScheduleEvaluator::new(&self.engine, scenario))
    }

    /// Answer a prediction: search when an optimization is requested,
    /// otherwise simulate the given schedule
    pub fn respond(
        &self,
        scenario: &Scenario,
        location: &Location,
        optimization: Option<OptimizationType>,
        operation: Option<&[u8]>,
    ) -> Result<PredictionResponse> {
        match (optimization, operation) {
            (Some(optimization), _) => {
                let recommendation = self.optimize(scenario, optimization)?;
                info!(
                    location = %location,
                    optimization = %optimization,
                    recommendation = %recommendation.recommendation_type,
                    savings = recommendation.savings_percentage,
                    "schedule optimized"
                );
                Ok(PredictionResponse::from(recommendation))
            }
            (None, Some(flags)) => {
                let schedule = OperationSchedule::from_flags(flags)?;
                schedule.ensure_len(scenario.duration())?;
                let result = self.predict(&schedule, scenario)?;
                debug!(
                    location = %location,
                    total_energy = result.total_energy,
                    "schedule simulated"
                );
                Ok(PredictionResponse::from(result))
            }
            (None, None) => Err(EngineError::InvalidRequest(
                "either operation or optimizationType is required".into(),
            )
            .into()),
        }
    }
}

pub struct HvacOptimizerService {
    repository: Arc<ModelRepository>,
    history: Arc<dyn HistoryStore>,
    pipeline: Arc<TrainingPipeline>,
    config: Config,
}

impl HvacOptimizerService {
    pub fn new(repositories: Repositories, config: Config) -> Self {
        let repository = Arc::new(ModelRepository::new(
            repositories.models,
            ArtifactStore::new(&config.storage.artifact_dir),
            ModelCache::new(config.cache.capacity),
        ));
        let pipeline = Arc::new(TrainingPipeline::new(
            repository.clone(),
            repositories.history.clone(),
            config.training.clone(),
        ));
        Self {
            repository,
            history: repositories.history,
            pipeline,
            config,
        }
    }

    pub fn pipeline(&self) -> Arc<TrainingPipeline> {
        self.pipeline.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Optimizer bound to the current model at `location`
    pub async fn optimizer_for(&self, location: &Location) -> Result<LocationOptimizer> {
        let model = self
            .repository
            .lookup(location, self.config.training.location_tolerance)
            .await?
            .ok_or(EngineError::ModelNotTrained)?;
        Ok(LocationOptimizer::new(model, self.config.optimizer.comfort_band))
    }

    /// Training runs at `location`, newest first
    pub async fn history(&self, location: &Location) -> Result<Vec<TrainingHistory>> {
        self.history
            .history_in(&location.bounds(self.config.training.location_tolerance))
            .await
    }

    pub async fn list_models(&self) -> Result<Vec<ModelSummary>> {
        self.repository.list().await
    }

    pub fn training_job(&self, request: &TrainingRequest) -> Result<TrainingJob> {
        request.validate().map_err(EngineError::from)?;
        Ok(TrainingJob {
            location: request.location(),
            sensor_id: request.sensor_id,
            knowledge_id: request.knowledge_id,
            days_back: Some(request.days_back.unwrap_or(self.config.training.default_days_back)),
        })
    }

    /// Validated scenario with the forecast cut to the clamped horizon
    fn scenario(&self, request: &PredictionRequest) -> Result<Scenario> {
        request.validate().map_err(EngineError::from)?;
        let starting_time = parse_timestamp(&request.starting_time)?;
        let duration = clamp_duration(
            request
                .duration
                .unwrap_or(self.config.optimizer.default_duration as i64),
        );

        let needed = duration + 1;
        if request.outdoor_temperatures.len() < needed {
            return Err(EngineError::InvalidScheduleLength {
                expected: needed,
                actual: request.outdoor_temperatures.len(),
            }
            .into());
        }

        Ok(Scenario::new(
            request.starting_temperature,
            starting_time,
            request.outdoor_temperatures[..needed].to_vec(),
            request.setpoint,
        ))
    }
}

#[async_trait]
impl ModelService for HvacOptimizerService {
    async fn train(
        &self,
        request: &TrainingRequest,
        source: &dyn SampleSource,
    ) -> Result<TrainingReport> {
        let job = self.training_job(request)?;
        self.pipeline.train(&job, source).await
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        let scenario = self.scenario(request)?;
        let optimizer = self.optimizer_for(&request.location()).await?;
        let location = request.location();
        let optimization_type = request.optimization_type;
        let operation = request.operation.clone();

        // Search is cubic in the horizon; keep it off the async workers
        tokio::task::spawn_blocking(move || {
            optimizer.respond(&scenario, &location, optimization_type, operation.as_deref())
        })
        .await
        .context("prediction task aborted")?
    }

    async fn persist(&self, model: &TrainedModel) -> Result<ModelRecord> {
        self.repository.save(model).await
    }

    async fn validate(
        &self,
        location: &Location,
        samples: &[TrainingSample],
    ) -> Result<TrainingMetrics> {
        let optimizer = self.optimizer_for(location).await?;
        validate_model(optimizer.model(), samples)
    }

    async fn promote(&self, model_id: Uuid) -> Result<ModelRecord> {
        self.repository.promote(model_id).await
    }
}
