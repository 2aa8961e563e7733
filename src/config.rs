use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::{ModelParameters, DEFAULT_DURATION, DEFAULT_LOCATION_TOLERANCE};
use crate::ml::ForestParameters;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub training: TrainingConfig,
    pub optimizer: OptimizerConfig,
    pub cache: CacheConfig,
    pub worker: WorkerConfig,
    pub db: DbConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON-lines model and history files
    pub data_dir: PathBuf,
    /// Content-addressed regressor blobs
    pub artifact_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            artifact_dir: PathBuf::from("data/artifacts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub location_tolerance: f64,
    pub n_estimators: usize,
    pub max_depth: u16,
    pub seed: u64,
    pub train_ratio: f64,
    pub default_days_back: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            location_tolerance: DEFAULT_LOCATION_TOLERANCE,
            n_estimators: 100,
            max_depth: 25,
            seed: 0,
            train_ratio: 0.8,
            default_days_back: 30,
        }
    }
}

impl TrainingConfig {
    pub fn forest(&self) -> ForestParameters {
        ForestParameters {
            n_trees: self.n_estimators,
            max_depth: self.max_depth,
            seed: self.seed,
            ..ForestParameters::default()
        }
    }

    pub fn model_parameters(&self) -> ModelParameters {
        ModelParameters {
            location_tolerance: self.location_tolerance,
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            seed: self.seed,
            train_ratio: self.train_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Horizon used when a request omits `duration`
    pub default_duration: usize,
    pub comfort_band: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            default_duration: DEFAULT_DURATION,
            comfort_band: crate::optimizer::COMFORT_BAND,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Models kept in memory; 0 disables the cache
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub queue_depth: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { queue_depth: 32 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Postgres URL, only read with the `db` feature
    pub url: Option<String>,
}

impl Config {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("HVAC__").split("__"));
        Ok(figment.extract()?)
    }
}
