//! SmartCore random forest for the HVAC-on regime
//!
//! The active model maps [`ActiveFeatures`] to both the step energy and the
//! residual temperature change (ΔT). SmartCore forests are single-output, so
//! the model keeps one forest per target, trained on identical rows with the
//! same hyperparameters and seed.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use super::{ActiveFeatures, ActivePrediction, ActiveRegressor, ACTIVE_FEATURE_NAMES};

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Training parameters for reproducibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParameters {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParameters {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 25,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 0,
        }
    }
}

impl ForestParameters {
    fn to_smartcore(self) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: Some(self.max_depth),
            min_samples_leaf: self.min_samples_leaf,
            min_samples_split: self.min_samples_split,
            n_trees: self.n_trees,
            m: None,
            keep_samples: false, // Don't store training samples (saves memory)
            seed: self.seed,
        }
    }
}

/// Paired energy / ΔT forests
#[derive(Serialize, Deserialize)]
pub struct ForestRegressor {
    pub parameters: ForestParameters,
    pub training_samples: usize,
    energy: Forest,
    delta_t: Forest,
}

impl std::fmt::Debug for ForestRegressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForestRegressor")
            .field("parameters", &self.parameters)
            .field("training_samples", &self.training_samples)
            .finish_non_exhaustive()
    }
}

impl ForestRegressor {
    /// Fit both forests on the same feature rows
    pub fn fit(
        features: &[ActiveFeatures],
        energy: &[f64],
        delta_t: &[f64],
        parameters: ForestParameters,
    ) -> Result<Self> {
        if features.is_empty() {
            anyhow::bail!("Cannot train on empty dataset");
        }

        if features.len() != energy.len() || features.len() != delta_t.len() {
            anyhow::bail!(
                "Feature and target count mismatch: {} features, {} energy targets, {} delta-T targets",
                features.len(),
                energy.len(),
                delta_t.len()
            );
        }

        let x = to_matrix(features);

        let energy_forest = Forest::fit(&x, &energy.to_vec(), parameters.to_smartcore())
            .map_err(|e| anyhow::anyhow!("RandomForest training failed (energy): {:?}", e))?;
        let delta_t_forest = Forest::fit(&x, &delta_t.to_vec(), parameters.to_smartcore())
            .map_err(|e| anyhow::anyhow!("RandomForest training failed (delta-T): {:?}", e))?;

        Ok(Self {
            parameters,
            training_samples: features.len(),
            energy: energy_forest,
            delta_t: delta_t_forest,
        })
    }

    /// Restore a model written by [`ActiveRegressor::to_artifact`]
    pub fn from_artifact(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| anyhow::anyhow!("Failed to deserialize model: {}", e))
    }
}

impl ActiveRegressor for ForestRegressor {
    fn predict(&self, features: &ActiveFeatures) -> Result<ActivePrediction> {
        let mut predictions = self.predict_batch(std::slice::from_ref(features))?;
        predictions
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Model returned empty predictions"))
    }

    fn predict_batch(&self, features: &[ActiveFeatures]) -> Result<Vec<ActivePrediction>> {
        if features.is_empty() {
            return Ok(Vec::new());
        }

        let x = to_matrix(features);
        let energy = self
            .energy
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("Prediction failed: {:?}", e))?;
        let delta_t = self
            .delta_t
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("Prediction failed: {:?}", e))?;

        if energy.len() != features.len() || delta_t.len() != features.len() {
            anyhow::bail!(
                "Model returned {} predictions for {} rows",
                energy.len(),
                features.len()
            );
        }

        Ok(energy
            .into_iter()
            .zip(delta_t)
            .map(|(energy, delta_t)| ActivePrediction { energy, delta_t })
            .collect())
    }

    fn to_artifact(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| anyhow::anyhow!("Failed to serialize model: {}", e))
    }
}

fn to_matrix(features: &[ActiveFeatures]) -> DenseMatrix<f64> {
    let n_features = ACTIVE_FEATURE_NAMES.len();
    let mut flat_data = Vec::with_capacity(features.len() * n_features);
    for row in features {
        flat_data.extend(row.to_vec());
    }
    DenseMatrix::new(features.len(), n_features, flat_data, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::TimeFeatures;

    fn rows() -> (Vec<ActiveFeatures>, Vec<f64>, Vec<f64>) {
        let mut features = Vec::new();
        let mut energy = Vec::new();
        let mut delta_t = Vec::new();
        for i in 0..80 {
            let k = (i % 10) as f64;
            let time = TimeFeatures {
                hour: (i % 10) as u32,
                minute: ((i % 10) * 5) as u32,
                day_of_week: 2,
                month: 7,
            };
            features.push(ActiveFeatures::new(22.0 + 0.5 * k, 28.0 + k, 23.0, time));
            // Warmer rooms cost more to cool and drop faster
            energy.push(0.5 + 0.05 * k);
            delta_t.push(-0.1 - 0.025 * k);
        }
        (features, energy, delta_t)
    }

    fn small_parameters() -> ForestParameters {
        ForestParameters {
            n_trees: 30,
            max_depth: 8,
            ..ForestParameters::default()
        }
    }

    #[test]
    fn test_default_parameters() {
        let params = ForestParameters::default();
        assert_eq!(params.n_trees, 100);
        assert_eq!(params.max_depth, 25);

        let smartcore = params.to_smartcore();
        assert_eq!(smartcore.n_trees, 100);
        assert_eq!(smartcore.max_depth, Some(25));
        assert!(!smartcore.keep_samples);
    }

    #[test]
    fn test_fit_and_predict() {
        let (features, energy, delta_t) = rows();
        let model = ForestRegressor::fit(&features, &energy, &delta_t, small_parameters()).unwrap();
        assert_eq!(model.training_samples, 80);

        let cool = model.predict(&features[0]).unwrap();
        let warm = model.predict(&features[9]).unwrap();
        assert!(warm.energy > cool.energy + 0.2);
        assert!(warm.delta_t < cool.delta_t - 0.1);
        assert!((warm.energy - energy[9]).abs() < 0.25);
    }

    #[test]
    fn test_artifact_restores_same_predictions() {
        let (features, energy, delta_t) = rows();
        let model = ForestRegressor::fit(&features, &energy, &delta_t, small_parameters()).unwrap();

        let bytes = model.to_artifact().unwrap();
        let restored = ForestRegressor::from_artifact(&bytes).unwrap();

        let before = model.predict_batch(&features[..5]).unwrap();
        let after = restored.predict_batch(&features[..5]).unwrap();
        assert_eq!(before, after);
        assert_eq!(restored.parameters, small_parameters());
    }

    #[test]
    fn test_corrupt_artifact_is_rejected() {
        assert!(ForestRegressor::from_artifact(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_fit_rejects_mismatched_targets() {
        let (features, energy, _) = rows();
        assert!(ForestRegressor::fit(&features, &energy, &[0.0], small_parameters()).is_err());
        assert!(ForestRegressor::fit(&[], &[], &[], small_parameters()).is_err());
    }
}
