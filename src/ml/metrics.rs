//! Regression quality metrics and the seeded train/test split shared by both
//! sub-model fits.

use anyhow::Result;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

/// Validation Metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Mean absolute percentage error as a fraction (0.05 = 5%)
    pub mape: f64,
}

impl ValidationMetrics {
    pub fn new(r2: f64, rmse: f64, mae: f64, mape: f64) -> Self {
        Self { r2, rmse, mae, mape }
    }
}

/// Compute R², RMSE, MAE and MAPE of `predictions` against `targets`
pub fn calculate_metrics(predictions: &[f64], targets: &[f64]) -> Result<ValidationMetrics> {
    if predictions.len() != targets.len() {
        anyhow::bail!(
            "Prediction and target count mismatch: {} predictions, {} targets",
            predictions.len(),
            targets.len()
        );
    }

    if predictions.is_empty() {
        anyhow::bail!("No predictions to evaluate");
    }

    let n = predictions.len() as f64;
    let pairs = || predictions.iter().zip(targets.iter());

    let mae = pairs().map(|(p, t)| (p - t).abs()).sum::<f64>() / n;

    let ss_res: f64 = pairs().map(|(p, t)| (t - p).powi(2)).sum();
    let rmse = (ss_res / n).sqrt();

    // Tiny targets are floored at machine epsilon
    let mape = pairs()
        .map(|(p, t)| (p - t).abs() / t.abs().max(f64::EPSILON))
        .sum::<f64>()
        / n;

    let mean_target = targets.iter().sum::<f64>() / n;
    let ss_tot: f64 = targets.iter().map(|t| (t - mean_target).powi(2)).sum();

    let r2 = if ss_tot.abs() < 1e-12 {
        if ss_res.abs() < 1e-12 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - (ss_res / ss_tot)
    };

    Ok(ValidationMetrics::new(r2, rmse, mae, mape))
}

/// Shuffled index partition into training and held-out rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainTestSplit {
    /// Shuffle `0..n` with a fixed seed and hold out `ceil(n * (1 - train_ratio))`
    /// rows. At least one row always stays in the training partition.
    pub fn seeded(n: usize, train_ratio: f64, seed: u64) -> Self {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let ratio = train_ratio.clamp(0.0, 1.0);
        let mut test_len = (n as f64 * (1.0 - ratio)).ceil() as usize;
        if test_len >= n {
            test_len = n.saturating_sub(1);
        }

        let test = indices.split_off(n - test_len);
        Self {
            train: indices,
            test,
        }
    }

    /// Rows used for scoring: the held-out rows, or the training rows when
    /// the dataset was too small to hold anything out.
    pub fn evaluation_rows(&self) -> &[usize] {
        if self.test.is_empty() {
            &self.train
        } else {
            &self.test
        }
    }
}

/// Gather `values[i]` for each index
pub fn select<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}
