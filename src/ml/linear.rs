use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Single-coefficient regression without intercept: `y = a·x`.
///
/// Used for the passive (HVAC off) thermal model, where `x` is the
/// indoor/outdoor gap and `y` the indoor temperature change over one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughOriginRegression {
    pub coefficient: f64,
}

impl ThroughOriginRegression {
    /// Ordinary least squares through the origin: `a = Σxy / Σx²`
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            anyhow::bail!(
                "Feature and target count mismatch: {} features, {} targets",
                x.len(),
                y.len()
            );
        }
        if x.is_empty() {
            anyhow::bail!("Cannot train on empty dataset");
        }

        let sxx: f64 = x.iter().map(|v| v * v).sum();
        if sxx < 1e-12 {
            anyhow::bail!("Passive regression is degenerate: indoor/outdoor gap is zero in every sample");
        }
        let sxy: f64 = x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();

        let coefficient = sxy / sxx;
        if !coefficient.is_finite() {
            anyhow::bail!("Passive regression produced a non-finite coefficient");
        }

        Ok(Self { coefficient })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.coefficient * x
    }
}
