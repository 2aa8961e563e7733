use anyhow::Result;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use super::{biased_search, EvaluationResult, ScheduleScorer};
use crate::domain::OperationSchedule;

/// Largest |T_end − setpoint| for which leaving the unit off is acceptable
pub const COMFORT_BAND: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecommendationType {
    AllOff,
    Optimized,
}

/// Which search answers a prediction request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OptimizationType {
    /// Full biased search
    Peak,
    /// All-OFF when it stays in the comfort band, biased search otherwise
    Normal,
}

impl OptimizationType {
    pub fn strategy(self, comfort_band: f64) -> Box<dyn OptimizationStrategy> {
        match self {
            OptimizationType::Peak => Box::new(BiasedSearch),
            OptimizationType::Normal => Box::new(NormalConditions { comfort_band }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommended_operation: OperationSchedule,
    pub recommendation_type: RecommendationType,
    pub total_energy: f64,
    pub temperatures: Vec<f64>,
    /// Energy saved relative to running all-ON, in percent
    pub savings_percentage: f64,
    pub avg_deviation: f64,
    pub total_score: f64,
}

impl Recommendation {
    fn new(
        schedule: OperationSchedule,
        recommendation_type: RecommendationType,
        evaluation: EvaluationResult,
        baseline_energy: f64,
    ) -> Self {
        let savings_percentage = savings_percentage(baseline_energy, evaluation.total_energy());
        Self {
            recommended_operation: schedule,
            recommendation_type,
            total_energy: evaluation.simulation.total_energy,
            temperatures: evaluation.simulation.temperatures,
            savings_percentage,
            avg_deviation: evaluation.avg_deviation,
            total_score: evaluation.total_score,
        }
    }
}

/// `(baseline − candidate) / baseline · 100`, or 0 when the baseline used no energy
pub fn savings_percentage(baseline_energy: f64, candidate_energy: f64) -> f64 {
    if baseline_energy.abs() < f64::EPSILON {
        return 0.0;
    }
    (baseline_energy - candidate_energy) / baseline_energy * 100.0
}

fn all_on_energy(scorer: &dyn ScheduleScorer) -> Result<f64> {
    let all_on = scorer.evaluate(&OperationSchedule::all_on(scorer.duration()))?;
    Ok(all_on.total_energy())
}

/// Run the biased search and report savings against all-ON
pub fn optimize_peak(scorer: &dyn ScheduleScorer) -> Result<Recommendation> {
    let outcome = biased_search(scorer)?;
    let baseline = all_on_energy(scorer)?;
    Ok(Recommendation::new(
        outcome.best_schedule,
        RecommendationType::Optimized,
        outcome.evaluation,
        baseline,
    ))
}

/// Recommend all-OFF when it ends within `comfort_band` of the setpoint,
/// otherwise fall back to the biased search.
pub fn normal_conditions_optimizer(
    scorer: &dyn ScheduleScorer,
    comfort_band: f64,
) -> Result<Recommendation> {
    let duration = scorer.duration();
    let all_off = OperationSchedule::all_off(duration);
    let off_evaluation = scorer.evaluate(&all_off)?;
    let drift = (off_evaluation.final_temperature() - scorer.setpoint()).abs();

    if drift <= comfort_band {
        debug!(duration, drift, "all-off schedule stays within comfort band");
        let baseline = all_on_energy(scorer)?;
        return Ok(Recommendation::new(
            all_off,
            RecommendationType::AllOff,
            off_evaluation,
            baseline,
        ));
    }

    debug!(duration, drift, "all-off drifts out of comfort band, searching");
    optimize_peak(scorer)
}

/// Turns a scorer into a recommended schedule
pub trait OptimizationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn optimize(&self, scorer: &dyn ScheduleScorer) -> Result<Recommendation>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BiasedSearch;

impl OptimizationStrategy for BiasedSearch {
    fn name(&self) -> &'static str {
        "biased_search"
    }

    fn optimize(&self, scorer: &dyn ScheduleScorer) -> Result<Recommendation> {
        optimize_peak(scorer)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NormalConditions {
    pub comfort_band: f64,
}

impl Default for NormalConditions {
    fn default() -> Self {
        Self {
            comfort_band: COMFORT_BAND,
        }
    }
}

impl OptimizationStrategy for NormalConditions {
    fn name(&self) -> &'static str {
        "normal_conditions"
    }

    fn optimize(&self, scorer: &dyn ScheduleScorer) -> Result<Recommendation> {
        normal_conditions_optimizer(scorer, self.comfort_band)
    }
}
