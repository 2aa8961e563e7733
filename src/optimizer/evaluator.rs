use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::OperationSchedule;
use crate::simulation::{Scenario, SimulationEngine, SimulationResult};

/// Weight of the squared setpoint deviation
pub const COMFORT_WEIGHT: f64 = 50.0;
/// Weight of each on/off transition
pub const SWITCH_WEIGHT: f64 = 10.0;

/// Simulated trajectory together with its penalty breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub simulation: SimulationResult,
    /// `Σ (T_i − setpoint)²` over `i ≥ 1`
    pub comfort_penalty: f64,
    /// Number of state changes in the schedule
    pub switch_penalty: usize,
    /// `50·comfort + 10·switches + energy`, lower is better
    pub total_score: f64,
    pub avg_deviation: f64,
}

impl EvaluationResult {
    pub fn total_energy(&self) -> f64 {
        self.simulation.total_energy
    }

    pub fn final_temperature(&self) -> f64 {
        self.simulation.final_temperature()
    }
}

/// Score a simulated trajectory. `T_0` is the given starting state and
/// carries no penalty.
pub fn score_trajectory(
    simulation: SimulationResult,
    setpoint: f64,
    switch_penalty: usize,
) -> EvaluationResult {
    let deviations: Vec<f64> = simulation
        .temperatures
        .iter()
        .skip(1)
        .map(|temp| temp - setpoint)
        .collect();

    let comfort_penalty: f64 = deviations.iter().map(|d| d * d).sum();
    let avg_deviation = if deviations.is_empty() {
        0.0
    } else {
        deviations.iter().map(|d| d.abs()).sum::<f64>() / deviations.len() as f64
    };
    let total_score =
        COMFORT_WEIGHT * comfort_penalty
            + SWITCH_WEIGHT * switch_penalty as f64
            + simulation.total_energy;

    EvaluationResult {
        simulation,
        comfort_penalty,
        switch_penalty,
        total_score,
        avg_deviation,
    }
}

/// Anything that can turn a candidate schedule into a score
pub trait ScheduleScorer {
    /// Horizon every candidate must span
    fn duration(&self) -> usize;

    fn setpoint(&self) -> f64;

    fn evaluate(&self, schedule: &OperationSchedule) -> Result<EvaluationResult>;
}

/// Scores schedules against one scenario with one engine
#[derive(Debug, Clone, Copy)]
pub struct ScheduleEvaluator<'a> {
    engine: &'a SimulationEngine,
    scenario: &'a Scenario,
}

impl<'a> ScheduleEvaluator<'a> {
    pub fn new(engine: &'a SimulationEngine, scenario: &'a Scenario) -> Self {
        Self { engine, scenario }
    }

    pub fn scenario(&self) -> &Scenario {
        self.scenario
    }
}

impl ScheduleScorer for ScheduleEvaluator<'_> {
    fn duration(&self) -> usize {
        self.scenario.duration()
    }

    fn setpoint(&self) -> f64 {
        self.scenario.setpoint
    }

    fn evaluate(&self, schedule: &OperationSchedule) -> Result<EvaluationResult> {
        let simulation = self.engine.simulate(schedule, self.scenario)?;
        Ok(score_trajectory(simulation, self.scenario.setpoint, schedule.switch_count()))
    }
}
