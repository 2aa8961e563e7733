use anyhow::Result;
use itertools::Itertools;
use tracing::debug;

use super::{EvaluationResult, ScheduleScorer};
use crate::domain::{OperationSchedule, OperationState, MIN_DURATION};
use crate::error::EngineError;

/// Highest number of on/off switches a candidate may contain
pub const MAX_SWITCHES: usize = 2;

/// Candidates `biased_search` evaluates for a horizon of `duration` steps:
/// `2·(C(d,1) + C(d,2))`
pub fn candidate_count(duration: usize) -> usize {
    let pairs = duration * duration.saturating_sub(1) / 2;
    2 * (duration + pairs)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub best_schedule: OperationSchedule,
    pub evaluation: EvaluationResult,
    pub candidates_evaluated: usize,
}

/// Exhaustive search over every schedule with one or two switches.
///
/// A switch at position `p` toggles the state before step `p` is emitted, so
/// a single switch at 0 yields a constant schedule opposite to the starting
/// state. Both all-ON and all-OFF are therefore among the candidates. The
/// first candidate reaching the minimum score is kept.
pub fn biased_search(scorer: &dyn ScheduleScorer) -> Result<SearchOutcome> {
    let duration = scorer.duration();
    if duration < MIN_DURATION {
        return Err(EngineError::InvalidScheduleLength {
            expected: MIN_DURATION,
            actual: duration,
        }
        .into());
    }

    let mut best: Option<(OperationSchedule, EvaluationResult)> = None;
    let mut candidates_evaluated = 0;

    for switches in 1..=MAX_SWITCHES {
        for positions in (0..duration).combinations(switches) {
            for initial in [OperationState::Off, OperationState::On] {
                let candidate = OperationSchedule::with_switches(initial, &positions, duration);
                let evaluation = scorer.evaluate(&candidate)?;
                candidates_evaluated += 1;

                let improves = best
                    .as_ref()
                    .map_or(true, |(_, current)| evaluation.total_score < current.total_score);
                if improves {
                    best = Some((candidate, evaluation));
                }
            }
        }
    }

    let (best_schedule, evaluation) = best.ok_or_else(|| EngineError::InvalidScheduleLength {
        expected: MIN_DURATION,
        actual: duration,
    })?;

    debug!(
        duration,
        candidates_evaluated,
        score = evaluation.total_score,
        switches = best_schedule.switch_count(),
        "biased search finished"
    );

    Ok(SearchOutcome {
        best_schedule,
        evaluation,
        candidates_evaluated,
    })
}
