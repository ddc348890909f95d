use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, instrument};

use crate::error::ScheduleError;

use super::{evaluation::EvaluatedSchedule, working_schedule::Schedule};

/// Evaluates and validates independent candidates in parallel.
///
/// Results come back in input order. An infeasible candidate yields its
/// violation without affecting the others.
#[instrument(skip_all, level = "debug", fields(candidates = candidates.len()))]
pub fn evaluate_all(candidates: Vec<Schedule>) -> Vec<Result<EvaluatedSchedule, ScheduleError>> {
    let results: Vec<_> = candidates
        .into_par_iter()
        .map(|schedule| {
            let evaluated = schedule.evaluate()?;
            evaluated.validate()?;
            Ok(evaluated)
        })
        .collect();

    debug!(
        feasible = results.iter().filter(|result| result.is_ok()).count(),
        "Evaluated candidates"
    );

    results
}

/// Cheapest feasible candidate, or the first error if none is feasible.
pub fn best_feasible(candidates: Vec<Schedule>) -> Result<EvaluatedSchedule, ScheduleError> {
    let mut best: Option<EvaluatedSchedule> = None;
    let mut first_error = None;

    for result in evaluate_all(candidates) {
        match result {
            Ok(evaluated) => {
                let improves = best.as_ref().is_none_or(|current| {
                    evaluated.objectives().total_cost < current.objectives().total_cost
                });
                if improves {
                    best = Some(evaluated);
                }
            }
            Err(error) => {
                first_error.get_or_insert(error);
            }
        }
    }

    match (best, first_error) {
        (Some(best), _) => Ok(best),
        (None, Some(error)) => Err(error),
        (None, None) => Err(ScheduleError::NoCandidates),
    }
}
