use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::{InvariantViolation, MergeError, ScheduleError};

use super::{
    evaluation::EvaluatedSchedule,
    validation::{
        assigned, check_entry_balance, check_subblock_counts, check_subblock_exclusivity,
        check_transshipments,
    },
    working_schedule::Schedule,
};

/// Combines a schedule that fixes the subblock assignment with one that fixes the
/// timed entries, then evaluates the result.
///
/// The assignment partial must have the right number of non-conflicting subblocks
/// per period. The entry partial must balance every load against its unloads and
/// meet every transshipment. Every entry has to sit on a subblock the assignment
/// partial gives to the same period.
#[instrument(skip_all, level = "debug")]
pub fn merge(assignments: &Schedule, entries: &Schedule) -> Result<EvaluatedSchedule, ScheduleError> {
    if !Arc::ptr_eq(assignments.problem(), entries.problem()) {
        return Err(MergeError::ProblemMismatch.into());
    }

    check_subblock_counts(assignments)
        .and_then(|_| check_subblock_exclusivity(assignments))
        .map_err(|error| incomplete(error, MergeError::IncompleteAssignments))?;

    check_entry_balance(entries)
        .and_then(|_| check_transshipments(entries))
        .map_err(|error| incomplete(error, MergeError::IncompleteEntries))?;

    let loads = entries.loads().keys().copied();
    let unloads = entries.unloads().keys().map(|key| key.load_key());
    for key in loads.chain(unloads) {
        if !assigned(assignments, key.period).contains(&key.subblock) {
            return Err(MergeError::EntryOnUnassignedSubblock {
                period: key.period,
                subblock: key.subblock,
            }
            .into());
        }
    }

    let merged = Schedule::from_parts(
        Arc::clone(assignments.problem()),
        assignments.assignments().to_vec(),
        entries.loads().clone(),
        entries.unloads().clone(),
        assignments.allow_modification(),
    );

    debug!(
        loads = merged.loads().len(),
        unloads = merged.unloads().len(),
        "Merged partial schedules"
    );

    merged.evaluate()
}

fn incomplete(error: ScheduleError, wrap: fn(InvariantViolation) -> MergeError) -> ScheduleError {
    match error {
        ScheduleError::Invariant(violation) => wrap(violation).into(),
        other => other,
    }
}
