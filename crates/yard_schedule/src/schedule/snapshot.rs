use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    error::ScheduleError,
    problem::{
        Quantity, TimeStep, subblock::SubblockIdx, vessel_period::PeriodIdx,
        yard_problem::YardProblem,
    },
    utils::enumerate_idx::EnumerateIdx,
};

use super::{evaluation::EvaluatedSchedule, evaluation::Objectives, working_schedule::Schedule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "Assignment")]
pub struct AssignmentRecord {
    pub period: PeriodIdx,
    pub subblocks: Vec<SubblockIdx>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "Load")]
pub struct LoadRecord {
    pub period: PeriodIdx,
    pub subblock: SubblockIdx,
    pub time: TimeStep,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "Unload")]
pub struct UnloadRecord {
    pub origin: PeriodIdx,
    pub period: PeriodIdx,
    pub subblock: SubblockIdx,
    pub time: TimeStep,
    pub quantity: Quantity,
}

/// Information about the solve that produced a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SolveMetadata {
    /// Relative optimality gap reported by the solver, if any.
    pub gap: Option<f64>,
    pub elapsed: SignedDuration,
    pub solver: String,
    pub created_at: Timestamp,
}

impl SolveMetadata {
    pub fn new(solver: impl Into<String>) -> Self {
        SolveMetadata {
            gap: None,
            elapsed: SignedDuration::ZERO,
            solver: solver.into(),
            created_at: Timestamp::now(),
        }
    }

    pub fn with_gap(mut self, gap: f64) -> Self {
        self.gap = Some(gap);
        self
    }

    pub fn with_elapsed(mut self, elapsed: SignedDuration) -> Self {
        self.elapsed = elapsed;
        self
    }
}

/// Encoding-neutral view of an evaluated schedule. Records are ordered by period,
/// then subblock, then origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "Solution")]
pub struct SolutionSnapshot {
    pub assignments: Vec<AssignmentRecord>,
    pub loads: Vec<LoadRecord>,
    pub unloads: Vec<UnloadRecord>,
    pub objectives: Objectives,
    pub metadata: SolveMetadata,
}

impl EvaluatedSchedule {
    pub fn snapshot(&self, metadata: SolveMetadata) -> SolutionSnapshot {
        let schedule = self.schedule();

        let assignments = schedule
            .assignments()
            .iter()
            .enumerate_idx()
            .map(|(period, subblocks)| AssignmentRecord {
                period,
                subblocks: subblocks.clone(),
            })
            .collect();

        let loads = schedule
            .loads()
            .iter()
            .map(|(key, entry)| LoadRecord {
                period: key.period,
                subblock: key.subblock,
                time: entry.time,
                quantity: entry.quantity,
            })
            .collect();

        let unloads = schedule
            .unloads()
            .iter()
            .map(|(key, entry)| UnloadRecord {
                origin: key.origin,
                period: key.period,
                subblock: key.subblock,
                time: entry.time,
                quantity: entry.quantity,
            })
            .collect();

        SolutionSnapshot {
            assignments,
            loads,
            unloads,
            objectives: *self.objectives(),
            metadata,
        }
    }
}

impl Schedule {
    /// Rebuilds a schedule from a snapshot taken against `problem`.
    ///
    /// Assignments are restored first so slot order is kept. Stored objectives are
    /// ignored; evaluating the result recomputes them.
    #[instrument(skip_all, level = "debug")]
    pub fn from_snapshot(
        problem: Arc<YardProblem>,
        snapshot: &SolutionSnapshot,
    ) -> Result<Schedule, ScheduleError> {
        let mut schedule = Schedule::new(problem);

        for record in &snapshot.assignments {
            for &subblock in &record.subblocks {
                schedule.set_subblock(record.period, subblock)?;
            }
        }

        for record in &snapshot.loads {
            schedule.set_load_entry(record.period, record.subblock, record.time, record.quantity)?;
        }

        for record in &snapshot.unloads {
            schedule.set_unload_entry(
                record.origin,
                record.period,
                record.subblock,
                record.time,
                record.quantity,
            )?;
        }

        debug!(
            solver = %snapshot.metadata.solver,
            loads = snapshot.loads.len(),
            unloads = snapshot.unloads.len(),
            "Restored schedule from snapshot"
        );

        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::StateConflictError,
        test_utils::{self, P0, P1, S0, S1, S2},
    };

    use super::*;

    fn snapshot() -> SolutionSnapshot {
        let evaluated = test_utils::feasible_schedule().evaluate().unwrap();
        evaluated.snapshot(
            SolveMetadata::new("local-search")
                .with_gap(0.05)
                .with_elapsed(SignedDuration::from_secs(3)),
        )
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let snapshot = snapshot();

        assert_eq!(
            snapshot.assignments,
            vec![
                AssignmentRecord {
                    period: P0,
                    subblocks: vec![S2]
                },
                AssignmentRecord {
                    period: P1,
                    subblocks: vec![S0, S1]
                },
            ]
        );
        assert_eq!(
            snapshot
                .loads
                .iter()
                .map(|load| (load.period, load.subblock))
                .collect::<Vec<_>>(),
            vec![(P0, S2), (P1, S0), (P1, S1)]
        );
        assert_eq!(
            snapshot
                .unloads
                .iter()
                .map(|unload| (unload.origin, unload.period, unload.subblock))
                .collect::<Vec<_>>(),
            vec![(P1, P0, S2), (P0, P1, S0), (P0, P1, S1)]
        );
        assert_eq!(snapshot.objectives.routing_cost, 51.0);
        assert_eq!(snapshot.metadata.solver, "local-search");
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot = snapshot();

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["assignments"][1]["subblocks"], serde_json::json!([0, 1]));
        assert_eq!(json["loads"][0]["time"], 15);
        assert_eq!(json["metadata"]["gap"], 0.05);
        assert!(json["metadata"]["elapsed"].is_string());

        let parsed: SolutionSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_restore_from_snapshot() {
        let snapshot = snapshot();
        let problem = test_utils::fixture_problem_arc();

        let restored = Schedule::from_snapshot(problem, &snapshot)
            .unwrap()
            .evaluate()
            .unwrap();

        restored.validate().unwrap();
        assert_eq!(restored.objectives(), &snapshot.objectives);
        assert_eq!(restored.schedule().assignments()[1], vec![S0, S1]);
    }

    #[test]
    fn test_duplicate_records_are_rejected() {
        let mut snapshot = snapshot();
        let duplicate = snapshot.loads[0].clone();
        snapshot.loads.push(duplicate);

        let error = Schedule::from_snapshot(test_utils::fixture_problem_arc(), &snapshot)
            .unwrap_err();

        assert!(matches!(
            error,
            ScheduleError::StateConflict(StateConflictError::LoadEntryAlreadySet { .. })
        ));
    }
}
