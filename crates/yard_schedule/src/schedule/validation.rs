use std::collections::BTreeMap;

use smallvec::SmallVec;
use tracing::{debug, instrument};

use crate::{
    error::{InvariantViolation, ScheduleError},
    problem::{road::FlowKind, subblock::SubblockIdx, vessel_period::PeriodIdx},
    utils::enumerate_idx::EnumerateIdx,
};

use super::{
    evaluation::{EvaluatedSchedule, Evaluation},
    keys::LoadKey,
    working_schedule::Schedule,
};

impl EvaluatedSchedule {
    /// Checks every feasibility invariant in order and reports the first violation.
    ///
    /// An infeasible schedule yields [`ScheduleError::Invariant`]; any other error
    /// means the schedule and problem disagree.
    #[instrument(skip_all, level = "debug")]
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let result = validate(self.schedule(), self.evaluation());
        if let Err(error) = &result {
            debug!(%error, "Schedule rejected");
        }

        result
    }

    pub fn is_feasible(&self) -> bool {
        self.validate().is_ok()
    }
}

fn validate(schedule: &Schedule, evaluation: &Evaluation) -> Result<(), ScheduleError> {
    check_subblock_counts(schedule)?;
    check_subblock_exclusivity(schedule)?;
    check_subblock_balance(schedule)?;
    check_transshipments(schedule)?;
    check_load_timing(schedule)?;
    check_unload_timing(schedule)?;
    check_road_capacity(schedule, evaluation)
}

/// Every period holds exactly as many subblocks as its inbound containers need.
pub(crate) fn check_subblock_counts(schedule: &Schedule) -> Result<(), ScheduleError> {
    let problem = schedule.problem();
    for (period, subblocks) in schedule.assignments().iter().enumerate_idx() {
        let expected = problem.required_subblocks(period)?;
        if subblocks.len() != expected {
            return Err(InvariantViolation::SubblockCountMismatch {
                period,
                expected,
                actual: subblocks.len(),
            }
            .into());
        }
    }

    Ok(())
}

/// Periods sharing a subblock must have disjoint occupancy windows.
pub(crate) fn check_subblock_exclusivity(schedule: &Schedule) -> Result<(), ScheduleError> {
    let problem = schedule.problem();
    let horizon = problem.horizon();

    let mut users: Vec<SmallVec<[PeriodIdx; 4]>> =
        vec![SmallVec::new(); problem.subblocks().len()];
    for (period, subblocks) in schedule.assignments().iter().enumerate_idx() {
        for &subblock in subblocks {
            users[subblock.get()].push(period);
        }
    }

    for (subblock, periods) in users.iter().enumerate_idx() {
        for (index, &first) in periods.iter().enumerate() {
            let first_window = problem.period(first)?.occupancy_window();
            for &second in &periods[index + 1..] {
                let second_window = problem.period(second)?.occupancy_window();
                if first_window.is_intersecting(&second_window, horizon)? {
                    return Err(InvariantViolation::SubblockConflict {
                        subblock,
                        first,
                        second,
                    }
                    .into());
                }
            }
        }
    }

    Ok(())
}

/// Entries only touch assigned subblocks, every assigned subblock is loaded, and
/// each load equals the unloads feeding it without exceeding capacity.
pub(crate) fn check_subblock_balance(schedule: &Schedule) -> Result<(), ScheduleError> {
    check_entries_on_assigned_subblocks(schedule)?;

    for (period, subblocks) in schedule.assignments().iter().enumerate_idx() {
        for &subblock in subblocks {
            if schedule.load_entry(&LoadKey::new(period, subblock)).is_none() {
                return Err(InvariantViolation::MissingLoadEntry { period, subblock }.into());
            }
        }
    }

    check_entry_balance(schedule)
}

pub(crate) fn check_entries_on_assigned_subblocks(
    schedule: &Schedule,
) -> Result<(), ScheduleError> {
    let loads = schedule.loads().keys().copied();
    let unloads = schedule.unloads().keys().map(|key| key.load_key());
    for key in loads.chain(unloads) {
        if !schedule.is_assigned(key.period, key.subblock) {
            return Err(InvariantViolation::UnassignedEntry {
                period: key.period,
                subblock: key.subblock,
            }
            .into());
        }
    }

    Ok(())
}

/// Per subblock of a period, the load equals the sum of the unloads into it and
/// fits the subblock.
pub(crate) fn check_entry_balance(schedule: &Schedule) -> Result<(), ScheduleError> {
    let capacity = schedule.problem().subblock_capacity();

    for (&key, entry) in schedule.loads() {
        let load = entry.quantity as u64;
        let unload = schedule.unloaded_quantity(key);
        if load != unload {
            return Err(InvariantViolation::LoadUnloadMismatch {
                period: key.period,
                subblock: key.subblock,
                load,
                unload,
            }
            .into());
        }

        if load > capacity as u64 {
            return Err(InvariantViolation::SubblockCapacityExceeded {
                period: key.period,
                subblock: key.subblock,
                quantity: load,
                capacity,
            }
            .into());
        }
    }

    for key in schedule.unloads().keys() {
        if schedule.load_entry(&key.load_key()).is_none() {
            return Err(InvariantViolation::MissingLoadEntry {
                period: key.period,
                subblock: key.subblock,
            }
            .into());
        }
    }

    Ok(())
}

/// Unloads between two periods add up to their transshipment exactly.
pub(crate) fn check_transshipments(schedule: &Schedule) -> Result<(), ScheduleError> {
    let problem = schedule.problem();

    let mut moved: BTreeMap<(PeriodIdx, PeriodIdx), u64> = BTreeMap::new();
    for (key, entry) in schedule.unloads() {
        *moved.entry((key.origin, key.period)).or_default() += entry.quantity as u64;
    }

    for transshipment in problem.transshipments() {
        let expected = transshipment.quantity as u64;
        let actual = moved
            .get(&(transshipment.origin, transshipment.destination))
            .copied()
            .unwrap_or(0);
        if actual != expected {
            return Err(InvariantViolation::TransshipmentMismatch {
                origin: transshipment.origin,
                destination: transshipment.destination,
                expected,
                actual,
            }
            .into());
        }
    }

    for (&(origin, destination), &actual) in &moved {
        if problem.transshipment_quantity(origin, destination)? == 0 {
            return Err(InvariantViolation::TransshipmentMismatch {
                origin,
                destination,
                expected: 0,
                actual,
            }
            .into());
        }
    }

    Ok(())
}

/// Loads happen inside the feasible window of their period. How far they stray
/// from the expected window is a cost, not a violation.
pub(crate) fn check_load_timing(schedule: &Schedule) -> Result<(), ScheduleError> {
    let problem = schedule.problem();
    let horizon = problem.horizon();

    for (key, entry) in schedule.loads() {
        let period = problem.period(key.period)?;
        if !period.feasible_window().contains(entry.time, horizon)? {
            return Err(InvariantViolation::LoadOutsideFeasibleWindow {
                period: key.period,
                subblock: key.subblock,
                time: entry.time,
            }
            .into());
        }
    }

    Ok(())
}

/// Unloads happen inside the destination period, strictly before the load they
/// feed, and inside the feasible window of their origin.
pub(crate) fn check_unload_timing(schedule: &Schedule) -> Result<(), ScheduleError> {
    let problem = schedule.problem();
    let horizon = problem.horizon();

    for (key, entry) in schedule.unloads() {
        let destination = problem.period(key.period)?;
        let window = destination.window();
        if !window.contains(entry.time, horizon)? {
            return Err(InvariantViolation::UnloadOutsidePeriod {
                origin: key.origin,
                period: key.period,
                subblock: key.subblock,
                time: entry.time,
            }
            .into());
        }

        let load = schedule.load_entry(&key.load_key()).ok_or(
            InvariantViolation::MissingLoadEntry {
                period: key.period,
                subblock: key.subblock,
            },
        )?;
        if window.shifts_from_start(entry.time, horizon)?
            >= window.shifts_from_start(load.time, horizon)?
        {
            return Err(InvariantViolation::UnloadNotBeforeLoad {
                origin: key.origin,
                period: key.period,
                subblock: key.subblock,
                unload_time: entry.time,
                load_time: load.time,
            }
            .into());
        }

        let origin = problem.period(key.origin)?;
        if !origin.feasible_window().contains(entry.time, horizon)? {
            return Err(InvariantViolation::UnloadOutsideFeasibleWindow {
                origin: key.origin,
                period: key.period,
                subblock: key.subblock,
                time: entry.time,
            }
            .into());
        }
    }

    Ok(())
}

/// No road carries more load or unload operations per time step than it allows.
pub(crate) fn check_road_capacity(
    schedule: &Schedule,
    evaluation: &Evaluation,
) -> Result<(), ScheduleError> {
    let problem = schedule.problem();

    for kind in [FlowKind::Load, FlowKind::Unload] {
        let mut flows: Vec<_> = evaluation.flows(kind).iter().collect();
        flows.sort_unstable_by_key(|(key, _)| **key);

        for (&(road, time), &flow) in flows {
            let capacity = problem.road(road)?.capacity(kind);
            if flow > capacity {
                return Err(InvariantViolation::RoadCapacityExceeded {
                    road,
                    time,
                    kind,
                    flow,
                    capacity,
                }
                .into());
            }
        }
    }

    Ok(())
}

/// Subblocks assigned to `period`, used by the merge checks.
pub(crate) fn assigned(schedule: &Schedule, period: PeriodIdx) -> &[SubblockIdx] {
    schedule
        .assignments()
        .get(period.get())
        .map_or(&[], Vec::as_slice)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        error::Invariant,
        problem::{
            TimeStep,
            road::Road,
            vessel::{Vessel, VesselBuilder},
            yard_problem::{YardProblem, YardProblemBuilder},
        },
        schedule::assignment_diff::SubblockChange,
        test_utils::{self, P0, P1, R0, S0, S1, S2, S3},
    };

    use super::*;

    fn violation(schedule: Schedule) -> InvariantViolation {
        let error = schedule.evaluate().unwrap().validate().unwrap_err();
        assert!(error.is_infeasible());
        error.violation().cloned().unwrap()
    }

    fn vessel(
        period_length: TimeStep,
        idle_time_steps: TimeStep,
        arrival: TimeStep,
        feasible: (TimeStep, TimeStep),
        expected: (TimeStep, TimeStep),
    ) -> Vessel {
        let mut builder = VesselBuilder::default();
        builder
            .set_external_id(format!("vessel-{arrival}"))
            .set_period_length(period_length)
            .set_idle_time_steps(idle_time_steps)
            .set_arrival(arrival)
            .set_feasible_window(feasible.0, feasible.1)
            .set_expected_window(expected.0, expected.1)
            .set_earliness_cost(1.0)
            .set_tardiness_cost(2.0);
        builder.build().unwrap()
    }

    /// One subblock without roads; `origin` sends 5 containers to `destination`.
    fn single_subblock_problem(
        horizon: TimeStep,
        vessels: Vec<Vessel>,
        origin: PeriodIdx,
        destination: PeriodIdx,
    ) -> Arc<YardProblem> {
        let periods: usize = vessels
            .iter()
            .map(|vessel| vessel.periods_per_horizon(horizon).unwrap())
            .sum();

        let mut builder = YardProblemBuilder::default();
        builder
            .set_horizon(horizon)
            .set_subblock_capacity(10)
            .set_vessels(vessels)
            .set_subblocks(vec![test_utils::create_subblock("S0", 0, 0, 0, 0)])
            .set_distances_to(vec![vec![1.0]; periods])
            .set_distances_from(vec![vec![1.0]; periods])
            .add_transshipment(origin, destination, 5);
        Arc::new(builder.build().unwrap())
    }

    /// Loads `destination` at `load` from a single unload at `unload`.
    fn single_transfer(
        problem: &Arc<YardProblem>,
        origin: PeriodIdx,
        destination: PeriodIdx,
        load: TimeStep,
        unload: TimeStep,
    ) -> Schedule {
        let mut schedule = Schedule::new(Arc::clone(problem));
        schedule.set_load_entry(destination, S0, load, 5).unwrap();
        schedule
            .set_unload_entry(origin, destination, S0, unload, 5)
            .unwrap();
        schedule
    }

    fn modifiable() -> Schedule {
        let mut schedule = test_utils::feasible_schedule();
        schedule.set_allow_modification(true);
        schedule
    }

    #[test]
    fn test_feasible_schedule_passes() {
        let evaluated = test_utils::feasible_schedule().evaluate().unwrap();

        evaluated.validate().unwrap();
        evaluated.validate().unwrap();
        assert!(evaluated.is_feasible());
    }

    #[test]
    fn test_empty_schedule_fails_the_count_check() {
        let schedule = Schedule::new(test_utils::fixture_problem_arc());

        assert_eq!(
            violation(schedule),
            InvariantViolation::SubblockCountMismatch {
                period: P0,
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn test_extra_subblock_fails_the_count_check() {
        let mut schedule = test_utils::feasible_schedule();
        schedule.set_subblock(P0, S3).unwrap();

        assert_eq!(
            violation(schedule),
            InvariantViolation::SubblockCountMismatch {
                period: P0,
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn test_overlapping_periods_cannot_share_a_subblock() {
        let mut schedule = modifiable();
        schedule
            .apply_change(&SubblockChange::compute(P0, &[S2], &[S0]))
            .unwrap();

        let violation = violation(schedule);
        assert_eq!(
            violation,
            InvariantViolation::SubblockConflict {
                subblock: S0,
                first: P0,
                second: P1
            }
        );
        assert_eq!(violation.invariant(), Invariant::SubblockExclusivity);
    }

    #[test]
    fn test_assigned_subblock_needs_a_load() {
        let mut schedule = modifiable();
        schedule
            .apply_change(&SubblockChange::compute(P0, &[S2], &[S3]))
            .unwrap();

        assert_eq!(
            violation(schedule),
            InvariantViolation::MissingLoadEntry {
                period: P0,
                subblock: S3
            }
        );
    }

    #[test]
    fn test_entries_must_sit_on_assigned_subblocks() {
        let feasible = test_utils::feasible_schedule();
        let schedule = Schedule::from_parts(
            Arc::clone(feasible.problem()),
            vec![vec![S3], vec![S0, S1]],
            feasible.loads().clone(),
            feasible.unloads().clone(),
            false,
        );

        assert_eq!(
            violation(schedule),
            InvariantViolation::UnassignedEntry {
                period: P0,
                subblock: S2
            }
        );
    }

    #[test]
    fn test_load_must_match_unloads() {
        let mut schedule = modifiable();
        schedule.set_load_entry(P1, S0, 5, 6).unwrap();

        assert_eq!(
            violation(schedule),
            InvariantViolation::LoadUnloadMismatch {
                period: P1,
                subblock: S0,
                load: 6,
                unload: 7
            }
        );
    }

    #[test]
    fn test_load_must_fit_the_subblock() {
        let mut schedule = modifiable();
        schedule.set_load_entry(P1, S0, 5, 12).unwrap();
        schedule.set_unload_entry(P0, P1, S0, 14, 12).unwrap();

        let violation = violation(schedule);
        assert_eq!(
            violation,
            InvariantViolation::SubblockCapacityExceeded {
                period: P1,
                subblock: S0,
                quantity: 12,
                capacity: 10
            }
        );
        assert_eq!(violation.invariant(), Invariant::SubblockBalance);
    }

    #[test]
    fn test_transshipment_must_be_met_exactly() {
        let mut schedule = modifiable();
        schedule.set_load_entry(P1, S1, 5, 4).unwrap();
        schedule.set_unload_entry(P0, P1, S1, 14, 4).unwrap();

        assert_eq!(
            violation(schedule),
            InvariantViolation::TransshipmentMismatch {
                origin: P0,
                destination: P1,
                expected: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn test_load_outside_feasible_window() {
        let mut schedule = modifiable();
        // P0 loads during [10, 20)
        schedule.set_load_entry(P0, S2, 8, 5).unwrap();

        let violation = violation(schedule);
        assert_eq!(
            violation,
            InvariantViolation::LoadOutsideFeasibleWindow {
                period: P0,
                subblock: S2,
                time: 8
            }
        );
        assert_eq!(violation.invariant(), Invariant::LoadTiming);
    }

    #[test]
    fn test_tardy_load_is_feasible() {
        let mut schedule = modifiable();
        schedule.set_load_entry(P0, S2, 19, 5).unwrap();

        let evaluated = schedule.evaluate().unwrap();
        evaluated.validate().unwrap();
        assert_eq!(evaluated.evaluation().deviation(P0).unwrap().tardiness, 4);
    }

    #[test]
    fn test_unload_during_idle_steps_is_feasible() {
        // P0 idles over [0, 5), P1 unloads during [2, 10)
        let problem = single_subblock_problem(
            20,
            vec![
                vessel(20, 5, 0, (10, 10), (12, 4)),
                vessel(20, 2, 10, (12, 8), (14, 4)),
            ],
            P1,
            P0,
        );

        let evaluated = single_transfer(&problem, P1, P0, 15, 3).evaluate().unwrap();
        evaluated.validate().unwrap();
    }

    #[test]
    fn test_unload_outside_destination_period() {
        let p2 = PeriodIdx::new(2);
        // P0 spans [0, 20), P2 unloads during [20, 40)
        let problem = single_subblock_problem(
            40,
            vec![
                vessel(20, 2, 0, (10, 10), (12, 4)),
                vessel(40, 0, 0, (20, 20), (20, 20)),
            ],
            p2,
            P0,
        );

        let violation = violation(single_transfer(&problem, p2, P0, 15, 25));
        assert_eq!(
            violation,
            InvariantViolation::UnloadOutsidePeriod {
                origin: p2,
                period: P0,
                subblock: S0,
                time: 25
            }
        );
        assert_eq!(violation.invariant(), Invariant::UnloadTiming);
    }

    #[test]
    fn test_windows_wrapping_into_the_period_start() {
        // P0 spans [5, 5) with feasible [0, 10) and expected [1, 7)
        let problem = single_subblock_problem(
            20,
            vec![
                vessel(20, 2, 5, (15, 10), (16, 6)),
                vessel(20, 2, 10, (12, 8), (14, 4)),
            ],
            P1,
            P0,
        );

        let on_time = single_transfer(&problem, P1, P0, 6, 5).evaluate().unwrap();
        on_time.validate().unwrap();
        assert!(on_time.evaluation().deviation(P0).unwrap().is_zero());
        assert_eq!(on_time.objectives().time_deviation_cost, 0.0);

        let tardy = single_transfer(&problem, P1, P0, 8, 5).evaluate().unwrap();
        tardy.validate().unwrap();
        assert_eq!(tardy.evaluation().deviation(P0).unwrap().tardiness, 2);
        assert_eq!(tardy.objectives().time_deviation_cost, 4.0);

        assert_eq!(
            violation(single_transfer(&problem, P1, P0, 11, 5)),
            InvariantViolation::LoadOutsideFeasibleWindow {
                period: P0,
                subblock: S0,
                time: 11
            }
        );
    }

    #[test]
    fn test_windows_running_into_the_next_period() {
        let p2 = PeriodIdx::new(2);
        // P0 spans [5, 25) with feasible [20, 30) and expected [21, 27)
        let problem = single_subblock_problem(
            40,
            vec![
                vessel(20, 2, 5, (15, 10), (16, 6)),
                vessel(40, 0, 0, (10, 10), (12, 4)),
            ],
            p2,
            P0,
        );

        let on_time = single_transfer(&problem, p2, P0, 26, 14).evaluate().unwrap();
        on_time.validate().unwrap();
        assert!(on_time.evaluation().deviation(P0).unwrap().is_zero());

        let tardy = single_transfer(&problem, p2, P0, 28, 14).evaluate().unwrap();
        tardy.validate().unwrap();
        assert_eq!(tardy.evaluation().deviation(P0).unwrap().tardiness, 2);
    }

    #[test]
    fn test_unload_must_precede_load() {
        let mut schedule = modifiable();
        schedule.set_load_entry(P0, S2, 12, 5).unwrap();
        schedule.set_unload_entry(P1, P0, S2, 12, 5).unwrap();

        let violation = violation(schedule);
        assert_eq!(
            violation,
            InvariantViolation::UnloadNotBeforeLoad {
                origin: P1,
                period: P0,
                subblock: S2,
                unload_time: 12,
                load_time: 12
            }
        );
        assert_eq!(violation.invariant(), Invariant::UnloadTiming);
    }

    #[test]
    fn test_unload_outside_origin_feasible_window() {
        let mut schedule = modifiable();
        // P1 unloads during [2, 10)
        schedule.set_unload_entry(P1, P0, S2, 11, 5).unwrap();

        assert_eq!(
            violation(schedule),
            InvariantViolation::UnloadOutsideFeasibleWindow {
                origin: P1,
                period: P0,
                subblock: S2,
                time: 11
            }
        );
    }

    #[test]
    fn test_road_capacity_exceeded() {
        let mut builder = test_utils::fixture_problem_builder();
        builder.set_roads(vec![Road::new("north", 1, 2), Road::new("south", 2, 2)]);
        let schedule = test_utils::feasible_schedule_for(Arc::new(builder.build().unwrap()));

        let violation = violation(schedule);
        assert_eq!(
            violation,
            InvariantViolation::RoadCapacityExceeded {
                road: R0,
                time: 5,
                kind: FlowKind::Load,
                flow: 2,
                capacity: 1
            }
        );
        assert_eq!(violation.invariant(), Invariant::RoadCapacity);
    }
}
