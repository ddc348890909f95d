use std::{cmp::Reverse, sync::Arc};

use fxhash::FxHashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    error::{LookupError, ScheduleError},
    problem::{
        Cost, TimeStep,
        road::{FlowKind, RoadIdx},
        vessel_period::{Deviation, PeriodIdx},
        yard_problem::YardProblem,
    },
};

use super::working_schedule::Schedule;

/// Number of operations per road and time step.
pub type FlowTally = FxHashMap<(RoadIdx, TimeStep), u32>;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Objectives {
    pub routing_cost: Cost,
    pub time_deviation_cost: Cost,
    /// Largest excess of flow over capacity on any road and time step.
    pub congestion_overload: u32,
    pub congestion_cost: Cost,
    pub total_cost: Cost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Overload {
    pub road: RoadIdx,
    pub time: TimeStep,
    pub kind: FlowKind,
    pub excess: u32,
}

/// Aggregates derived from the entries of a schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    deviations: Vec<Deviation>,
    load_flows: FlowTally,
    unload_flows: FlowTally,
    worst_overload: Option<Overload>,
    objectives: Objectives,
}

impl Evaluation {
    #[instrument(skip_all, level = "debug")]
    pub(crate) fn compute(schedule: &Schedule) -> Result<Self, ScheduleError> {
        let problem = schedule.problem();
        let horizon = problem.horizon();
        let weights = problem.objective_weights();

        let mut deviations = vec![Deviation::default(); problem.periods().len()];
        let mut load_flows = FlowTally::default();
        let mut unload_flows = FlowTally::default();
        let mut routing_distance = 0.0;

        for (key, entry) in schedule.loads() {
            let deviation = problem.period(key.period)?.deviation(entry.time, horizon)?;
            deviations[key.period] = deviations[key.period].max(deviation);

            for &road in problem.route_from(key.period, key.subblock)? {
                *load_flows.entry((road, entry.time)).or_default() += 1;
            }
        }

        for (key, entry) in schedule.unloads() {
            let deviation = problem.period(key.origin)?.deviation(entry.time, horizon)?;
            deviations[key.origin] = deviations[key.origin].max(deviation);

            for &road in problem.route_to(key.origin, key.subblock)? {
                *unload_flows.entry((road, entry.time)).or_default() += 1;
            }

            routing_distance += entry.quantity as Cost
                * (problem.distance_to(key.origin, key.subblock)?
                    + problem.distance_from(key.period, key.subblock)?);
        }

        let time_deviation: Cost = problem
            .periods()
            .iter()
            .zip(&deviations)
            .map(|(period, deviation)| period.deviation_cost(deviation))
            .sum();

        let mut worst_overload = None;
        find_worst_overload(problem, FlowKind::Load, &load_flows, &mut worst_overload)?;
        find_worst_overload(problem, FlowKind::Unload, &unload_flows, &mut worst_overload)?;
        let congestion_overload = worst_overload.map_or(0, |overload: Overload| overload.excess);

        let routing_cost = routing_distance * weights.route;
        let time_deviation_cost = time_deviation * weights.time_deviation;
        let congestion_cost = congestion_overload as Cost * weights.congestion;
        let objectives = Objectives {
            routing_cost,
            time_deviation_cost,
            congestion_overload,
            congestion_cost,
            total_cost: routing_cost + time_deviation_cost + congestion_cost,
        };

        debug!(
            routing_cost,
            time_deviation_cost,
            congestion_overload,
            congestion_cost,
            total_cost = objectives.total_cost,
            "Evaluated schedule"
        );

        Ok(Evaluation {
            deviations,
            load_flows,
            unload_flows,
            worst_overload,
            objectives,
        })
    }

    pub fn objectives(&self) -> &Objectives {
        &self.objectives
    }

    /// Worst earliness and tardiness over every load of the period and every unload
    /// originating from it.
    pub fn deviation(&self, period_id: PeriodIdx) -> Result<Deviation, LookupError> {
        self.deviations
            .get(period_id.get())
            .copied()
            .ok_or(LookupError::UnknownPeriod(period_id))
    }

    pub fn deviations(&self) -> &[Deviation] {
        &self.deviations
    }

    pub fn flows(&self, kind: FlowKind) -> &FlowTally {
        match kind {
            FlowKind::Load => &self.load_flows,
            FlowKind::Unload => &self.unload_flows,
        }
    }

    pub fn flow(&self, kind: FlowKind, road: RoadIdx, time: TimeStep) -> u32 {
        self.flows(kind).get(&(road, time)).copied().unwrap_or(0)
    }

    pub fn worst_overload(&self) -> Option<Overload> {
        self.worst_overload
    }
}

/// Keeps the largest excess. Ties go to the smallest `(kind, road, time)` so the
/// result does not depend on map iteration order.
fn find_worst_overload(
    problem: &YardProblem,
    kind: FlowKind,
    flows: &FlowTally,
    worst: &mut Option<Overload>,
) -> Result<(), LookupError> {
    for (&(road, time), &flow) in flows {
        let excess = flow.saturating_sub(problem.road(road)?.capacity(kind));
        if excess == 0 {
            continue;
        }

        let candidate = Overload {
            road,
            time,
            kind,
            excess,
        };
        let rank = |overload: &Overload| {
            (
                overload.excess,
                Reverse((overload.kind, overload.road, overload.time)),
            )
        };

        if worst.is_none_or(|current| rank(&candidate) > rank(&current)) {
            *worst = Some(candidate);
        }
    }

    Ok(())
}

/// A schedule together with its evaluation.
///
/// Obtained from [`Schedule::evaluate`]. Mutating the schedule again requires
/// [`EvaluatedSchedule::into_schedule`], which drops the evaluation.
#[derive(Debug, Clone)]
pub struct EvaluatedSchedule {
    schedule: Schedule,
    evaluation: Evaluation,
}

impl EvaluatedSchedule {
    pub(crate) fn new(schedule: Schedule, evaluation: Evaluation) -> Self {
        EvaluatedSchedule {
            schedule,
            evaluation,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn problem(&self) -> &Arc<YardProblem> {
        self.schedule.problem()
    }

    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    pub fn objectives(&self) -> &Objectives {
        self.evaluation.objectives()
    }

    /// Recomputes every aggregate from the entries.
    pub fn recalculate(&mut self) -> Result<(), ScheduleError> {
        self.evaluation = Evaluation::compute(&self.schedule)?;
        Ok(())
    }

    pub fn into_schedule(self) -> Schedule {
        self.schedule
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        problem::objective_weights::ObjectiveWeights,
        test_utils::{self, P0, P1, R0, R1, S2, S3},
    };

    use super::*;

    #[test]
    fn test_feasible_schedule_objectives() {
        let evaluated = test_utils::feasible_schedule().evaluate().unwrap();
        let objectives = evaluated.objectives();

        assert_eq!(objectives.routing_cost, 51.0);
        assert_eq!(objectives.time_deviation_cost, 0.0);
        assert_eq!(objectives.congestion_overload, 0);
        assert_eq!(objectives.total_cost, 51.0);
        assert!(evaluated.evaluation().worst_overload().is_none());
    }

    #[test]
    fn test_flows_count_operations_per_road() {
        let evaluated = test_utils::feasible_schedule().evaluate().unwrap();
        let evaluation = evaluated.evaluation();

        assert_eq!(evaluation.flow(FlowKind::Load, R0, 5), 2);
        assert_eq!(evaluation.flow(FlowKind::Load, R1, 15), 1);
        assert_eq!(evaluation.flow(FlowKind::Unload, R0, 14), 2);
        assert_eq!(evaluation.flow(FlowKind::Unload, R0, 6), 1);
        assert_eq!(evaluation.flow(FlowKind::Unload, R1, 14), 0);
    }

    #[test]
    fn test_tardy_load() {
        let mut schedule = test_utils::feasible_schedule();
        schedule.set_allow_modification(true);
        schedule.set_load_entry(P0, S2, 17, 5).unwrap();

        let evaluated = schedule.evaluate().unwrap();
        let deviation = evaluated.evaluation().deviation(P0).unwrap();

        assert_eq!(deviation.tardiness, 2);
        assert_eq!(deviation.earliness, 0);
        assert_eq!(evaluated.objectives().time_deviation_cost, 4.0);
        assert_eq!(evaluated.objectives().total_cost, 55.0);
    }

    #[test]
    fn test_early_load() {
        let mut schedule = test_utils::feasible_schedule();
        schedule.set_allow_modification(true);
        schedule.set_load_entry(P0, S2, 11, 5).unwrap();

        let evaluated = schedule.evaluate().unwrap();

        assert_eq!(evaluated.evaluation().deviation(P0).unwrap().earliness, 1);
        assert_eq!(evaluated.objectives().time_deviation_cost, 1.0);
        assert!(evaluated.evaluation().deviation(P1).unwrap().is_zero());
    }

    #[test]
    fn test_deviation_is_the_worst_event() {
        let mut schedule = test_utils::feasible_schedule();
        schedule.set_allow_modification(true);
        schedule.set_load_entry(P0, S2, 17, 5).unwrap();
        // offset 19 of P0
        schedule.set_unload_entry(P0, P1, S3, 19, 1).unwrap();

        let evaluated = schedule.evaluate().unwrap();

        assert_eq!(evaluated.evaluation().deviation(P0).unwrap().tardiness, 4);
        assert_eq!(evaluated.objectives().time_deviation_cost, 8.0);
    }

    #[test]
    fn test_congestion_reports_excess_over_capacity() {
        let mut schedule = test_utils::feasible_schedule();
        schedule.set_unload_entry(P0, P1, S3, 14, 1).unwrap();

        let evaluated = schedule.evaluate().unwrap();
        let objectives = evaluated.objectives();

        assert_eq!(evaluated.evaluation().flow(FlowKind::Unload, R0, 14), 3);
        assert_eq!(objectives.congestion_overload, 1);
        assert_eq!(objectives.congestion_cost, 1.0);
        assert_eq!(objectives.routing_cost, 54.0);
        assert_eq!(
            evaluated.evaluation().worst_overload(),
            Some(Overload {
                road: R0,
                time: 14,
                kind: FlowKind::Unload,
                excess: 1
            })
        );
    }

    #[test]
    fn test_weights_scale_components() {
        let mut builder = test_utils::fixture_problem_builder();
        builder.set_objective_weights(ObjectiveWeights {
            route: 2.0,
            time_deviation: 10.0,
            congestion: 100.0,
        });
        let mut schedule = test_utils::feasible_schedule_for(Arc::new(builder.build().unwrap()));
        schedule.set_allow_modification(true);
        schedule.set_load_entry(P0, S2, 17, 5).unwrap();

        let objectives = *schedule.evaluate().unwrap().objectives();

        assert_eq!(objectives.routing_cost, 102.0);
        assert_eq!(objectives.time_deviation_cost, 40.0);
        assert_eq!(objectives.congestion_cost, 0.0);
        assert_eq!(objectives.total_cost, 142.0);
    }

    #[test]
    fn test_recalculate_is_idempotent() {
        let mut evaluated = test_utils::feasible_schedule().evaluate().unwrap();
        let before = evaluated.evaluation().clone();

        evaluated.recalculate().unwrap();
        evaluated.recalculate().unwrap();

        assert_eq!(evaluated.evaluation(), &before);
        assert_eq!(
            evaluated.objectives().total_cost.to_bits(),
            before.objectives().total_cost.to_bits()
        );
    }

    #[test]
    fn test_into_schedule_allows_mutation() {
        let evaluated = test_utils::feasible_schedule().evaluate().unwrap();
        let mut schedule = evaluated.into_schedule();
        schedule.set_unload_entry(P0, P1, S3, 14, 1).unwrap();

        assert_eq!(schedule.evaluate().unwrap().objectives().congestion_overload, 1);
    }
}
