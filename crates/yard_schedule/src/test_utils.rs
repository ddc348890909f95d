use std::sync::Arc;

use crate::{
    problem::{
        road::{Road, RoadIdx},
        subblock::{GridPosition, Subblock, SubblockIdx},
        vessel::{Vessel, VesselBuilder},
        vessel_period::PeriodIdx,
        yard_problem::{YardProblem, YardProblemBuilder},
    },
    schedule::working_schedule::Schedule,
};

pub const P0: PeriodIdx = PeriodIdx::new(0);
pub const P1: PeriodIdx = PeriodIdx::new(1);

pub const S0: SubblockIdx = SubblockIdx::new(0);
pub const S1: SubblockIdx = SubblockIdx::new(1);
pub const S2: SubblockIdx = SubblockIdx::new(2);
pub const S3: SubblockIdx = SubblockIdx::new(3);

pub const R0: RoadIdx = RoadIdx::new(0);
pub const R1: RoadIdx = RoadIdx::new(1);

pub fn create_vessel(id: &str, arrival: i64, feasible: (i64, i64), expected: (i64, i64)) -> Vessel {
    let mut builder = VesselBuilder::default();
    builder
        .set_external_id(id)
        .set_period_length(20)
        .set_idle_time_steps(2)
        .set_arrival(arrival)
        .set_feasible_window(feasible.0, feasible.1)
        .set_expected_window(expected.0, expected.1)
        .set_earliness_cost(1.0)
        .set_tardiness_cost(2.0);
    builder.build().unwrap()
}

pub fn create_subblock(id: &str, block: u32, row: u32, col: u32, lane: u32) -> Subblock {
    Subblock::new(
        id,
        GridPosition {
            block,
            row,
            col,
            slot: 0,
            lane,
        },
    )
}

/// Two weekly vessels on a horizon of 20 steps, four subblocks and two roads.
///
/// Vessel A (P0) calls at 0 and receives 5 containers from B. Vessel B (P1) calls
/// at 10 and receives 12 containers from A. S0 and S1 feed the north road, S2 and
/// S3 the south road.
pub fn fixture_problem_builder() -> YardProblemBuilder {
    let mut builder = YardProblemBuilder::default();
    builder
        .set_horizon(20)
        .set_subblock_capacity(10)
        .add_vessel(create_vessel("A", 0, (10, 10), (12, 4)))
        .add_vessel(create_vessel("B", 10, (12, 8), (14, 4)))
        .set_subblocks(vec![
            create_subblock("S0", 0, 0, 0, 0),
            create_subblock("S1", 0, 0, 1, 0),
            create_subblock("S2", 0, 1, 0, 0),
            create_subblock("S3", 0, 1, 1, 1),
        ])
        .set_roads(vec![Road::new("north", 2, 2), Road::new("south", 2, 2)])
        .set_distances_to(vec![vec![1.0; 4]; 2])
        .set_distances_from(vec![vec![2.0; 4]; 2])
        .set_routes_to(vec![vec![vec![R0]; 4]; 2])
        .set_routes_from(vec![vec![vec![R0], vec![R0], vec![R1], vec![R1]]; 2])
        .add_transshipment(P0, P1, 12)
        .add_transshipment(P1, P0, 5);
    builder
}

pub fn fixture_problem() -> YardProblem {
    fixture_problem_builder().build().unwrap()
}

pub fn fixture_problem_arc() -> Arc<YardProblem> {
    Arc::new(fixture_problem())
}

/// A schedule meeting every invariant of the fixture, with routing cost 51.
pub fn feasible_schedule_for(problem: Arc<YardProblem>) -> Schedule {
    let mut schedule = Schedule::new(problem);

    schedule.set_load_entry(P1, S0, 5, 7).unwrap();
    schedule.set_load_entry(P1, S1, 5, 5).unwrap();
    schedule.set_load_entry(P0, S2, 15, 5).unwrap();

    schedule.set_unload_entry(P0, P1, S0, 14, 7).unwrap();
    schedule.set_unload_entry(P0, P1, S1, 14, 5).unwrap();
    schedule.set_unload_entry(P1, P0, S2, 6, 5).unwrap();

    schedule
}

pub fn feasible_schedule() -> Schedule {
    feasible_schedule_for(fixture_problem_arc())
}
