use std::sync::Arc;

use yard_schedule::{
    problem::{
        road::{Road, RoadIdx},
        subblock::{GridPosition, Subblock, SubblockIdx},
        vessel::VesselBuilder,
        vessel_period::PeriodIdx,
        yard_problem::{YardProblem, YardProblemBuilder},
    },
    schedule::working_schedule::Schedule,
};

pub const P0: PeriodIdx = PeriodIdx::new(0);
pub const P1: PeriodIdx = PeriodIdx::new(1);
pub const P2: PeriodIdx = PeriodIdx::new(2);

pub const R0: RoadIdx = RoadIdx::new(0);

pub fn subblock(index: usize) -> SubblockIdx {
    SubblockIdx::new(index)
}

/// A feeder calling twice per horizon and a mainliner calling once, sharing a row
/// of `subblock_count` subblocks. Every route uses the single gate road.
pub fn create_test_problem(subblock_count: usize) -> YardProblem {
    let mut feeder = VesselBuilder::default();
    feeder
        .set_external_id("feeder")
        .set_period_length(20)
        .set_idle_time_steps(2)
        .set_feasible_window(10, 10)
        .set_expected_window(12, 4)
        .set_earliness_cost(1.0)
        .set_tardiness_cost(1.0);

    let mut mainliner = VesselBuilder::default();
    mainliner
        .set_external_id("mainliner")
        .set_period_length(40)
        .set_idle_time_steps(4)
        .set_arrival(20)
        .set_feasible_window(30, 10)
        .set_expected_window(32, 6)
        .set_earliness_cost(2.0)
        .set_tardiness_cost(3.0);

    let subblocks = (0..subblock_count)
        .map(|index| {
            Subblock::new(
                format!("row-0-{index}"),
                GridPosition {
                    col: index as u32,
                    ..GridPosition::default()
                },
            )
        })
        .collect();

    let distances = (0..3)
        .map(|_| (0..subblock_count).map(|index| 1.0 + index as f64).collect())
        .collect::<Vec<Vec<f64>>>();

    let mut builder = YardProblemBuilder::default();
    builder
        .set_horizon(40)
        .set_subblock_capacity(10)
        .add_vessel(feeder.build().unwrap())
        .add_vessel(mainliner.build().unwrap())
        .set_subblocks(subblocks)
        .set_roads(vec![Road::new("gate", 4, 4)])
        .set_distances_to(distances.clone())
        .set_distances_from(distances)
        .set_routes_to(vec![vec![vec![R0]; subblock_count]; 3])
        .set_routes_from(vec![vec![vec![R0]; subblock_count]; 3])
        .add_transshipment(P0, P2, 8)
        .add_transshipment(P1, P2, 6)
        .add_transshipment(P2, P0, 4);

    builder.build().unwrap()
}

pub fn create_test_problem_arc(subblock_count: usize) -> Arc<YardProblem> {
    Arc::new(create_test_problem(subblock_count))
}

/// Feasible plan for [`create_test_problem`] with routing cost 64.
pub fn create_feasible_schedule(problem: Arc<YardProblem>) -> Schedule {
    let mut schedule = Schedule::new(problem);

    // The mainliner P2 berths over [10, 20) and stages 14 containers in two
    // subblocks.
    schedule.set_load_entry(P2, subblock(0), 14, 8).unwrap();
    schedule.set_load_entry(P2, subblock(1), 14, 6).unwrap();
    schedule.set_unload_entry(P0, P2, subblock(0), 13, 8).unwrap();
    schedule.set_unload_entry(P1, P2, subblock(1), 33, 6).unwrap();

    // The first feeder call takes 4 containers discharged by the mainliner.
    schedule.set_load_entry(P0, subblock(2), 15, 4).unwrap();
    schedule.set_unload_entry(P2, P0, subblock(2), 12, 4).unwrap();

    schedule
}
