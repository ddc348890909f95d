use thiserror::Error;

use crate::problem::{
    Quantity, TimeStep,
    road::{FlowKind, RoadIdx},
    subblock::SubblockIdx,
    vessel::VesselIdx,
    vessel_period::{PeriodIdx, SlotIdx},
};

/// Malformed interval, vessel or problem definition. Raised while the instance is
/// being constructed and never recovered from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Horizon must be positive, got {horizon}")]
    NonPositiveHorizon { horizon: TimeStep },
    #[error("Interval start {start} is outside the horizon [0, {horizon})")]
    IntervalStartOutOfRange { start: TimeStep, horizon: TimeStep },
    #[error("Interval length {length} is outside [0, {horizon}]")]
    IntervalLengthOutOfRange { length: TimeStep, horizon: TimeStep },
    #[error("Period length must be positive, got {period_length}")]
    NonPositivePeriodLength { period_length: TimeStep },
    #[error("Idle time steps {idle_time_steps} must lie in [0, {period_length})")]
    IdleTimeOutOfRange {
        idle_time_steps: TimeStep,
        period_length: TimeStep,
    },
    #[error("Arrival offset {arrival} must lie in [0, {period_length})")]
    ArrivalOutOfRange {
        arrival: TimeStep,
        period_length: TimeStep,
    },
    #[error(
        "The {window} window [{start}, +{length}) does not fit a period of length {period_length}"
    )]
    RelativeWindowOutOfRange {
        window: &'static str,
        start: TimeStep,
        length: TimeStep,
        period_length: TimeStep,
    },
    #[error("Vessel '{vessel}' has period length {period_length} which does not divide the horizon {horizon}")]
    PeriodLengthDoesNotDivideHorizon {
        vessel: String,
        period_length: TimeStep,
        horizon: TimeStep,
    },
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
    #[error("Matrix '{matrix}' has {actual} entries, expected {expected}")]
    DimensionMismatch {
        matrix: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Matrix '{matrix}' has a negative or non-finite value for period {period}, subblock {subblock}")]
    InvalidDistance {
        matrix: &'static str,
        period: PeriodIdx,
        subblock: SubblockIdx,
    },
    #[error("Capacity '{0}' must be positive")]
    ZeroCapacity(&'static str),
    #[error("Route references road {road} but only {road_count} roads exist")]
    UnknownRoad { road: RoadIdx, road_count: usize },
    #[error("Transshipment references period {period} but only {period_count} periods exist")]
    TransshipmentPeriodOutOfRange {
        period: PeriodIdx,
        period_count: usize,
    },
    #[error("Transshipments from {origin} to {destination} add up to more than {max}", max = Quantity::MAX)]
    TransshipmentOverflow {
        origin: PeriodIdx,
        destination: PeriodIdx,
    },
    #[error("Period {period} cannot transship to itself")]
    SelfTransshipment { period: PeriodIdx },
    #[error("Transshipment from {origin} to {destination} must move a positive quantity")]
    ZeroTransshipment {
        origin: PeriodIdx,
        destination: PeriodIdx,
    },
}

/// The caller tried to overwrite or inconsistently extend an already populated slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateConflictError {
    #[error("Load entry for period {period}, subblock {subblock} is already set")]
    LoadEntryAlreadySet {
        period: PeriodIdx,
        subblock: SubblockIdx,
    },
    #[error("Unload entry from {origin} for period {period}, subblock {subblock} is already set")]
    UnloadEntryAlreadySet {
        origin: PeriodIdx,
        period: PeriodIdx,
        subblock: SubblockIdx,
    },
    #[error(
        "Incremental entry for period {period}, subblock {subblock} is stored at time {stored}, got {requested}"
    )]
    IncrementalTimeMismatch {
        period: PeriodIdx,
        subblock: SubblockIdx,
        stored: TimeStep,
        requested: TimeStep,
    },
    #[error("Incremental entry for period {period}, subblock {subblock} would exceed {max} containers", max = Quantity::MAX)]
    QuantityOverflow {
        period: PeriodIdx,
        subblock: SubblockIdx,
    },
    #[error("Entry for period {period}, subblock {subblock} must move a positive quantity")]
    ZeroQuantity {
        period: PeriodIdx,
        subblock: SubblockIdx,
    },
    #[error("Subblock {subblock} already holds another slot of period {period}")]
    DuplicateSubblock {
        period: PeriodIdx,
        subblock: SubblockIdx,
    },
    #[error("Schedule does not allow modification of assigned subblocks")]
    ModificationNotAllowed,
    #[error("Change expects subblock {expected} at slot {slot} of period {period}, found {actual:?}")]
    StaleChange {
        period: PeriodIdx,
        slot: SlotIdx,
        expected: SubblockIdx,
        actual: Option<SubblockIdx>,
    },
}

/// An identifier or time step that does not exist in the problem instance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Unknown period {0}")]
    UnknownPeriod(PeriodIdx),
    #[error("Unknown subblock {0}")]
    UnknownSubblock(SubblockIdx),
    #[error("Unknown vessel {0}")]
    UnknownVessel(VesselIdx),
    #[error("Unknown road {0}")]
    UnknownRoad(RoadIdx),
    #[error("Unknown slot {slot} in period {period}")]
    UnknownSlot { period: PeriodIdx, slot: SlotIdx },
    #[error("Time step {time} is outside the horizon [0, {horizon})")]
    TimeOutOfHorizon { time: TimeStep, horizon: TimeStep },
    #[error("Time step {time} does not belong to period {period}")]
    TimeOutsidePeriod { period: PeriodIdx, time: TimeStep },
}

/// Which of the seven feasibility invariants a violation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Invariant {
    SubblockCount = 1,
    SubblockExclusivity = 2,
    SubblockBalance = 3,
    TransshipmentConservation = 4,
    LoadTiming = 5,
    UnloadTiming = 6,
    RoadCapacity = 7,
}

/// A candidate schedule is infeasible. This is an expected outcome of evaluating a
/// candidate and is distinct from the fatal error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("Period {period} has {actual} subblocks, expected {expected}")]
    SubblockCountMismatch {
        period: PeriodIdx,
        expected: usize,
        actual: usize,
    },
    #[error("Subblock {subblock} is shared by overlapping periods {first} and {second}")]
    SubblockConflict {
        subblock: SubblockIdx,
        first: PeriodIdx,
        second: PeriodIdx,
    },
    #[error("Period {period} has subblock {subblock} assigned but no load entry")]
    MissingLoadEntry {
        period: PeriodIdx,
        subblock: SubblockIdx,
    },
    #[error("Period {period} has an entry on subblock {subblock} which is not assigned to it")]
    UnassignedEntry {
        period: PeriodIdx,
        subblock: SubblockIdx,
    },
    #[error("Period {period}, subblock {subblock} loads {load} but receives {unload}")]
    LoadUnloadMismatch {
        period: PeriodIdx,
        subblock: SubblockIdx,
        load: u64,
        unload: u64,
    },
    #[error("Period {period}, subblock {subblock} stores {quantity} which exceeds capacity {capacity}")]
    SubblockCapacityExceeded {
        period: PeriodIdx,
        subblock: SubblockIdx,
        quantity: u64,
        capacity: Quantity,
    },
    #[error("Transshipment from {origin} to {destination} moves {actual}, expected {expected}")]
    TransshipmentMismatch {
        origin: PeriodIdx,
        destination: PeriodIdx,
        expected: u64,
        actual: u64,
    },
    #[error("Load of period {period}, subblock {subblock} at {time} is outside the feasible window")]
    LoadOutsideFeasibleWindow {
        period: PeriodIdx,
        subblock: SubblockIdx,
        time: TimeStep,
    },
    #[error(
        "Unload from {origin} into period {period}, subblock {subblock} at {time} is outside the window of {period}"
    )]
    UnloadOutsidePeriod {
        origin: PeriodIdx,
        period: PeriodIdx,
        subblock: SubblockIdx,
        time: TimeStep,
    },
    #[error(
        "Unload from {origin} into period {period}, subblock {subblock} at {unload_time} is not before the load at {load_time}"
    )]
    UnloadNotBeforeLoad {
        origin: PeriodIdx,
        period: PeriodIdx,
        subblock: SubblockIdx,
        unload_time: TimeStep,
        load_time: TimeStep,
    },
    #[error(
        "Unload from {origin} into period {period}, subblock {subblock} at {time} is outside the feasible window of {origin}"
    )]
    UnloadOutsideFeasibleWindow {
        origin: PeriodIdx,
        period: PeriodIdx,
        subblock: SubblockIdx,
        time: TimeStep,
    },
    #[error("Road {road} carries {flow} {kind} flows at {time}, capacity is {capacity}")]
    RoadCapacityExceeded {
        road: RoadIdx,
        time: TimeStep,
        kind: FlowKind,
        flow: u32,
        capacity: u32,
    },
}

impl InvariantViolation {
    pub fn invariant(&self) -> Invariant {
        match self {
            InvariantViolation::SubblockCountMismatch { .. } => Invariant::SubblockCount,
            InvariantViolation::SubblockConflict { .. } => Invariant::SubblockExclusivity,
            InvariantViolation::MissingLoadEntry { .. }
            | InvariantViolation::UnassignedEntry { .. }
            | InvariantViolation::LoadUnloadMismatch { .. }
            | InvariantViolation::SubblockCapacityExceeded { .. } => Invariant::SubblockBalance,
            InvariantViolation::TransshipmentMismatch { .. } => {
                Invariant::TransshipmentConservation
            }
            InvariantViolation::LoadOutsideFeasibleWindow { .. } => Invariant::LoadTiming,
            InvariantViolation::UnloadOutsidePeriod { .. }
            | InvariantViolation::UnloadNotBeforeLoad { .. }
            | InvariantViolation::UnloadOutsideFeasibleWindow { .. } => Invariant::UnloadTiming,
            InvariantViolation::RoadCapacityExceeded { .. } => Invariant::RoadCapacity,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("Partial schedules were built against different problems")]
    ProblemMismatch,
    #[error("Assignment partial is incomplete: {0}")]
    IncompleteAssignments(#[source] InvariantViolation),
    #[error("Entry partial is incomplete: {0}")]
    IncompleteEntries(#[source] InvariantViolation),
    #[error("Entry partial uses subblock {subblock} for period {period}, which the assignment partial does not assign")]
    EntryOnUnassignedSubblock {
        period: PeriodIdx,
        subblock: SubblockIdx,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    StateConflict(#[from] StateConflictError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("No candidate schedules were given")]
    NoCandidates,
}

impl ScheduleError {
    /// Whether the error only says the candidate is infeasible, so a search can
    /// discard it and carry on.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, ScheduleError::Invariant(_))
    }

    pub fn violation(&self) -> Option<&InvariantViolation> {
        match self {
            ScheduleError::Invariant(violation) => Some(violation),
            _ => None,
        }
    }
}
