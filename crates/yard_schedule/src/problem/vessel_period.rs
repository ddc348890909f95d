use serde::Serialize;

use crate::{
    define_index_newtype,
    error::{ConfigurationError, LookupError, ScheduleError},
};

use super::{
    Cost, Quantity, TimeStep,
    cyclic_interval::CyclicInterval,
    subblock::SubblockIdx,
    vessel::{RelativeWindow, Vessel, VesselIdx},
};

define_index_newtype!(PeriodIdx, VesselPeriod, Vec<SubblockIdx>, Deviation);
define_index_newtype!(SlotIdx, SubblockIdx);

/// How far a time step lies outside the expected window of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Deviation {
    pub earliness: TimeStep,
    pub tardiness: TimeStep,
}

impl Deviation {
    pub fn is_zero(&self) -> bool {
        self.earliness == 0 && self.tardiness == 0
    }

    /// Component-wise maximum.
    pub fn max(self, other: Deviation) -> Deviation {
        Deviation {
            earliness: self.earliness.max(other.earliness),
            tardiness: self.tardiness.max(other.tardiness),
        }
    }
}

/// One call of a vessel on the cyclic horizon.
///
/// All windows are absolute. The container totals are filled in once while the
/// transshipment graph is built and are read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct VesselPeriod {
    id: PeriodIdx,
    vessel: VesselIdx,
    occurrence: usize,
    window: CyclicInterval,
    feasible_window: CyclicInterval,
    expected_window: CyclicInterval,
    occupancy_window: CyclicInterval,
    earliness_cost: Cost,
    tardiness_cost: Cost,
    berth_position: f64,

    total_load_containers: u64,
    total_unload_containers: u64,
    load_flows: usize,
    unload_flows: usize,
}

impl VesselPeriod {
    pub(crate) fn new(
        id: PeriodIdx,
        vessel_id: VesselIdx,
        vessel: &Vessel,
        occurrence: usize,
        horizon: TimeStep,
    ) -> Result<Self, ConfigurationError> {
        let start = (vessel.arrival() + occurrence as TimeStep * vessel.period_length())
            .rem_euclid(horizon);
        let window = CyclicInterval::checked(start, vessel.period_length(), horizon)?;

        let absolute = |relative: RelativeWindow| -> Result<CyclicInterval, ConfigurationError> {
            CyclicInterval::checked(
                (start + relative.start).rem_euclid(horizon),
                relative.length,
                horizon,
            )
        };

        Ok(VesselPeriod {
            id,
            vessel: vessel_id,
            occurrence,
            window,
            feasible_window: absolute(vessel.feasible_window())?,
            expected_window: absolute(vessel.expected_window())?,
            occupancy_window: absolute(vessel.occupancy_window())?,
            earliness_cost: vessel.earliness_cost(),
            tardiness_cost: vessel.tardiness_cost(),
            berth_position: vessel.berth_position(),
            total_load_containers: 0,
            total_unload_containers: 0,
            load_flows: 0,
            unload_flows: 0,
        })
    }

    pub fn id(&self) -> PeriodIdx {
        self.id
    }

    pub fn vessel(&self) -> VesselIdx {
        self.vessel
    }

    pub fn occurrence(&self) -> usize {
        self.occurrence
    }

    pub fn window(&self) -> CyclicInterval {
        self.window
    }

    pub fn feasible_window(&self) -> CyclicInterval {
        self.feasible_window
    }

    pub fn expected_window(&self) -> CyclicInterval {
        self.expected_window
    }

    /// Part of the period during which its subblocks are reserved.
    pub fn occupancy_window(&self) -> CyclicInterval {
        self.occupancy_window
    }

    pub fn earliness_cost(&self) -> Cost {
        self.earliness_cost
    }

    pub fn tardiness_cost(&self) -> Cost {
        self.tardiness_cost
    }

    pub fn berth_position(&self) -> f64 {
        self.berth_position
    }

    /// Containers this period takes on board, summed over inbound transshipments.
    pub fn total_load_containers(&self) -> u64 {
        self.total_load_containers
    }

    /// Containers this period discharges, summed over outbound transshipments.
    pub fn total_unload_containers(&self) -> u64 {
        self.total_unload_containers
    }

    pub fn load_flows(&self) -> usize {
        self.load_flows
    }

    pub fn unload_flows(&self) -> usize {
        self.unload_flows
    }

    /// Number of subblocks needed to stage every inbound container.
    pub fn required_subblocks(&self, capacity: Quantity) -> usize {
        if capacity == 0 {
            return 0;
        }

        self.total_load_containers.div_ceil(capacity as u64) as usize
    }

    /// Offset of `time` from the start of this period.
    pub fn relative_time(&self, time: TimeStep, horizon: TimeStep) -> Result<TimeStep, ScheduleError> {
        if !self.window.contains(time, horizon)? {
            return Err(LookupError::TimeOutsidePeriod {
                period: self.id,
                time,
            }
            .into());
        }

        Ok(self.window.shifts_from_start(time, horizon)?)
    }

    /// Earliness and tardiness of `time` against the expected window.
    ///
    /// Both the time and the expected window are placed on the line that starts at
    /// the feasible window, so windows running past the end of the period compare
    /// the same way as windows inside it. Times outside the feasible window count
    /// as late.
    pub fn deviation(&self, time: TimeStep, horizon: TimeStep) -> Result<Deviation, ConfigurationError> {
        let offset = self.feasible_window.shifts_from_start(time, horizon)?;
        let expected_start = self
            .feasible_window
            .shifts_from_start(self.expected_window.start(), horizon)?;
        let expected_end = expected_start + self.expected_window.length();

        let mut deviation = Deviation::default();
        if offset < expected_start {
            deviation.earliness = expected_start - offset;
        } else if offset >= expected_end {
            deviation.tardiness = offset + 1 - expected_end;
        }

        Ok(deviation)
    }

    pub fn deviation_cost(&self, deviation: &Deviation) -> Cost {
        deviation.earliness as Cost * self.earliness_cost
            + deviation.tardiness as Cost * self.tardiness_cost
    }

    pub(crate) fn add_inbound(&mut self, quantity: Quantity) {
        self.total_load_containers += quantity as u64;
        self.load_flows += 1;
    }

    pub(crate) fn add_outbound(&mut self, quantity: Quantity) {
        self.total_unload_containers += quantity as u64;
        self.unload_flows += 1;
    }
}
