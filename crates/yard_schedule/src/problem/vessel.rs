use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{define_index_newtype, error::ConfigurationError};

use super::{Cost, TimeStep};

define_index_newtype!(VesselIdx, Vessel);

/// A window expressed as an offset from the start of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RelativeWindow {
    pub start: TimeStep,
    pub length: TimeStep,
}

impl RelativeWindow {
    pub const fn new(start: TimeStep, length: TimeStep) -> Self {
        RelativeWindow { start, length }
    }

    /// Exclusive end, which may exceed the period length.
    pub fn end(&self) -> TimeStep {
        self.start + self.length
    }

    fn check(&self, window: &'static str, period_length: TimeStep) -> Result<(), ConfigurationError> {
        if self.start < 0
            || self.start >= period_length
            || self.length < 0
            || self.length > period_length
        {
            return Err(ConfigurationError::RelativeWindowOutOfRange {
                window,
                start: self.start,
                length: self.length,
                period_length,
            });
        }

        Ok(())
    }
}

/// A service unit calling at the terminal every `period_length` time steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vessel {
    external_id: String,
    period_length: TimeStep,
    idle_time_steps: TimeStep,
    arrival: TimeStep,
    feasible_window: RelativeWindow,
    expected_window: RelativeWindow,
    earliness_cost: Cost,
    tardiness_cost: Cost,
    berth_position: f64,
}

impl Vessel {
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn period_length(&self) -> TimeStep {
        self.period_length
    }

    pub fn idle_time_steps(&self) -> TimeStep {
        self.idle_time_steps
    }

    /// Start of the first period on the horizon.
    pub fn arrival(&self) -> TimeStep {
        self.arrival
    }

    pub fn feasible_window(&self) -> RelativeWindow {
        self.feasible_window
    }

    pub fn expected_window(&self) -> RelativeWindow {
        self.expected_window
    }

    /// The part of each period during which the assigned subblocks are reserved.
    pub fn occupancy_window(&self) -> RelativeWindow {
        RelativeWindow::new(
            self.idle_time_steps,
            self.period_length - self.idle_time_steps,
        )
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

    /// Number of calls of this vessel within one horizon.
    pub fn periods_per_horizon(&self, horizon: TimeStep) -> Result<usize, ConfigurationError> {
        if horizon <= 0 {
            return Err(ConfigurationError::NonPositiveHorizon { horizon });
        }

        if self.period_length > horizon || horizon % self.period_length != 0 {
            return Err(ConfigurationError::PeriodLengthDoesNotDivideHorizon {
                vessel: self.external_id.clone(),
                period_length: self.period_length,
                horizon,
            });
        }

        Ok((horizon / self.period_length) as usize)
    }
}

#[derive(Default)]
pub struct VesselBuilder {
    external_id: Option<String>,
    period_length: Option<TimeStep>,
    idle_time_steps: Option<TimeStep>,
    arrival: Option<TimeStep>,
    feasible_window: Option<RelativeWindow>,
    expected_window: Option<RelativeWindow>,
    earliness_cost: Option<Cost>,
    tardiness_cost: Option<Cost>,
    berth_position: Option<f64>,
}

impl VesselBuilder {
    pub fn set_external_id(&mut self, external_id: impl Into<String>) -> &mut VesselBuilder {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn set_period_length(&mut self, period_length: TimeStep) -> &mut VesselBuilder {
        self.period_length = Some(period_length);
        self
    }

    pub fn set_idle_time_steps(&mut self, idle_time_steps: TimeStep) -> &mut VesselBuilder {
        self.idle_time_steps = Some(idle_time_steps);
        self
    }

    pub fn set_arrival(&mut self, arrival: TimeStep) -> &mut VesselBuilder {
        self.arrival = Some(arrival);
        self
    }

    pub fn set_feasible_window(&mut self, start: TimeStep, length: TimeStep) -> &mut VesselBuilder {
        self.feasible_window = Some(RelativeWindow::new(start, length));
        self
    }

    pub fn set_expected_window(&mut self, start: TimeStep, length: TimeStep) -> &mut VesselBuilder {
        self.expected_window = Some(RelativeWindow::new(start, length));
        self
    }

    pub fn set_earliness_cost(&mut self, cost: Cost) -> &mut VesselBuilder {
        self.earliness_cost = Some(cost);
        self
    }

    pub fn set_tardiness_cost(&mut self, cost: Cost) -> &mut VesselBuilder {
        self.tardiness_cost = Some(cost);
        self
    }

    pub fn set_berth_position(&mut self, berth_position: f64) -> &mut VesselBuilder {
        self.berth_position = Some(berth_position);
        self
    }

    /// Missing windows default to the whole period, missing costs to zero.
    pub fn build(self) -> Result<Vessel, ConfigurationError> {
        let external_id = self
            .external_id
            .ok_or(ConfigurationError::MissingField("external_id"))?;
        let period_length = self
            .period_length
            .ok_or(ConfigurationError::MissingField("period_length"))?;

        if period_length <= 0 {
            return Err(ConfigurationError::NonPositivePeriodLength { period_length });
        }

        let idle_time_steps = self.idle_time_steps.unwrap_or(0);
        if !(0..period_length).contains(&idle_time_steps) {
            return Err(ConfigurationError::IdleTimeOutOfRange {
                idle_time_steps,
                period_length,
            });
        }

        let arrival = self.arrival.unwrap_or(0);
        if !(0..period_length).contains(&arrival) {
            return Err(ConfigurationError::ArrivalOutOfRange {
                arrival,
                period_length,
            });
        }

        let feasible_window = self
            .feasible_window
            .unwrap_or(RelativeWindow::new(0, period_length));
        feasible_window.check("feasible", period_length)?;

        let expected_window = self.expected_window.unwrap_or(feasible_window);
        expected_window.check("expected", period_length)?;

        Ok(Vessel {
            external_id,
            period_length,
            idle_time_steps,
            arrival,
            feasible_window,
            expected_window,
            earliness_cost: self.earliness_cost.unwrap_or(0.0),
            tardiness_cost: self.tardiness_cost.unwrap_or(0.0),
            berth_position: self.berth_position.unwrap_or(0.0),
        })
    }
}
