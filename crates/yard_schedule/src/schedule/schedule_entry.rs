use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::problem::{Quantity, TimeStep};

/// A timed operation moving `quantity` containers at absolute time `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ScheduleEntry {
    pub time: TimeStep,
    pub quantity: Quantity,
}

impl ScheduleEntry {
    pub const fn new(time: TimeStep, quantity: Quantity) -> Self {
        ScheduleEntry { time, quantity }
    }
}
