use std::fmt::Display;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::define_index_newtype;

define_index_newtype!(RoadIdx, Road);

/// Direction of a container movement on a yard road.
///
/// Unloads travel from a berth to a subblock, loads from a subblock to a berth. Each
/// direction has its own capacity and its own flow tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Load,
    Unload,
}

impl Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowKind::Load => write!(f, "load"),
            FlowKind::Unload => write!(f, "unload"),
        }
    }
}

/// A shared road segment of the yard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Road {
    external_id: String,
    load_capacity: u32,
    unload_capacity: u32,
}

impl Road {
    pub fn new(external_id: impl Into<String>, load_capacity: u32, unload_capacity: u32) -> Self {
        Road {
            external_id: external_id.into(),
            load_capacity,
            unload_capacity,
        }
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Maximum number of simultaneous flows of `kind` per time step.
    pub fn capacity(&self, kind: FlowKind) -> u32 {
        match kind {
            FlowKind::Load => self.load_capacity,
            FlowKind::Unload => self.unload_capacity,
        }
    }
}
