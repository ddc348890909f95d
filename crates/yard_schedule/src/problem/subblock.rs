use serde::{Deserialize, Serialize};

use crate::define_index_newtype;

define_index_newtype!(SubblockIdx, Subblock);

/// Position of a subblock on the yard grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPosition {
    pub block: u32,
    pub row: u32,
    pub col: u32,
    pub slot: u32,
    pub lane: u32,
}

/// A storage unit of the yard. Its capacity is uniform and held by the problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subblock {
    external_id: String,
    position: GridPosition,
}

impl Subblock {
    pub fn new(external_id: impl Into<String>, position: GridPosition) -> Self {
        Subblock {
            external_id: external_id.into(),
            position,
        }
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    /// Neighbours share block and lane and sit one step apart on row, column or slot.
    pub fn is_adjacent_to(&self, other: &Subblock) -> bool {
        let a = self.position;
        let b = other.position;

        if a.block != b.block || a.lane != b.lane {
            return false;
        }

        a.row.abs_diff(b.row) + a.col.abs_diff(b.col) + a.slot.abs_diff(b.slot) == 1
    }
}
