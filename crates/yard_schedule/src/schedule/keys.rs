use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::problem::{
    subblock::SubblockIdx,
    vessel_period::{PeriodIdx, SlotIdx},
};

/// The load of `period` from one of its subblocks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct LoadKey {
    pub period: PeriodIdx,
    pub subblock: SubblockIdx,
}

impl LoadKey {
    pub const fn new(period: PeriodIdx, subblock: SubblockIdx) -> Self {
        LoadKey { period, subblock }
    }
}

/// The unload of `origin` into a subblock reserved by `period`.
///
/// Ordered by destination first so that all unloads feeding one load are adjacent
/// in a sorted map.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct UnloadKey {
    pub period: PeriodIdx,
    pub subblock: SubblockIdx,
    pub origin: PeriodIdx,
}

impl UnloadKey {
    pub const fn new(origin: PeriodIdx, period: PeriodIdx, subblock: SubblockIdx) -> Self {
        UnloadKey {
            period,
            subblock,
            origin,
        }
    }

    pub fn load_key(&self) -> LoadKey {
        LoadKey::new(self.period, self.subblock)
    }

    /// Bounds of every unload key sharing `load`, for `BTreeMap::range`.
    pub(crate) fn range_of(load: LoadKey) -> std::ops::RangeInclusive<UnloadKey> {
        UnloadKey::new(PeriodIdx::new(0), load.period, load.subblock)
            ..=UnloadKey::new(PeriodIdx::new(usize::MAX), load.period, load.subblock)
    }
}

/// A load addressed by slot position instead of subblock id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotLoadKey {
    pub period: PeriodIdx,
    pub slot: SlotIdx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotUnloadKey {
    pub period: PeriodIdx,
    pub slot: SlotIdx,
    pub origin: PeriodIdx,
}
