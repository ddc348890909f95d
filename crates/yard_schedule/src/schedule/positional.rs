use std::{collections::BTreeMap, sync::Arc};

use crate::{
    error::{InvariantViolation, LookupError, ScheduleError, StateConflictError},
    problem::{
        subblock::SubblockIdx,
        vessel_period::{PeriodIdx, SlotIdx},
        yard_problem::YardProblem,
    },
};

use super::{
    keys::{LoadKey, SlotLoadKey, SlotUnloadKey, UnloadKey},
    schedule_entry::ScheduleEntry,
    working_schedule::Schedule,
};

/// A schedule whose entries point at slot positions instead of subblock ids.
///
/// Swapping the subblock held by a slot keeps every entry of that slot, which is
/// the move most neighbourhood searches need.
#[derive(Debug, Clone)]
pub struct PositionalSchedule {
    problem: Arc<YardProblem>,
    slots: Vec<Vec<SubblockIdx>>,
    loads: BTreeMap<SlotLoadKey, ScheduleEntry>,
    unloads: BTreeMap<SlotUnloadKey, ScheduleEntry>,
    allow_modification: bool,
}

impl Schedule {
    pub fn to_positional(&self) -> Result<PositionalSchedule, ScheduleError> {
        let slot_of = |key: LoadKey| -> Result<SlotIdx, ScheduleError> {
            self.assignments()
                .get(key.period.get())
                .and_then(|subblocks| subblocks.iter().position(|&s| s == key.subblock))
                .map(SlotIdx::new)
                .ok_or_else(|| {
                    InvariantViolation::UnassignedEntry {
                        period: key.period,
                        subblock: key.subblock,
                    }
                    .into()
                })
        };

        let mut loads = BTreeMap::new();
        for (&key, &entry) in self.loads() {
            let slot = slot_of(key)?;
            loads.insert(
                SlotLoadKey {
                    period: key.period,
                    slot,
                },
                entry,
            );
        }

        let mut unloads = BTreeMap::new();
        for (key, &entry) in self.unloads() {
            let slot = slot_of(key.load_key())?;
            unloads.insert(
                SlotUnloadKey {
                    period: key.period,
                    slot,
                    origin: key.origin,
                },
                entry,
            );
        }

        Ok(PositionalSchedule {
            problem: Arc::clone(self.problem()),
            slots: self.assignments().to_vec(),
            loads,
            unloads,
            allow_modification: self.allow_modification(),
        })
    }
}

impl PositionalSchedule {
    pub fn problem(&self) -> &Arc<YardProblem> {
        &self.problem
    }

    pub fn slots(&self, period: PeriodIdx) -> Result<&[SubblockIdx], LookupError> {
        self.slots
            .get(period.get())
            .map(Vec::as_slice)
            .ok_or(LookupError::UnknownPeriod(period))
    }

    pub fn subblock_at(&self, period: PeriodIdx, slot: SlotIdx) -> Result<SubblockIdx, LookupError> {
        self.slots(period)?
            .get(slot.get())
            .copied()
            .ok_or(LookupError::UnknownSlot { period, slot })
    }

    pub fn loads(&self) -> &BTreeMap<SlotLoadKey, ScheduleEntry> {
        &self.loads
    }

    pub fn unloads(&self) -> &BTreeMap<SlotUnloadKey, ScheduleEntry> {
        &self.unloads
    }

    /// Puts `subblock` into an existing slot and returns the subblock it replaces.
    /// The entries of the slot follow the new subblock.
    pub fn set_subblock_at(
        &mut self,
        period: PeriodIdx,
        slot: SlotIdx,
        subblock: SubblockIdx,
    ) -> Result<SubblockIdx, ScheduleError> {
        self.problem.subblock(subblock)?;
        let previous = self.subblock_at(period, slot)?;
        if previous == subblock {
            return Ok(previous);
        }

        if self.slots[period].contains(&subblock) {
            return Err(StateConflictError::DuplicateSubblock { period, subblock }.into());
        }

        self.slots[period][slot] = subblock;
        Ok(previous)
    }

    pub fn to_schedule(&self) -> Result<Schedule, ScheduleError> {
        let mut loads = BTreeMap::new();
        for (key, &entry) in &self.loads {
            let subblock = self.subblock_at(key.period, key.slot)?;
            loads.insert(LoadKey::new(key.period, subblock), entry);
        }

        let mut unloads = BTreeMap::new();
        for (key, &entry) in &self.unloads {
            let subblock = self.subblock_at(key.period, key.slot)?;
            unloads.insert(UnloadKey::new(key.origin, key.period, subblock), entry);
        }

        Ok(Schedule::from_parts(
            Arc::clone(&self.problem),
            self.slots.clone(),
            loads,
            unloads,
            self.allow_modification,
        ))
    }
}
