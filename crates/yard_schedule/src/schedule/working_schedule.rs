use std::{collections::BTreeMap, sync::Arc};

use crate::{
    error::{ScheduleError, StateConflictError},
    problem::{
        Quantity, TimeStep, subblock::SubblockIdx, vessel_period::PeriodIdx,
        yard_problem::YardProblem,
    },
};

use super::{
    assignment_diff::SubblockChange,
    evaluation::{EvaluatedSchedule, Evaluation},
    keys::{LoadKey, UnloadKey},
    schedule_entry::ScheduleEntry,
};

/// A candidate schedule while it is being populated.
///
/// Objectives and validation are only reachable through [`Schedule::evaluate`], so a
/// caller can never read aggregates that are stale with respect to the entries.
#[derive(Debug, Clone)]
pub struct Schedule {
    problem: Arc<YardProblem>,
    assignments: Vec<Vec<SubblockIdx>>,
    loads: BTreeMap<LoadKey, ScheduleEntry>,
    unloads: BTreeMap<UnloadKey, ScheduleEntry>,
    allow_modification: bool,
}

impl Schedule {
    pub fn new(problem: Arc<YardProblem>) -> Self {
        let assignments = vec![Vec::new(); problem.periods().len()];
        Schedule {
            problem,
            assignments,
            loads: BTreeMap::new(),
            unloads: BTreeMap::new(),
            allow_modification: false,
        }
    }

    pub(crate) fn from_parts(
        problem: Arc<YardProblem>,
        assignments: Vec<Vec<SubblockIdx>>,
        loads: BTreeMap<LoadKey, ScheduleEntry>,
        unloads: BTreeMap<UnloadKey, ScheduleEntry>,
        allow_modification: bool,
    ) -> Self {
        Schedule {
            problem,
            assignments,
            loads,
            unloads,
            allow_modification,
        }
    }

    pub fn problem(&self) -> &Arc<YardProblem> {
        &self.problem
    }

    pub fn allow_modification(&self) -> bool {
        self.allow_modification
    }

    /// When enabled, entries may be overwritten and assignment changes applied.
    pub fn set_allow_modification(&mut self, allow: bool) -> &mut Schedule {
        self.allow_modification = allow;
        self
    }

    /// Subblocks of every period, in slot order.
    pub fn assignments(&self) -> &[Vec<SubblockIdx>] {
        &self.assignments
    }

    pub fn subblocks_of(&self, period_id: PeriodIdx) -> Result<&[SubblockIdx], ScheduleError> {
        self.problem.period(period_id)?;
        Ok(&self.assignments[period_id])
    }

    pub fn is_assigned(&self, period_id: PeriodIdx, subblock_id: SubblockIdx) -> bool {
        self.assignments
            .get(period_id.get())
            .is_some_and(|subblocks| subblocks.contains(&subblock_id))
    }

    pub fn loads(&self) -> &BTreeMap<LoadKey, ScheduleEntry> {
        &self.loads
    }

    pub fn unloads(&self) -> &BTreeMap<UnloadKey, ScheduleEntry> {
        &self.unloads
    }

    pub fn load_entry(&self, key: &LoadKey) -> Option<&ScheduleEntry> {
        self.loads.get(key)
    }

    pub fn unload_entry(&self, key: &UnloadKey) -> Option<&ScheduleEntry> {
        self.unloads.get(key)
    }

    /// Every unload feeding the load of `key`, ordered by origin period.
    pub fn unloads_into(
        &self,
        key: LoadKey,
    ) -> impl Iterator<Item = (&UnloadKey, &ScheduleEntry)> {
        self.unloads.range(UnloadKey::range_of(key))
    }

    pub fn unloaded_quantity(&self, key: LoadKey) -> u64 {
        self.unloads_into(key)
            .map(|(_, entry)| entry.quantity as u64)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
            && self.unloads.is_empty()
            && self.assignments.iter().all(Vec::is_empty)
    }

    /// Reserves `subblock` for `period`. Assigning it twice is a no-op.
    pub fn set_subblock(
        &mut self,
        period_id: PeriodIdx,
        subblock_id: SubblockIdx,
    ) -> Result<(), ScheduleError> {
        self.problem.period(period_id)?;
        self.problem.subblock(subblock_id)?;

        let subblocks = &mut self.assignments[period_id];
        if !subblocks.contains(&subblock_id) {
            subblocks.push(subblock_id);
        }

        Ok(())
    }

    pub fn set_load_entry(
        &mut self,
        period_id: PeriodIdx,
        subblock_id: SubblockIdx,
        time: TimeStep,
        quantity: Quantity,
    ) -> Result<(), ScheduleError> {
        self.check_entry(period_id, subblock_id, time, quantity)?;

        let key = LoadKey::new(period_id, subblock_id);
        if !self.allow_modification && self.loads.contains_key(&key) {
            return Err(StateConflictError::LoadEntryAlreadySet {
                period: period_id,
                subblock: subblock_id,
            }
            .into());
        }

        self.loads.insert(key, ScheduleEntry::new(time, quantity));
        self.set_subblock(period_id, subblock_id)
    }

    pub fn set_unload_entry(
        &mut self,
        origin: PeriodIdx,
        period_id: PeriodIdx,
        subblock_id: SubblockIdx,
        time: TimeStep,
        quantity: Quantity,
    ) -> Result<(), ScheduleError> {
        self.problem.period(origin)?;
        self.check_entry(period_id, subblock_id, time, quantity)?;

        let key = UnloadKey::new(origin, period_id, subblock_id);
        if !self.allow_modification && self.unloads.contains_key(&key) {
            return Err(StateConflictError::UnloadEntryAlreadySet {
                origin,
                period: period_id,
                subblock: subblock_id,
            }
            .into());
        }

        self.unloads.insert(key, ScheduleEntry::new(time, quantity));
        self.set_subblock(period_id, subblock_id)
    }

    /// Adds `quantity` to the load of `(period, subblock)`, creating it if needed. An
    /// existing entry must already be scheduled at `time`.
    pub fn add_load_incrementally(
        &mut self,
        period_id: PeriodIdx,
        subblock_id: SubblockIdx,
        time: TimeStep,
        quantity: Quantity,
    ) -> Result<(), ScheduleError> {
        self.check_entry(period_id, subblock_id, time, quantity)?;

        let key = LoadKey::new(period_id, subblock_id);
        accumulate(
            self.loads.entry(key).or_insert(ScheduleEntry::new(time, 0)),
            key,
            time,
            quantity,
        )?;
        self.set_subblock(period_id, subblock_id)
    }

    pub fn add_unload_incrementally(
        &mut self,
        origin: PeriodIdx,
        period_id: PeriodIdx,
        subblock_id: SubblockIdx,
        time: TimeStep,
        quantity: Quantity,
    ) -> Result<(), ScheduleError> {
        self.problem.period(origin)?;
        self.check_entry(period_id, subblock_id, time, quantity)?;

        let key = UnloadKey::new(origin, period_id, subblock_id);
        accumulate(
            self.unloads.entry(key).or_insert(ScheduleEntry::new(time, 0)),
            key.load_key(),
            time,
            quantity,
        )?;
        self.set_subblock(period_id, subblock_id)
    }

    /// Applies an assignment change to one period. Entries tied to a subblock that
    /// leaves the period are dropped.
    pub fn apply_change(&mut self, change: &SubblockChange) -> Result<(), ScheduleError> {
        if !self.allow_modification {
            return Err(StateConflictError::ModificationNotAllowed.into());
        }

        let period_id = change.period();
        self.problem.period(period_id)?;
        for subblock_id in change.added_subblocks() {
            self.problem.subblock(subblock_id)?;
        }

        let updated = change.apply(&self.assignments[period_id])?;
        for subblock_id in change.released_subblocks() {
            let key = LoadKey::new(period_id, subblock_id);
            self.loads.remove(&key);
            self.unloads.retain(|unload, _| unload.load_key() != key);
        }

        self.assignments[period_id] = updated;
        Ok(())
    }

    /// Derives every aggregate of the schedule.
    pub fn evaluate(self) -> Result<EvaluatedSchedule, ScheduleError> {
        let evaluation = Evaluation::compute(&self)?;
        Ok(EvaluatedSchedule::new(self, evaluation))
    }

    fn check_entry(
        &self,
        period_id: PeriodIdx,
        subblock_id: SubblockIdx,
        time: TimeStep,
        quantity: Quantity,
    ) -> Result<(), ScheduleError> {
        self.problem.period(period_id)?;
        self.problem.subblock(subblock_id)?;
        self.problem.check_time(time)?;

        if quantity == 0 {
            return Err(StateConflictError::ZeroQuantity {
                period: period_id,
                subblock: subblock_id,
            }
            .into());
        }

        Ok(())
    }
}

fn accumulate(
    entry: &mut ScheduleEntry,
    key: LoadKey,
    time: TimeStep,
    quantity: Quantity,
) -> Result<(), StateConflictError> {
    if entry.time != time {
        return Err(StateConflictError::IncrementalTimeMismatch {
            period: key.period,
            subblock: key.subblock,
            stored: entry.time,
            requested: time,
        });
    }

    entry.quantity = entry.quantity.checked_add(quantity).ok_or(
        StateConflictError::QuantityOverflow {
            period: key.period,
            subblock: key.subblock,
        },
    )?;
    Ok(())
}
