use std::sync::Arc;

use fxhash::FxHashSet;
use tracing::{debug, instrument};

use crate::{
    error::{MergeError, StateConflictError},
    problem::{
        subblock::SubblockIdx,
        vessel_period::{PeriodIdx, SlotIdx},
    },
    utils::enumerate_idx::EnumerateIdx,
};

use super::working_schedule::Schedule;

/// One positional edit of a period's subblock list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEdit {
    /// The subblock at `slot` changes from `old` to `new`.
    Replace {
        slot: SlotIdx,
        old: SubblockIdx,
        new: SubblockIdx,
    },
    /// The subblock at `slot` leaves the period without a replacement.
    Remove { slot: SlotIdx, old: SubblockIdx },
    /// `new` joins the period in a trailing slot.
    Add { new: SubblockIdx },
}

/// Edit script turning the ordered assignment of one period into a target set.
///
/// Subblocks present on both sides are reused. The remaining removed and added
/// subblocks are paired in id order as replacements, so the slot of a replaced
/// subblock is kept. Leftovers become removals or trailing additions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubblockChange {
    period: PeriodIdx,
    edits: Vec<SlotEdit>,
}

impl SubblockChange {
    /// `old` must not contain duplicates. `new` is read as a set.
    pub fn compute(period: PeriodIdx, old: &[SubblockIdx], new: &[SubblockIdx]) -> Self {
        let old_set: FxHashSet<SubblockIdx> = old.iter().copied().collect();
        let new_set: FxHashSet<SubblockIdx> = new.iter().copied().collect();

        let mut removed: Vec<(SubblockIdx, SlotIdx)> = old
            .iter()
            .enumerate_idx()
            .filter(|(_, subblock)| !new_set.contains(*subblock))
            .map(|(slot, &subblock)| (subblock, slot))
            .collect();
        removed.sort_unstable();

        let mut added: Vec<SubblockIdx> = new_set
            .iter()
            .filter(|subblock| !old_set.contains(*subblock))
            .copied()
            .collect();
        added.sort_unstable();

        let paired = removed.len().min(added.len());
        let mut edits = Vec::with_capacity(removed.len().max(added.len()));

        for (&(old, slot), &new) in removed.iter().zip(&added) {
            edits.push(SlotEdit::Replace { slot, old, new });
        }

        for &(old, slot) in &removed[paired..] {
            edits.push(SlotEdit::Remove { slot, old });
        }

        for &new in &added[paired..] {
            edits.push(SlotEdit::Add { new });
        }

        SubblockChange { period, edits }
    }

    pub fn period(&self) -> PeriodIdx {
        self.period
    }

    pub fn edits(&self) -> &[SlotEdit] {
        &self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn replace_count(&self) -> usize {
        self.edits
            .iter()
            .filter(|edit| matches!(edit, SlotEdit::Replace { .. }))
            .count()
    }

    /// Subblocks that leave the period.
    pub fn released_subblocks(&self) -> impl Iterator<Item = SubblockIdx> + '_ {
        self.edits.iter().filter_map(|edit| match *edit {
            SlotEdit::Replace { old, .. } | SlotEdit::Remove { old, .. } => Some(old),
            SlotEdit::Add { .. } => None,
        })
    }

    /// Subblocks that join the period.
    pub fn added_subblocks(&self) -> impl Iterator<Item = SubblockIdx> + '_ {
        self.edits.iter().filter_map(|edit| match *edit {
            SlotEdit::Replace { new, .. } | SlotEdit::Add { new } => Some(new),
            SlotEdit::Remove { .. } => None,
        })
    }

    /// Applies the edits to `old`, which must still be the list the change was
    /// computed from. Replacements keep their slot, removed slots are closed up and
    /// additions are appended.
    pub fn apply(&self, old: &[SubblockIdx]) -> Result<Vec<SubblockIdx>, StateConflictError> {
        let mut updated = old.to_vec();
        let mut removed_slots = Vec::new();
        let mut appended = Vec::new();

        for edit in &self.edits {
            match *edit {
                SlotEdit::Replace { slot, old: expected, new } => {
                    self.check_slot(old, slot, expected)?;
                    updated[slot] = new;
                }
                SlotEdit::Remove {
                    slot,
                    old: expected,
                } => {
                    self.check_slot(old, slot, expected)?;
                    removed_slots.push(slot);
                }
                SlotEdit::Add { new } => appended.push(new),
            }
        }

        removed_slots.sort_unstable_by(|a, b| b.cmp(a));
        for slot in removed_slots {
            updated.remove(slot.get());
        }

        for new in appended {
            if !updated.contains(&new) {
                updated.push(new);
            }
        }

        Ok(updated)
    }

    fn check_slot(
        &self,
        old: &[SubblockIdx],
        slot: SlotIdx,
        expected: SubblockIdx,
    ) -> Result<(), StateConflictError> {
        let actual = old.get(slot.get()).copied();
        if actual != Some(expected) {
            return Err(StateConflictError::StaleChange {
                period: self.period,
                slot,
                expected,
                actual,
            });
        }

        Ok(())
    }
}

/// Per-period edit scripts between two schedules of the same problem. Periods whose
/// assignment is unchanged are left out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignmentDiff {
    changes: Vec<SubblockChange>,
}

impl AssignmentDiff {
    #[instrument(skip_all, level = "debug")]
    pub fn between(old: &Schedule, new: &Schedule) -> Result<Self, MergeError> {
        if !Arc::ptr_eq(old.problem(), new.problem()) {
            return Err(MergeError::ProblemMismatch);
        }

        let changes: Vec<SubblockChange> = old
            .assignments()
            .iter()
            .zip(new.assignments())
            .enumerate_idx()
            .map(|(period, (old, new))| SubblockChange::compute(period, old, new))
            .filter(|change| !change.is_empty())
            .collect();

        debug!(
            changed_periods = changes.len(),
            edits = changes.iter().map(|change| change.edits().len()).sum::<usize>(),
            "Computed assignment diff"
        );

        Ok(AssignmentDiff { changes })
    }

    pub fn changes(&self) -> &[SubblockChange] {
        &self.changes
    }

    pub fn change(&self, period: PeriodIdx) -> Option<&SubblockChange> {
        self.changes.iter().find(|change| change.period == period)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
