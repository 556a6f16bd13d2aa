// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-file table of granted byte-range locks
//!
//! Entries are kept sorted by start offset and satisfy:
//! - I1: entries of one owner and type never overlap or touch
//! - I1b: entries of one owner never overlap, whatever their type
//! - I2: a WRITE entry overlaps no entry of another owner
//! - I3: entries are sorted by start offset
//!
//! Every mutation builds a candidate table, checks it, and only then
//! replaces the current one, so a broken candidate is never observable.

use crate::entry::{LockEntry, LockType};
use crate::interval::{coalesce, hull, intersection, overlaps, split, subtract_all, touches};
use crate::owner::LockOwner;
use crate::plan::UnlockPlan;
use crate::range::{LockRange, RangeError};
use crate::resolver::{resolve, Resolution};
use std::collections::HashMap;
use thiserror::Error;

/// Table invariant that a candidate broke
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invariant {
    /// I1 / I1b
    OwnerOverlap,
    /// I2
    ForeignWriteOverlap,
    /// I3
    Unsorted,
}

/// A lock table invariant does not hold
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("lock table invariant {invariant:?} violated: {detail}")]
pub struct InvariantViolation {
    pub invariant: Invariant,
    pub detail: String,
}

impl InvariantViolation {
    fn new(invariant: Invariant, detail: String) -> Self {
        Self { invariant, detail }
    }
}

/// Errors from inserting into the table
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InsertError {
    #[error("invalid range: {0}")]
    Invalid(#[from] RangeError),
    #[error("conflicts with {} held lock(s)", .0.len())]
    Conflict(Vec<LockEntry>),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Sorted granted locks of one file
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileLockState {
    entries: Vec<LockEntry>,
}

impl FileLockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from arbitrary entries, checking the invariants
    pub fn from_entries(mut entries: Vec<LockEntry>) -> Result<Self, InvariantViolation> {
        entries.sort_by_key(|e| e.range().start);
        let table = Self { entries };
        table.check_invariants()?;
        Ok(table)
    }

    pub fn entries(&self) -> &[LockEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_of<'a>(&'a self, owner: &'a LockOwner) -> impl Iterator<Item = &'a LockEntry> {
        self.entries.iter().filter(move |e| e.is_owned_by(owner))
    }

    pub fn holds(&self, owner: &LockOwner) -> bool {
        self.entries.iter().any(|e| e.is_owned_by(owner))
    }

    /// Distinct owners with at least one entry
    pub fn owners(&self) -> Vec<LockOwner> {
        let mut owners: Vec<LockOwner> = Vec::new();
        for entry in &self.entries {
            if !owners.contains(entry.owner()) {
                owners.push(entry.owner().clone());
            }
        }
        owners
    }

    /// Entries that block `kind` over `range`, skipping `excluding_owner`'s own
    pub fn conflicts(
        &self,
        range: LockRange,
        kind: LockType,
        excluding_owner: Option<&LockOwner>,
    ) -> Vec<LockEntry> {
        self.entries
            .iter()
            .take_while(|e| range.end.is_after(e.range().start))
            .filter(|e| {
                !excluding_owner.is_some_and(|owner| e.is_owned_by(owner))
                    && kind.conflicts_with(e.kind())
                    && overlaps(&e.range(), &range)
            })
            .cloned()
            .collect()
    }

    /// Grant `owner` a `kind` lock over `range`
    ///
    /// Same-type entries of the owner that overlap or touch the range are
    /// coalesced into one entry; overlapping entries of the other type are
    /// cut back (upgrade/downgrade). Returns the entries that were displaced.
    pub fn insert(
        &mut self,
        owner: LockOwner,
        range: LockRange,
        kind: LockType,
    ) -> Result<Vec<LockEntry>, InsertError> {
        match resolve(self, &owner, range, kind) {
            Resolution::Invalid(e) => return Err(InsertError::Invalid(e)),
            Resolution::Conflict(blockers) => return Err(InsertError::Conflict(blockers)),
            Resolution::Grant | Resolution::Upgrade { .. } | Resolution::Downgrade { .. } => {}
        }

        let merged = self.coalesced_extent(&owner, range, kind);

        let mut displaced = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len() + 2);
        for entry in &self.entries {
            if !entry.is_owned_by(&owner) {
                kept.push(entry.clone());
            } else if entry.kind() == kind && touches(&entry.range(), &merged) {
                displaced.push(entry.clone());
            } else if entry.kind() != kind && overlaps(&entry.range(), &merged) {
                displaced.push(entry.clone());
                let (left, right) = split(entry, &merged);
                kept.extend(left);
                kept.extend(right);
            } else {
                kept.push(entry.clone());
            }
        }
        kept.push(LockEntry::new(owner, merged, kind));

        self.commit(kept)?;
        Ok(displaced)
    }

    /// Extent of the new entry once same-type neighbours are absorbed
    fn coalesced_extent(&self, owner: &LockOwner, range: LockRange, kind: LockType) -> LockRange {
        let mut merged = range;
        loop {
            let grown = self
                .entries_of(owner)
                .filter(|e| e.kind() == kind && touches(&e.range(), &merged))
                .fold(merged, |acc, e| hull(&acc, &e.range()));
            if grown == merged {
                return merged;
            }
            merged = grown;
        }
    }

    /// Release `owner`'s locks over `range`
    ///
    /// Entries of other owners are untouched. Nothing matching yields an
    /// empty plan.
    pub fn remove(&mut self, owner: &LockOwner, range: LockRange) -> UnlockPlan {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len() + 1);
        for entry in &self.entries {
            match intersection(&entry.range(), &range) {
                Some(cut) if entry.is_owned_by(owner) => {
                    removed.push(cut);
                    let (left, right) = split(entry, &range);
                    kept.extend(left);
                    kept.extend(right);
                }
                _ => kept.push(entry.clone()),
            }
        }

        if removed.is_empty() {
            return UnlockPlan::empty();
        }
        kept.sort_by_key(|e| e.range().start);
        self.entries = kept;
        UnlockPlan::from_removed(removed)
    }

    /// Apply an unlock of `range` to a scratch copy of every owner's entries
    ///
    /// The real table is untouched. `retained` is the part of `range` still
    /// covered by some owner in the copy, `release` is the rest. Netting a
    /// per-owner [`remove`](Self::remove) plan against this projection gives
    /// the exact bytes whose kernel lock can go.
    pub fn project_remove(&self, range: LockRange) -> UnlockPlan {
        let scratch: Vec<&LockEntry> = self
            .entries
            .iter()
            .filter(|e| overlaps(&e.range(), &range))
            .collect();

        let mut retained = Vec::with_capacity(scratch.len());
        for entry in scratch {
            if let Some(cut) = intersection(&entry.range(), &range) {
                retained.push(cut);
            }
        }
        let retained = coalesce(retained);
        let release = coalesce(subtract_all(&[range], &retained));

        UnlockPlan {
            removed: vec![range],
            retained,
            release,
        }
    }

    /// Covered parts of `range` with the lock type the kernel should hold
    pub fn coverage(&self, range: LockRange) -> Vec<(LockRange, LockType)> {
        let mut reads = Vec::new();
        let mut writes = Vec::new();
        for entry in &self.entries {
            if let Some(cut) = intersection(&entry.range(), &range) {
                match entry.kind() {
                    LockType::Read => reads.push(cut),
                    LockType::Write => writes.push(cut),
                }
            }
        }

        let mut covered: Vec<(LockRange, LockType)> = coalesce(reads)
            .into_iter()
            .map(|r| (r, LockType::Read))
            .chain(coalesce(writes).into_iter().map(|r| (r, LockType::Write)))
            .collect();
        covered.sort_by_key(|(r, _)| r.start);
        covered
    }

    /// Verify I1, I1b, I2 and I3
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for pair in self.entries.windows(2) {
            if pair[0].range().start > pair[1].range().start {
                return Err(InvariantViolation::new(
                    Invariant::Unsorted,
                    format!("{} before {}", pair[0], pair[1]),
                ));
            }
        }

        let mut by_owner: HashMap<&LockOwner, Vec<&LockEntry>> = HashMap::new();
        for entry in &self.entries {
            by_owner.entry(entry.owner()).or_default().push(entry);
        }
        for entries in by_owner.values() {
            for pair in entries.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let clash = overlaps(&a.range(), &b.range())
                    || (a.kind() == b.kind() && touches(&a.range(), &b.range()));
                if clash {
                    return Err(InvariantViolation::new(
                        Invariant::OwnerOverlap,
                        format!("{} and {}", a, b),
                    ));
                }
            }
        }

        for (i, write) in self.entries.iter().enumerate() {
            if write.kind() != LockType::Write {
                continue;
            }
            let foreign = self.entries.iter().enumerate().find(|(j, other)| {
                *j != i && !other.is_owned_by(write.owner()) && overlaps(&write.range(), &other.range())
            });
            if let Some((_, other)) = foreign {
                return Err(InvariantViolation::new(
                    Invariant::ForeignWriteOverlap,
                    format!("{} and {}", write, other),
                ));
            }
        }

        Ok(())
    }

    fn commit(&mut self, mut entries: Vec<LockEntry>) -> Result<(), InvariantViolation> {
        entries.sort_by_key(|e| e.range().start);
        let candidate = Self { entries };
        candidate.check_invariants()?;
        *self = candidate;
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_state_tests.rs"]
mod tests;
