// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict resolution for lock requests
//!
//! Stateless: decides whether a request can be granted against a table
//! without touching it.

use crate::entry::{LockEntry, LockType};
use crate::file_state::FileLockState;
use crate::interval::overlaps;
use crate::owner::LockOwner;
use crate::range::{LockRange, RangeError};

/// Outcome of evaluating a request against a table
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing blocks the request
    Grant,
    /// The owner's own READ entries become WRITE over the range
    Upgrade { replaced: Vec<LockEntry> },
    /// The owner's own WRITE entries become READ over the range
    Downgrade { replaced: Vec<LockEntry> },
    /// Entries of other owners block the request
    Conflict(Vec<LockEntry>),
    /// The range is empty or inverted
    Invalid(RangeError),
}

impl Resolution {
    pub fn is_grantable(&self) -> bool {
        matches!(
            self,
            Resolution::Grant | Resolution::Upgrade { .. } | Resolution::Downgrade { .. }
        )
    }
}

/// Evaluate `owner` locking `range` as `kind` against `table`
///
/// The owner's own entries never block it. An overlapping own entry of the
/// other type turns the grant into an upgrade or downgrade, which the table
/// applies as a single replace.
pub fn resolve(
    table: &FileLockState,
    owner: &LockOwner,
    range: LockRange,
    kind: LockType,
) -> Resolution {
    if let Err(e) = range.validate() {
        return Resolution::Invalid(e);
    }

    let blockers = table.conflicts(range, kind, Some(owner));
    if !blockers.is_empty() {
        return Resolution::Conflict(blockers);
    }

    let replaced: Vec<LockEntry> = table
        .entries_of(owner)
        .filter(|e| e.kind() != kind && overlaps(&e.range(), &range))
        .cloned()
        .collect();

    match (replaced.is_empty(), kind) {
        (true, _) => Resolution::Grant,
        (false, LockType::Write) => Resolution::Upgrade { replaced },
        (false, LockType::Read) => Resolution::Downgrade { replaced },
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
