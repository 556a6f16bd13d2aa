// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock types and granted lock entries

use crate::owner::LockOwner;
use crate::range::LockRange;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shared or exclusive byte-range lock
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockType {
    Read,
    Write,
}

impl LockType {
    /// True if locks of these types held by different owners collide
    pub fn conflicts_with(self, other: LockType) -> bool {
        self == LockType::Write || other == LockType::Write
    }
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockType::Read => f.write_str("READ"),
            LockType::Write => f.write_str("WRITE"),
        }
    }
}

/// A granted lock held by one owner over one range
///
/// Entries are never mutated in place; splitting and merging build new ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    owner: LockOwner,
    range: LockRange,
    kind: LockType,
}

impl LockEntry {
    pub fn new(owner: LockOwner, range: LockRange, kind: LockType) -> Self {
        Self { owner, range, kind }
    }

    pub fn owner(&self) -> &LockOwner {
        &self.owner
    }

    pub fn range(&self) -> LockRange {
        self.range
    }

    pub fn kind(&self) -> LockType {
        self.kind
    }

    pub fn is_owned_by(&self, owner: &LockOwner) -> bool {
        &self.owner == owner
    }

    /// Same owner and type over a different range
    pub fn with_range(&self, range: LockRange) -> Self {
        Self {
            owner: self.owner.clone(),
            range,
            kind: self.kind,
        }
    }
}

impl fmt::Display for LockEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} owner={}", self.kind, self.range, self.owner)
    }
}
