// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unlock plans: which sub-ranges changed coverage on an unlock
//!
//! The kernel lock only sees the union of all owners, so a per-owner unlock
//! may only release the bytes no other owner still covers.

use crate::interval::{coalesce, intersection, subtract_all};
use crate::range::LockRange;
use serde::{Deserialize, Serialize};

/// Per-unlock description of coverage changes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockPlan {
    /// Bytes the unlocking owner gave up
    pub removed: Vec<LockRange>,
    /// Bytes of `removed` some other owner still holds
    pub retained: Vec<LockRange>,
    /// Bytes whose kernel-level lock must be dropped
    pub release: Vec<LockRange>,
}

impl UnlockPlan {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Plan for an owner giving up `removed`, before netting
    pub fn from_removed(removed: Vec<LockRange>) -> Self {
        let removed = coalesce(removed);
        Self {
            release: removed.clone(),
            removed,
            retained: Vec::new(),
        }
    }

    /// True if the unlock matched nothing
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    /// True if the kernel lock must change
    pub fn needs_release(&self) -> bool {
        !self.release.is_empty()
    }

    /// Net this plan against a scratch projection of the remaining owners
    ///
    /// `projection.retained` is what stayed covered after the unlock was
    /// applied to every other owner's entries; only the rest is released.
    pub fn netted(self, projection: &UnlockPlan) -> Self {
        let retained: Vec<LockRange> = self
            .removed
            .iter()
            .flat_map(|removed| {
                projection
                    .retained
                    .iter()
                    .filter_map(move |kept| intersection(removed, kept))
            })
            .collect();
        let retained = coalesce(retained);
        let release = coalesce(subtract_all(&self.removed, &retained));
        Self {
            removed: self.removed,
            retained,
            release,
        }
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
