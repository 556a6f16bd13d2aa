// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge from lock tables to the kernel's coarse per-file lock
//!
//! One-directional: the table is the source of truth and the kernel lock
//! follows the union of all owners' entries. Callers hold the file's gate
//! and never the slot state across these calls.

use brl_adapters::{KernelError, KernelLockAdapter};
use brl_core::interval::{coalesce, subtract_all};
use brl_core::{FileId, FileLockState, LockRange, LockType, UnlockPlan};

/// Which way a delta moves kernel coverage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Acquire,
    Release,
}

/// Coverage change to mirror into the kernel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KernelDelta {
    /// A lock was granted over `range`
    Granted { range: LockRange, kind: LockType },
    /// An unlock was netted against the remaining owners
    Unlocked(UnlockPlan),
}

impl KernelDelta {
    pub fn direction(&self) -> Direction {
        match self {
            KernelDelta::Granted { .. } => Direction::Acquire,
            KernelDelta::Unlocked(_) => Direction::Release,
        }
    }
}

/// Applies table deltas to a kernel adapter
#[derive(Clone)]
pub struct KernelSync<K> {
    kernel: K,
}

impl<K: KernelLockAdapter> KernelSync<K> {
    pub fn new(kernel: K) -> Self {
        Self { kernel }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Mirror `delta` into the kernel
    ///
    /// A grant is one acquire. An unlock releases only `plan.release`; every
    /// piece is attempted and the first failure returned.
    pub async fn apply(&self, file: &FileId, delta: &KernelDelta) -> Result<(), KernelError> {
        match delta {
            KernelDelta::Granted { range, kind } => {
                self.kernel.acquire(file, *range, *kind).await
            }
            KernelDelta::Unlocked(plan) => {
                let mut first_err = None;
                for range in &plan.release {
                    if let Err(e) = self.kernel.release(file, *range).await {
                        first_err.get_or_insert(e);
                    }
                }
                first_err.map_or(Ok(()), Err)
            }
        }
    }

    /// Re-derive the kernel state of `range` from `table`
    ///
    /// Covered pieces are (re)acquired with their type, uncovered gaps
    /// released.
    pub async fn restore(
        &self,
        file: &FileId,
        range: LockRange,
        table: &FileLockState,
    ) -> Result<(), KernelError> {
        let covered = table.coverage(range);
        let pieces: Vec<LockRange> = covered.iter().map(|(r, _)| *r).collect();
        let gaps = coalesce(subtract_all(&[range], &pieces));
        tracing::debug!(
            file = %file,
            %range,
            covered = covered.len(),
            gaps = gaps.len(),
            "restoring kernel coverage"
        );

        let mut first_err = None;
        for (piece, kind) in covered {
            if let Err(e) = self.kernel.acquire(file, piece, kind).await {
                first_err.get_or_insert(e);
            }
        }
        for gap in gaps {
            if let Err(e) = self.kernel.release(file, gap).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Close whatever the kernel adapter keeps open for `file`
    pub fn forget(&self, file: &FileId) {
        self.kernel.forget(file);
    }
}

#[cfg(test)]
#[path = "kernel_sync_tests.rs"]
mod tests;
