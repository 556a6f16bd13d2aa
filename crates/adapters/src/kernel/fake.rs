// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake kernel adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{KernelError, KernelLockAdapter};
use async_trait::async_trait;
use brl_core::interval::{hull, overlaps, split_range, touches};
use brl_core::{FileId, LockRange, LockType};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded kernel call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelCall {
    Acquire {
        file: FileId,
        range: LockRange,
        kind: LockType,
    },
    Release {
        file: FileId,
        range: LockRange,
    },
    Forget {
        file: FileId,
    },
}

#[derive(Default)]
struct FakeState {
    held: HashMap<FileId, Vec<(LockRange, LockType)>>,
    calls: Vec<KernelCall>,
    fail_acquire: Option<KernelError>,
    fail_release: Option<KernelError>,
}

/// Fake kernel adapter modelling a single lock description per file
///
/// Acquiring converts whatever is held over the range, releasing drops it,
/// exactly like one OFD per file.
#[derive(Clone, Default)]
pub struct FakeKernelAdapter {
    state: Arc<Mutex<FakeState>>,
    delay: Option<Duration>,
}

impl FakeKernelAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call sleep first, widening race windows in tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<KernelCall> {
        self.lock_state().calls.clone()
    }

    /// Release calls recorded so far
    pub fn releases(&self) -> Vec<(FileId, LockRange)> {
        self.lock_state()
            .calls
            .iter()
            .filter_map(|c| match c {
                KernelCall::Release { file, range } => Some((file.clone(), *range)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock_state().calls.clear();
    }

    /// Coverage currently held for `file`, sorted and coalesced per type
    pub fn held(&self, file: &FileId) -> Vec<(LockRange, LockType)> {
        self.lock_state().held.get(file).cloned().unwrap_or_default()
    }

    /// Fail the next acquire with `err`
    pub fn fail_next_acquire(&self, err: KernelError) {
        self.lock_state().fail_acquire = Some(err);
    }

    /// Fail the next release with `err`
    pub fn fail_next_release(&self, err: KernelError) {
        self.lock_state().fail_release = Some(err);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Drop `range` from held pieces
fn carve(held: Vec<(LockRange, LockType)>, range: &LockRange) -> Vec<(LockRange, LockType)> {
    let mut out = Vec::with_capacity(held.len() + 1);
    for (piece, kind) in held {
        if !overlaps(&piece, range) {
            out.push((piece, kind));
            continue;
        }
        let (left, right) = split_range(&piece, range);
        out.extend(left.map(|r| (r, kind)));
        out.extend(right.map(|r| (r, kind)));
    }
    out
}

/// Sort and merge touching pieces of the same type
fn normalize(mut held: Vec<(LockRange, LockType)>) -> Vec<(LockRange, LockType)> {
    held.sort_by_key(|(r, _)| r.start);
    let mut out: Vec<(LockRange, LockType)> = Vec::with_capacity(held.len());
    for (range, kind) in held {
        match out.last_mut() {
            Some((last, last_kind)) if *last_kind == kind && touches(last, &range) => {
                *last = hull(last, &range);
            }
            _ => out.push((range, kind)),
        }
    }
    out
}

#[async_trait]
impl KernelLockAdapter for FakeKernelAdapter {
    async fn acquire(
        &self,
        file: &FileId,
        range: LockRange,
        kind: LockType,
    ) -> Result<(), KernelError> {
        self.pause().await;
        let mut state = self.lock_state();
        state.calls.push(KernelCall::Acquire {
            file: file.clone(),
            range,
            kind,
        });
        if let Some(err) = state.fail_acquire.take() {
            return Err(err);
        }

        let held = state.held.remove(file).unwrap_or_default();
        let mut held = carve(held, &range);
        held.push((range, kind));
        state.held.insert(file.clone(), normalize(held));
        Ok(())
    }

    async fn release(&self, file: &FileId, range: LockRange) -> Result<(), KernelError> {
        self.pause().await;
        let mut state = self.lock_state();
        state.calls.push(KernelCall::Release {
            file: file.clone(),
            range,
        });
        if let Some(err) = state.fail_release.take() {
            return Err(err);
        }

        let held = state.held.remove(file).unwrap_or_default();
        let held = carve(held, &range);
        if !held.is_empty() {
            state.held.insert(file.clone(), held);
        }
        Ok(())
    }

    fn forget(&self, file: &FileId) {
        let mut state = self.lock_state();
        state.calls.push(KernelCall::Forget { file: file.clone() });
        state.held.remove(file);
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
