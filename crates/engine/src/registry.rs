// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of per-file lock slots
//!
//! A slot exists while something references it or it still holds entries
//! or parked requests. Lock order is registry, then slot state; a slot's
//! state guard is never held while touching the registry.

use crate::wait::{RequestIds, WaitArena};
use brl_core::{FileId, FileLockState};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Mutable state of one file, guarded by the slot mutex
#[derive(Debug, Default)]
pub struct SlotState {
    pub table: FileLockState,
    pub waiters: WaitArena,
    /// Bumped on every committed table change
    pub generation: u64,
}

impl SlotState {
    fn is_idle(&self) -> bool {
        self.table.is_empty() && self.waiters.is_empty()
    }
}

/// Per-file exclusion primitive and kernel gate
pub struct FileSlot {
    id: FileId,
    state: Mutex<SlotState>,
    /// Held across evaluate, kernel call and commit for kernel-mutating work
    gate: tokio::sync::Mutex<()>,
}

impl FileSlot {
    fn new(id: FileId, ids: RequestIds) -> Self {
        let state = SlotState {
            waiters: WaitArena::sharing(ids),
            ..SlotState::default()
        };
        Self {
            id,
            state: Mutex::new(state),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> &FileId {
        &self.id
    }

    /// Lock the slot state; never hold the guard across an `.await`
    pub fn state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn gate(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.gate.lock().await
    }
}

impl fmt::Debug for FileSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSlot").field("id", &self.id).finish()
    }
}

struct Registered {
    slot: Arc<FileSlot>,
    refs: usize,
}

type Reaper = Arc<dyn Fn(&FileId) + Send + Sync>;

struct RegistryInner {
    files: Mutex<HashMap<FileId, Registered>>,
    on_reap: Option<Reaper>,
    ids: RequestIds,
}

impl RegistryInner {
    fn files(&self) -> MutexGuard<'_, HashMap<FileId, Registered>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Map from file id to its slot, with reference counts
#[derive(Clone)]
pub struct FileRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FileRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                files: Mutex::new(HashMap::new()),
                on_reap: None,
                ids: RequestIds::new(),
            }),
        }
    }

    /// Registry that calls `on_reap` when it drops an idle file
    ///
    /// `on_reap` runs under the registry lock, so the file cannot be tracked
    /// again until it returns. It must not call back into the registry.
    pub fn with_reaper(on_reap: impl Fn(&FileId) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                files: Mutex::new(HashMap::new()),
                on_reap: Some(Arc::new(on_reap)),
                ids: RequestIds::new(),
            }),
        }
    }

    /// Reference the slot for `id`, creating it on first use
    pub fn acquire(&self, id: &FileId) -> FileRef {
        let mut files = self.inner.files();
        let registered = files.entry(id.clone()).or_insert_with(|| {
            tracing::debug!(file = %id, "tracking file");
            Registered {
                slot: Arc::new(FileSlot::new(id.clone(), self.inner.ids.clone())),
                refs: 0,
            }
        });
        registered.refs += 1;
        FileRef {
            registry: Arc::clone(&self.inner),
            slot: Arc::clone(&registered.slot),
        }
    }

    /// Reference the slot for `id` only if it is already tracked
    pub fn get(&self, id: &FileId) -> Option<FileRef> {
        let mut files = self.inner.files();
        let registered = files.get_mut(id)?;
        registered.refs += 1;
        Some(FileRef {
            registry: Arc::clone(&self.inner),
            slot: Arc::clone(&registered.slot),
        })
    }

    /// Tracked files, sorted
    pub fn files(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self.inner.files().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.inner.files().contains_key(id)
    }

    /// Outstanding references to `id`
    pub fn refs(&self, id: &FileId) -> Option<usize> {
        self.inner.files().get(id).map(|r| r.refs)
    }

    /// Drop `id` if it is unreferenced and idle
    pub fn reap(&self, id: &FileId) -> bool {
        reap(&self.inner, id)
    }
}

fn reap(inner: &RegistryInner, id: &FileId) -> bool {
    let mut files = inner.files();
    let idle = files
        .get(id)
        .is_some_and(|r| r.refs == 0 && r.slot.state().is_idle());
    if !idle || files.remove(id).is_none() {
        return false;
    }
    tracing::debug!(file = %id, "reaped idle file");
    // Still under the registry lock: a concurrent acquire waits for this
    if let Some(on_reap) = &inner.on_reap {
        on_reap(id);
    }
    true
}

/// Counted reference to a file slot
pub struct FileRef {
    registry: Arc<RegistryInner>,
    slot: Arc<FileSlot>,
}

impl FileRef {
    pub fn slot(&self) -> &FileSlot {
        &self.slot
    }

    pub fn id(&self) -> &FileId {
        self.slot.id()
    }
}

impl std::ops::Deref for FileRef {
    type Target = FileSlot;

    fn deref(&self) -> &FileSlot {
        &self.slot
    }
}

impl Clone for FileRef {
    fn clone(&self) -> Self {
        if let Some(registered) = self.registry.files().get_mut(self.slot.id()) {
            registered.refs += 1;
        }
        Self {
            registry: Arc::clone(&self.registry),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl Drop for FileRef {
    fn drop(&mut self) {
        let id = self.slot.id().clone();
        let last = {
            let mut files = self.registry.files();
            match files.get_mut(&id) {
                Some(registered) if Arc::ptr_eq(&registered.slot, &self.slot) => {
                    registered.refs = registered.refs.saturating_sub(1);
                    registered.refs == 0
                }
                _ => false,
            }
        };
        if last {
            reap(&self.registry, &id);
        }
    }
}

impl fmt::Debug for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileRef").field(self.slot.id()).finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
