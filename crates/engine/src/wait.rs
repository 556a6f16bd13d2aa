// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parked blocking requests and the wait/wake protocol
//!
//! Each file keeps its parked requests in a [`WaitArena`]: slots addressed by
//! generational [`WaitHandle`]s, threaded into a FIFO wait list by index.
//! Generations come from [`RequestIds`], shared by every arena of a
//! registry, so a stale handle never matches a later occupant even after the
//! file was reaped and tracked again.

use brl_core::interval::overlaps;
use brl_core::{FileId, LockOwner, LockRange, LockType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Generational index of a slot in a file's wait arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitHandle {
    pub index: u32,
    pub generation: u64,
}

impl fmt::Display for WaitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

/// Identifies one parked request: the file plus its arena handle
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitToken {
    pub file: FileId,
    pub handle: WaitHandle,
}

impl fmt::Display for WaitToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file, self.handle)
    }
}

/// Errors from parsing a printed wait token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed wait token {0:?} (expected FILE#INDEX.GENERATION)")]
pub struct TokenParseError(String);

impl FromStr for WaitToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TokenParseError(s.to_string());
        let (file, handle) = s.rsplit_once('#').ok_or_else(malformed)?;
        let (index, generation) = handle.split_once('.').ok_or_else(malformed)?;
        if file.is_empty() {
            return Err(malformed());
        }
        Ok(Self {
            file: FileId::new(file),
            handle: WaitHandle {
                index: index.parse().map_err(|_| malformed())?,
                generation: generation.parse().map_err(|_| malformed())?,
            },
        })
    }
}

/// Lifecycle of a lock request
///
/// `Init` moves to `Granted`, `Rejected` or `Pending`; `Pending` ends in
/// `Granted` or `Cancelled`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Init,
    Pending,
    Granted,
    Rejected,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Granted | RequestState::Rejected | RequestState::Cancelled
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestState::Init => "init",
            RequestState::Pending => "pending",
            RequestState::Granted => "granted",
            RequestState::Rejected => "rejected",
            RequestState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Wake channels of one parked request
#[derive(Debug)]
pub struct WaitEntry {
    /// The file's table changed; re-evaluate
    changed: Notify,
    /// Someone outside the table asked the waiter to look again
    revoked: Notify,
    cancel: CancellationToken,
}

impl WaitEntry {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            changed: Notify::new(),
            revoked: Notify::new(),
            cancel,
        }
    }

    /// Signal both channels; a permit is kept if the waiter is not yet asleep
    pub fn wake(&self) {
        self.changed.notify_one();
        self.revoked.notify_one();
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
        self.revoked.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves on the first wake or cancellation
    ///
    /// One wake stores a permit on each channel; the one not taken here is
    /// drained so the next sleep does not return straight away.
    pub async fn sleep(&self) {
        tokio::select! {
            _ = self.changed.notified() => drain(&self.revoked).await,
            _ = self.revoked.notified() => drain(&self.changed).await,
            _ = self.cancel.cancelled() => {}
        }
    }
}

/// Take a stored permit if there is one, without waiting
async fn drain(notify: &Notify) {
    let _ = tokio::time::timeout(Duration::ZERO, notify.notified()).await;
}

/// A request waiting for its range to become free
#[derive(Debug, Clone)]
pub struct Parked {
    pub owner: LockOwner,
    pub range: LockRange,
    pub kind: LockType,
    pub entry: Arc<WaitEntry>,
}

impl Parked {
    /// True if this is the same owner asking for the same lock
    pub fn is_duplicate_of(&self, owner: &LockOwner, range: LockRange, kind: LockType) -> bool {
        &self.owner == owner && self.range == range && self.kind == kind
    }
}

/// Counter handing out request generations
#[derive(Clone, Debug, Default)]
pub struct RequestIds(Arc<AtomicU64>);

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    parked: Option<Parked>,
    prev: Option<u32>,
    next: Option<u32>,
}

/// Arena of parked requests for one file
#[derive(Debug, Default)]
pub struct WaitArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
    ids: RequestIds,
}

impl WaitArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena drawing generations from a shared counter
    pub fn sharing(ids: RequestIds) -> Self {
        Self {
            ids,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Park a request at the tail of the wait list
    pub fn insert(&mut self, parked: Parked) -> WaitHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    parked: None,
                    prev: None,
                    next: None,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let tail = self.tail;
        let generation = self.ids.next();
        let slot = &mut self.slots[index as usize];
        slot.generation = generation;
        slot.parked = Some(parked);
        slot.prev = tail;
        slot.next = None;

        match tail {
            Some(t) => self.slots[t as usize].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        WaitHandle { index, generation }
    }

    fn slot(&self, handle: WaitHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation && s.parked.is_some())
    }

    pub fn contains(&self, handle: WaitHandle) -> bool {
        self.slot(handle).is_some()
    }

    pub fn get(&self, handle: WaitHandle) -> Option<&Parked> {
        self.slot(handle).and_then(|s| s.parked.as_ref())
    }

    /// Unlink and free a slot; stale handles return `None`
    pub fn remove(&mut self, handle: WaitHandle) -> Option<Parked> {
        self.slot(handle)?;
        let slot = &mut self.slots[handle.index as usize];
        let parked = slot.parked.take();
        let (prev, next) = (slot.prev.take(), slot.next.take());

        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n as usize].prev = prev,
            None => self.tail = prev,
        }
        self.free.push(handle.index);
        self.len -= 1;
        parked
    }

    /// Parked requests in wait-list order
    pub fn iter(&self) -> impl Iterator<Item = (WaitHandle, &Parked)> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let index = cursor?;
            let slot = &self.slots[index as usize];
            cursor = slot.next;
            let handle = WaitHandle {
                index,
                generation: slot.generation,
            };
            slot.parked.as_ref().map(|p| (handle, p))
        })
    }

    /// Handle of a parked request identical to the one described
    pub fn find_duplicate(
        &self,
        owner: &LockOwner,
        range: LockRange,
        kind: LockType,
    ) -> Option<WaitHandle> {
        self.iter()
            .find(|(_, p)| p.is_duplicate_of(owner, range, kind))
            .map(|(h, _)| h)
    }

    /// Remove and cancel every request of `owner` overlapping `range`
    pub fn cancel_overlapping(&mut self, owner: &LockOwner, range: &LockRange) -> Vec<WaitHandle> {
        let doomed: Vec<WaitHandle> = self
            .iter()
            .filter(|(_, p)| &p.owner == owner && overlaps(&p.range, range))
            .map(|(h, _)| h)
            .collect();
        for handle in &doomed {
            if let Some(parked) = self.remove(*handle) {
                parked.entry.cancel();
            }
        }
        doomed
    }

    /// Remove and cancel everything, returning the handles
    pub fn cancel_all(&mut self) -> Vec<WaitHandle> {
        let all: Vec<WaitHandle> = self.iter().map(|(h, _)| h).collect();
        for handle in &all {
            if let Some(parked) = self.remove(*handle) {
                parked.entry.cancel();
            }
        }
        all
    }

    /// Wake every parked request; each re-evaluates on its own
    pub fn wake_all(&self) -> usize {
        let mut woken = 0;
        for (_, parked) in self.iter() {
            parked.entry.wake();
            woken += 1;
        }
        woken
    }
}

/// Opaque value a hook hands back to itself across a suspension
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuspendMarker(pub String);

/// Callbacks around a waiter's suspension
///
/// `before_sleep` runs in registration order, `after_sleep` in reverse. At
/// most one hook may return a marker per suspension; the hook that produced
/// it gets it back in `after_sleep`.
pub trait SleepHook: Send + Sync {
    fn name(&self) -> &str;

    fn before_sleep(&self, token: &WaitToken) -> Option<SuspendMarker>;

    fn after_sleep(&self, token: &WaitToken, marker: Option<SuspendMarker>);
}

/// Ordered set of sleep hooks
#[derive(Clone, Default)]
pub struct SleepHooks {
    hooks: Vec<Arc<dyn SleepHook>>,
}

impl fmt::Debug for SleepHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

/// Markers collected by one suspension, indexed like the hooks
#[derive(Debug)]
pub struct Suspension {
    markers: Vec<Option<SuspendMarker>>,
}

impl SleepHooks {
    pub fn push(&mut self, hook: Arc<dyn SleepHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run `before_sleep` on every hook
    ///
    /// A second marker is a contract violation: the hooks already run are
    /// unwound with `after_sleep` and the names of the two offenders returned.
    pub fn before_sleep(&self, token: &WaitToken) -> Result<Suspension, String> {
        let mut markers: Vec<Option<SuspendMarker>> = Vec::with_capacity(self.hooks.len());
        let mut marked_by: Option<usize> = None;
        for (i, hook) in self.hooks.iter().enumerate() {
            let marker = hook.before_sleep(token);
            if marker.is_some() {
                if let Some(first) = marked_by {
                    let message = format!(
                        "hooks {} and {} both returned a suspend marker",
                        self.hooks[first].name(),
                        hook.name()
                    );
                    markers.push(marker);
                    self.after_sleep(token, Suspension { markers });
                    return Err(message);
                }
                marked_by = Some(i);
            }
            markers.push(marker);
        }
        Ok(Suspension { markers })
    }

    /// Run `after_sleep` in reverse order for the hooks that ran
    pub fn after_sleep(&self, token: &WaitToken, suspension: Suspension) {
        for (hook, marker) in self.hooks.iter().zip(suspension.markers).rev() {
            hook.after_sleep(token, marker);
        }
    }
}

#[cfg(test)]
#[path = "wait_tests.rs"]
mod tests;
