// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock coordinator: LOCK, UNLOCK, TEST and CANCEL across files
//!
//! Callers are concurrent tasks; there is no lock-service thread. Each file
//! has a short synchronous mutex over its table and wait list, plus an async
//! gate that orders kernel-mutating work (evaluate, kernel call, commit).

use crate::error::LockError;
use crate::kernel_sync::{KernelDelta, KernelSync};
use crate::registry::{FileRef, FileRegistry, FileSlot};
use crate::wait::{Parked, RequestState, SleepHooks, WaitArena, WaitEntry, WaitHandle, WaitToken};
use brl_adapters::{KernelError, KernelLockAdapter};
use brl_core::{
    resolve, FileId, InsertError, LockEntry, LockOwner, LockRange, LockType, Resolution,
    UnlockPlan,
};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A normalized lock request from a protocol front-end
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockRequest {
    pub file: FileId,
    pub owner: LockOwner,
    pub range: LockRange,
    pub kind: LockType,
    /// Park on conflict instead of failing
    pub blocking: bool,
}

impl LockRequest {
    pub fn new(file: impl Into<FileId>, owner: LockOwner, range: LockRange, kind: LockType) -> Self {
        Self {
            file: file.into(),
            owner,
            range,
            kind,
            blocking: false,
        }
    }

    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }
}

/// Result of a LOCK call
pub enum LockOutcome<K: KernelLockAdapter> {
    Granted,
    /// Non-blocking request refused; these entries are in the way
    Denied(Vec<LockEntry>),
    /// Blocking request parked; wait on the handle
    Pending(PendingLock<K>),
    /// The same owner already has this exact request parked
    AlreadyPending(WaitToken),
}

impl<K: KernelLockAdapter> LockOutcome<K> {
    pub fn state(&self) -> RequestState {
        match self {
            LockOutcome::Granted => RequestState::Granted,
            LockOutcome::Denied(_) => RequestState::Rejected,
            LockOutcome::Pending(_) | LockOutcome::AlreadyPending(_) => RequestState::Pending,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, LockOutcome::Granted)
    }
}

impl<K: KernelLockAdapter> fmt::Debug for LockOutcome<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockOutcome::Granted => f.write_str("Granted"),
            LockOutcome::Denied(blockers) => f.debug_tuple("Denied").field(blockers).finish(),
            LockOutcome::Pending(pending) => f.debug_tuple("Pending").field(pending).finish(),
            LockOutcome::AlreadyPending(token) => {
                f.debug_tuple("AlreadyPending").field(token).finish()
            }
        }
    }
}

/// How a wait on a parked request ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Granted,
    Cancelled,
    TimedOut,
}

impl WaitOutcome {
    pub fn state(self) -> RequestState {
        match self {
            WaitOutcome::Granted => RequestState::Granted,
            WaitOutcome::Cancelled | WaitOutcome::TimedOut => RequestState::Cancelled,
        }
    }
}

/// Result of an UNLOCK call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnlockResult {
    pub plan: UnlockPlan,
    /// The owner's parked requests that overlapped the range
    pub cancelled: Vec<WaitToken>,
    /// Kernel release failure; the table change stands regardless
    pub divergence: Option<KernelError>,
}

impl UnlockResult {
    pub fn is_empty(&self) -> bool {
        self.plan.is_empty() && self.cancelled.is_empty()
    }
}

/// Diagnostic view of one parked request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParkedRequest {
    pub token: WaitToken,
    pub owner: LockOwner,
    pub range: LockRange,
    pub kind: LockType,
}

enum Attempt<Lost> {
    Granted { downgraded: bool },
    Conflict(Vec<LockEntry>),
    /// The claimed parked request was cancelled under us
    Cancelled(Lost),
}

/// Whose behalf a grant attempt is made on
trait Claim: Copy {
    /// Evidence that the claim was lost; uninhabited if it cannot be
    type Lost;

    fn lost(self, waiters: &WaitArena) -> Option<Self::Lost>;

    /// Unpark the claimant once its grant commits
    fn settle(self, waiters: &mut WaitArena);
}

/// A request that was never parked, so nothing can cancel it
#[derive(Clone, Copy)]
struct NewRequest;

impl Claim for NewRequest {
    type Lost = Infallible;

    fn lost(self, _waiters: &WaitArena) -> Option<Infallible> {
        None
    }

    fn settle(self, _waiters: &mut WaitArena) {}
}

impl Claim for WaitHandle {
    type Lost = ();

    fn lost(self, waiters: &WaitArena) -> Option<()> {
        (!waiters.contains(self)).then_some(())
    }

    fn settle(self, waiters: &mut WaitArena) {
        waiters.remove(self);
    }
}

struct Inner<K> {
    registry: FileRegistry,
    kernel: KernelSync<K>,
    hooks: SleepHooks,
    shutdown: CancellationToken,
}

/// Coordinates byte-range locks of many owners over many files
#[derive(Clone)]
pub struct LockCoordinator<K> {
    inner: Arc<Inner<K>>,
}

impl<K: KernelLockAdapter> LockCoordinator<K> {
    pub fn new(kernel: K) -> Self {
        Self::with_hooks(kernel, SleepHooks::default())
    }

    pub fn with_hooks(kernel: K, hooks: SleepHooks) -> Self {
        let reaper = kernel.clone();
        Self {
            inner: Arc::new(Inner {
                registry: FileRegistry::with_reaper(move |file| reaper.forget(file)),
                kernel: KernelSync::new(kernel),
                hooks,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.inner.registry
    }

    pub fn kernel(&self) -> &K {
        self.inner.kernel.kernel()
    }

    /// LOCK: grant, deny, or park the request
    pub async fn lock(&self, request: LockRequest) -> Result<LockOutcome<K>, LockError> {
        request.range.validate()?;
        let LockRequest {
            file,
            owner,
            range,
            kind,
            blocking,
        } = request;
        let slot = self.inner.registry.acquire(&file);

        if blocking {
            let duplicate = slot.state().waiters.find_duplicate(&owner, range, kind);
            if let Some(handle) = duplicate {
                tracing::debug!(file = %file, %owner, %range, "request already parked");
                return Ok(LockOutcome::AlreadyPending(WaitToken { file, handle }));
            }
        }

        match self.attempt(&slot, &owner, range, kind, NewRequest).await? {
            Attempt::Granted { downgraded } => {
                tracing::debug!(file = %file, %owner, %range, %kind, downgraded, "granted");
                Ok(LockOutcome::Granted)
            }
            Attempt::Conflict(blockers) if !blocking => {
                tracing::debug!(file = %file, %owner, %range, %kind, blockers = blockers.len(), "denied");
                Ok(LockOutcome::Denied(blockers))
            }
            Attempt::Conflict(_) => Ok(LockOutcome::Pending(self.park(slot, owner, range, kind))),
            Attempt::Cancelled(never) => match never {},
        }
    }

    fn park(&self, slot: FileRef, owner: LockOwner, range: LockRange, kind: LockType) -> PendingLock<K> {
        let entry = Arc::new(WaitEntry::new(self.inner.shutdown.child_token()));
        let handle = slot.state().waiters.insert(Parked {
            owner: owner.clone(),
            range,
            kind,
            entry: Arc::clone(&entry),
        });
        let token = WaitToken {
            file: slot.id().clone(),
            handle,
        };
        tracing::debug!(%token, %owner, %range, %kind, "parked");
        PendingLock {
            coordinator: self.clone(),
            slot,
            token,
            entry,
            owner,
            range,
            kind,
        }
    }

    /// Evaluate, mirror into the kernel, and commit one grant
    ///
    /// A claim on a parked request must still be parked at evaluation and
    /// at commit, and is unparked on success. A commit that finds the table
    /// or the claim changed restores the kernel over `range` from the
    /// current table.
    async fn attempt<C: Claim>(
        &self,
        slot: &FileSlot,
        owner: &LockOwner,
        range: LockRange,
        kind: LockType,
        claim: C,
    ) -> Result<Attempt<C::Lost>, LockError> {
        let file = slot.id();
        let _gate = slot.gate().await;

        loop {
            let (candidate, generation, downgraded) = {
                let state = slot.state();
                if let Some(lost) = claim.lost(&state.waiters) {
                    return Ok(Attempt::Cancelled(lost));
                }
                let downgraded = match resolve(&state.table, owner, range, kind) {
                    Resolution::Invalid(e) => return Err(e.into()),
                    Resolution::Conflict(blockers) => return Ok(Attempt::Conflict(blockers)),
                    Resolution::Grant | Resolution::Upgrade { .. } => false,
                    Resolution::Downgrade { .. } => true,
                };

                let mut candidate = state.table.clone();
                match candidate.insert(owner.clone(), range, kind) {
                    Ok(_) => {}
                    Err(InsertError::Conflict(blockers)) => return Ok(Attempt::Conflict(blockers)),
                    Err(InsertError::Invalid(e)) => return Err(e.into()),
                    Err(InsertError::Invariant(violation)) => {
                        tracing::error!(file = %file, %owner, %range, %kind, %violation, "rejected broken lock table");
                        return Err(violation.into());
                    }
                }
                (candidate, state.generation, downgraded)
            };

            let delta = KernelDelta::Granted { range, kind };
            if let Err(e) = self.inner.kernel.apply(file, &delta).await {
                tracing::warn!(file = %file, %owner, %range, error = %e, "kernel refused grant");
                return Err(e.into());
            }

            let abandoned = {
                let mut state = slot.state();
                let lost = claim.lost(&state.waiters);
                if lost.is_some() || state.generation != generation {
                    Some((lost, state.table.clone()))
                } else {
                    claim.settle(&mut state.waiters);
                    state.table = candidate;
                    state.generation += 1;
                    if downgraded {
                        state.waiters.wake_all();
                    }
                    None
                }
            };

            let Some((lost, table)) = abandoned else {
                return Ok(Attempt::Granted { downgraded });
            };
            tracing::debug!(file = %file, %range, cancelled = lost.is_some(), "grant abandoned at commit");
            if let Err(e) = self.inner.kernel.restore(file, range, &table).await {
                tracing::warn!(file = %file, %range, error = %e, "kernel restore failed");
            }
            if let Some(lost) = lost {
                return Ok(Attempt::Cancelled(lost));
            }
        }
    }

    /// UNLOCK: drop `owner`'s locks over `range`
    ///
    /// The owner's parked requests overlapping the range are cancelled
    /// first. Only bytes no other owner still covers are released in the
    /// kernel; a failed release is reported as divergence.
    pub async fn unlock(
        &self,
        file: &FileId,
        owner: &LockOwner,
        range: LockRange,
    ) -> Result<UnlockResult, LockError> {
        range.validate()?;
        let Some(slot) = self.inner.registry.get(file) else {
            return Ok(UnlockResult::default());
        };
        let _gate = slot.gate().await;

        let (plan, cancelled) = {
            let mut state = slot.state();
            let cancelled: Vec<WaitToken> = state
                .waiters
                .cancel_overlapping(owner, &range)
                .into_iter()
                .map(|handle| WaitToken {
                    file: file.clone(),
                    handle,
                })
                .collect();

            let own = state.table.remove(owner, range);
            if own.is_empty() {
                if !cancelled.is_empty() {
                    state.waiters.wake_all();
                }
                return Ok(UnlockResult {
                    plan: own,
                    cancelled,
                    divergence: None,
                });
            }
            let plan = own.netted(&state.table.project_remove(range));
            state.generation += 1;
            (plan, cancelled)
        };
        tracing::debug!(
            file = %file,
            %owner,
            %range,
            removed = plan.removed.len(),
            release = plan.release.len(),
            "unlocked"
        );

        let mut divergence = None;
        if plan.needs_release() {
            let delta = KernelDelta::Unlocked(plan.clone());
            if let Err(e) = self.inner.kernel.apply(file, &delta).await {
                tracing::warn!(file = %file, %range, error = %e, "kernel release failed, keeping table");
                divergence = Some(e);
            }
        }

        slot.state().waiters.wake_all();
        Ok(UnlockResult {
            plan,
            cancelled,
            divergence,
        })
    }

    /// TEST: entries of any owner that would block `kind` over `range`
    pub fn test(
        &self,
        file: &FileId,
        range: LockRange,
        kind: LockType,
    ) -> Result<Vec<LockEntry>, LockError> {
        self.conflicts(file, None, range, kind)
    }

    /// TEST as NLM does it: the asking owner's own entries never conflict
    pub fn test_for(
        &self,
        file: &FileId,
        owner: &LockOwner,
        range: LockRange,
        kind: LockType,
    ) -> Result<Vec<LockEntry>, LockError> {
        self.conflicts(file, Some(owner), range, kind)
    }

    fn conflicts(
        &self,
        file: &FileId,
        owner: Option<&LockOwner>,
        range: LockRange,
        kind: LockType,
    ) -> Result<Vec<LockEntry>, LockError> {
        range.validate()?;
        let Some(slot) = self.inner.registry.get(file) else {
            return Ok(Vec::new());
        };
        let blockers = slot.state().table.conflicts(range, kind, owner);
        Ok(blockers)
    }

    /// CANCEL: unpark a request; false if it is no longer parked
    pub fn cancel(&self, token: &WaitToken) -> bool {
        let Some(slot) = self.inner.registry.get(&token.file) else {
            return false;
        };
        let cancelled = cancel_parked(&slot, token.handle);
        if cancelled {
            tracing::debug!(%token, "cancelled");
        }
        cancelled
    }

    /// CANCEL identified by lock description rather than token
    pub fn cancel_matching(
        &self,
        file: &FileId,
        owner: &LockOwner,
        range: LockRange,
        kind: LockType,
    ) -> bool {
        let Some(slot) = self.inner.registry.get(file) else {
            return false;
        };
        let handle = slot.state().waiters.find_duplicate(owner, range, kind);
        handle.is_some_and(|h| cancel_parked(&slot, h))
    }

    /// Drop every lock and parked request of `owner` on every file
    pub async fn release_owner(
        &self,
        owner: &LockOwner,
    ) -> Result<Vec<(FileId, UnlockResult)>, LockError> {
        let mut released = Vec::new();
        for file in self.inner.registry.files() {
            let result = self.unlock(&file, owner, LockRange::whole_file()).await?;
            if !result.is_empty() {
                released.push((file, result));
            }
        }
        tracing::info!(%owner, files = released.len(), "released owner");
        Ok(released)
    }

    /// Whether `token` is still parked
    pub fn status(&self, token: &WaitToken) -> Option<RequestState> {
        let slot = self.inner.registry.get(&token.file)?;
        let parked = slot.state().waiters.contains(token.handle);
        parked.then_some(RequestState::Pending)
    }

    /// Granted entries of `file`, sorted by start offset
    pub fn entries(&self, file: &FileId) -> Vec<LockEntry> {
        match self.inner.registry.get(file) {
            Some(slot) => slot.state().table.entries().to_vec(),
            None => Vec::new(),
        }
    }

    /// Parked requests of `file` in wait-list order
    pub fn parked(&self, file: &FileId) -> Vec<ParkedRequest> {
        let Some(slot) = self.inner.registry.get(file) else {
            return Vec::new();
        };
        let state = slot.state();
        state
            .waiters
            .iter()
            .map(|(handle, p)| ParkedRequest {
                token: WaitToken {
                    file: file.clone(),
                    handle,
                },
                owner: p.owner.clone(),
                range: p.range,
                kind: p.kind,
            })
            .collect()
    }

    /// Files currently tracked
    pub fn files(&self) -> Vec<FileId> {
        self.inner.registry.files()
    }

    /// Cancel every parked request, now and in future
    pub fn shutdown(&self) -> usize {
        self.inner.shutdown.cancel();
        let mut cancelled = 0;
        for file in self.inner.registry.files() {
            if let Some(slot) = self.inner.registry.get(&file) {
                cancelled += slot.state().waiters.cancel_all().len();
            }
        }
        tracing::info!(cancelled, "coordinator shut down");
        cancelled
    }
}

fn cancel_parked(slot: &FileSlot, handle: WaitHandle) -> bool {
    let mut state = slot.state();
    match state.waiters.remove(handle) {
        Some(parked) => {
            parked.entry.cancel();
            state.waiters.wake_all();
            true
        }
        None => false,
    }
}

/// Handle to a parked blocking request
///
/// Dropping it without waiting cancels the request.
pub struct PendingLock<K: KernelLockAdapter> {
    coordinator: LockCoordinator<K>,
    slot: FileRef,
    token: WaitToken,
    entry: Arc<WaitEntry>,
    owner: LockOwner,
    range: LockRange,
    kind: LockType,
}

impl<K: KernelLockAdapter> PendingLock<K> {
    pub fn token(&self) -> &WaitToken {
        &self.token
    }

    /// `Pending` while parked, `Cancelled` once someone unparked it
    pub fn state(&self) -> RequestState {
        if self.slot.state().waiters.contains(self.token.handle) {
            RequestState::Pending
        } else {
            RequestState::Cancelled
        }
    }

    /// Suspend until granted, cancelled, or `timeout` expires
    ///
    /// Every wake re-evaluates the request from scratch. Expiry cancels it.
    pub async fn wait(self, timeout: Option<Duration>) -> Result<WaitOutcome, LockError> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let inner = Arc::clone(&self.coordinator.inner);

        loop {
            if self.entry.is_cancelled() {
                return Ok(WaitOutcome::Cancelled);
            }

            let attempt = self
                .coordinator
                .attempt(
                    &self.slot,
                    &self.owner,
                    self.range,
                    self.kind,
                    self.token.handle,
                )
                .await?;
            match attempt {
                Attempt::Granted { .. } => {
                    tracing::debug!(token = %self.token, owner = %self.owner, range = %self.range, "granted after wait");
                    return Ok(WaitOutcome::Granted);
                }
                Attempt::Cancelled(()) => return Ok(WaitOutcome::Cancelled),
                Attempt::Conflict(_) => {}
            }

            let suspension = inner.hooks.before_sleep(&self.token).map_err(|message| {
                tracing::warn!(token = %self.token, %message, "sleep hook contract violated");
                LockError::HookContract(message)
            })?;
            let woke = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, self.entry.sleep())
                    .await
                    .is_ok(),
                None => {
                    self.entry.sleep().await;
                    true
                }
            };
            inner.hooks.after_sleep(&self.token, suspension);

            if !woke {
                tracing::debug!(token = %self.token, "wait timed out");
                return Ok(WaitOutcome::TimedOut);
            }
        }
    }

    /// Cancel explicitly; false if it was already unparked
    pub fn cancel(self) -> bool {
        cancel_parked(&self.slot, self.token.handle)
    }
}

impl<K: KernelLockAdapter> Drop for PendingLock<K> {
    fn drop(&mut self) {
        if cancel_parked(&self.slot, self.token.handle) {
            tracing::debug!(token = %self.token, "pending lock dropped, cancelled");
        }
    }
}

impl<K: KernelLockAdapter> fmt::Debug for PendingLock<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLock")
            .field("token", &self.token)
            .field("owner", &self.owner)
            .field("range", &self.range)
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
