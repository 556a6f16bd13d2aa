// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::kernel::{KernelError, KernelLockAdapter};
use async_trait::async_trait;
use brl_core::{FileId, LockRange, LockType};
use tracing::Instrument;

/// Wrapper that adds tracing to any KernelLockAdapter
#[derive(Clone)]
pub struct TracedKernelAdapter<K> {
    inner: K,
}

impl<K> TracedKernelAdapter<K> {
    pub fn new(inner: K) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &K {
        &self.inner
    }
}

#[async_trait]
impl<K: KernelLockAdapter> KernelLockAdapter for TracedKernelAdapter<K> {
    async fn acquire(
        &self,
        file: &FileId,
        range: LockRange,
        kind: LockType,
    ) -> Result<(), KernelError> {
        let span = tracing::info_span!("kernel.acquire", file = %file, %range, %kind);
        async {
            tracing::debug!("acquiring");

            let start = std::time::Instant::now();
            let result = self.inner.acquire(file, range, kind).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "acquired"),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "acquire failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn release(&self, file: &FileId, range: LockRange) -> Result<(), KernelError> {
        let span = tracing::info_span!("kernel.release", file = %file, %range);
        async {
            let result = self.inner.release(file, range).await;
            // The coordinator keeps its table either way; the kernel is then
            // stricter than the table until the next restore.
            match &result {
                Ok(()) => tracing::debug!("released"),
                Err(e) => tracing::warn!(error = %e, "release failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn forget(&self, file: &FileId) {
        tracing::trace!(file = %file, "forgetting kernel handle");
        self.inner.forget(file);
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
