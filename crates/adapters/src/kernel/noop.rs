// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op kernel adapter for when kernel locks are disabled.

use super::{KernelError, KernelLockAdapter};
use async_trait::async_trait;
use brl_core::{FileId, LockRange, LockType};

/// Kernel adapter that does nothing.
///
/// Used when only advisory bookkeeping is wanted, or on platforms without
/// open file description locks.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpKernelAdapter;

impl NoOpKernelAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl KernelLockAdapter for NoOpKernelAdapter {
    async fn acquire(
        &self,
        _file: &FileId,
        _range: LockRange,
        _kind: LockType,
    ) -> Result<(), KernelError> {
        Ok(())
    }

    async fn release(&self, _file: &FileId, _range: LockRange) -> Result<(), KernelError> {
        Ok(())
    }
}
