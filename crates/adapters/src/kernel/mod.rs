// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kernel byte-range lock adapters
//!
//! The coordinator keeps one kernel lock per file covering the union of all
//! owners' granted ranges. Adapters only see that union: acquiring a range
//! replaces whatever type was held over it, releasing drops it.

mod noop;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod ofd;

pub use noop::NoOpKernelAdapter;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use ofd::OfdKernelAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeKernelAdapter, KernelCall};

use crate::handle::HandleError;
use async_trait::async_trait;
use brl_core::{FileId, LockRange, LockType};
use thiserror::Error;

/// Errors from kernel lock operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("range {range} of {file} is locked outside the coordinator")]
    Contended { file: FileId, range: LockRange },
    #[error("range {0} does not fit a kernel lock")]
    RangeTooLarge(LockRange),
    #[error(transparent)]
    Handle(#[from] HandleError),
    #[error("kernel lock call failed: {0}")]
    Io(String),
}

/// Adapter that mirrors granted coverage into kernel locks
#[async_trait]
pub trait KernelLockAdapter: Clone + Send + Sync + 'static {
    /// Hold `range` of `file` as `kind`, converting any type already held there
    async fn acquire(&self, file: &FileId, range: LockRange, kind: LockType)
        -> Result<(), KernelError>;

    /// Drop whatever is held over `range` of `file`
    async fn release(&self, file: &FileId, range: LockRange) -> Result<(), KernelError>;

    /// The coordinator no longer tracks `file`
    fn forget(&self, _file: &FileId) {}
}
