// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the lock coordinator

use brl_adapters::KernelError;
use brl_core::{InvariantViolation, RangeError};
use thiserror::Error;

/// Errors that can occur while coordinating locks
///
/// A conflict is not an error: it comes back as a denied or pending outcome.
/// Unlocking or cancelling something that is not held succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("invalid range: {0}")]
    InvalidRange(#[from] RangeError),
    #[error("kernel sync failed: {0}")]
    KernelSyncFailed(#[from] KernelError),
    #[error(transparent)]
    InvariantViolation(#[from] InvariantViolation),
    #[error("sleep hook contract violated: {0}")]
    HookContract(String),
}
