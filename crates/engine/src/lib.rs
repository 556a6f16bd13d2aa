// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Byte-range lock coordination engine

mod coordinator;
mod error;
pub mod kernel_sync;
pub mod registry;
pub mod wait;

pub use coordinator::{
    LockCoordinator, LockOutcome, LockRequest, ParkedRequest, PendingLock, UnlockResult,
    WaitOutcome,
};
pub use error::LockError;
pub use kernel_sync::{Direction, KernelDelta, KernelSync};
pub use registry::{FileRef, FileRegistry};
pub use wait::{
    RequestIds, RequestState, SleepHook, SleepHooks, SuspendMarker, TokenParseError, WaitHandle,
    WaitToken,
};
