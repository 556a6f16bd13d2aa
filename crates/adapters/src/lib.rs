// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for kernel lock I/O

pub mod handle;
pub mod kernel;
pub mod traced;

pub use handle::{DirHandleProvider, HandleError, HandleProvider};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use kernel::OfdKernelAdapter;
pub use kernel::{KernelError, KernelLockAdapter, NoOpKernelAdapter};
pub use traced::TracedKernelAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use kernel::{FakeKernelAdapter, KernelCall};
