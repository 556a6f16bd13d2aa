// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! brl-core: byte-range lock tables
//!
//! This crate provides:
//! - Lock ranges with an end-of-file bound and the interval algebra over them
//! - The per-file table of granted locks and its invariants
//! - Conflict resolution and unlock planning
//!
//! Everything here is pure and synchronous; kernel calls and blocking waits
//! live in `brl-engine`.

pub mod entry;
pub mod file_state;
pub mod interval;
pub mod owner;
pub mod plan;
pub mod range;
pub mod resolver;

pub use entry::{LockEntry, LockType};
pub use file_state::{FileLockState, InsertError, Invariant, InvariantViolation};
pub use owner::{FileId, LockOwner, OwnerKind};
pub use plan::UnlockPlan;
pub use range::{LockRange, RangeEnd, RangeError};
pub use resolver::{resolve, Resolution};
