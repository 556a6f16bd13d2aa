// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Byte-range lock daemon: configuration and wire protocol shared with `brl`

pub mod config;
pub mod protocol;

pub use config::{Config, ConfigError, KernelMode};
pub use protocol::{FileEntries, ParkedSummary, ProtocolError, Request, Response};
