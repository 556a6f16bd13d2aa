// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File handle providers for kernel lock adapters

mod dir;

pub use dir::DirHandleProvider;

use brl_core::FileId;
use std::fs::File;
use std::sync::Arc;
use thiserror::Error;

/// Errors from resolving a file handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("file id {0:?} does not name a file under the lock root")]
    InvalidName(String),
    #[error("cannot open {file}: {message}")]
    Open { file: FileId, message: String },
}

/// Supplies the open file a kernel lock is taken through
///
/// One description per file: handing out a fresh one per call would make
/// the kernel see every call as a different lock holder.
pub trait HandleProvider: Clone + Send + Sync + 'static {
    fn handle(&self, file: &FileId) -> Result<Arc<File>, HandleError>;

    /// Close the cached handle, dropping any kernel locks held through it
    fn close(&self, file: &FileId);
}
