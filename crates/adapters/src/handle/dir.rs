// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handles for files under a root directory

use super::{HandleError, HandleProvider};
use brl_core::FileId;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Opens file ids as relative paths under `root` and caches the handles
#[derive(Clone, Debug)]
pub struct DirHandleProvider {
    root: PathBuf,
    open: Arc<Mutex<HashMap<FileId, Arc<File>>>>,
}

impl DirHandleProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open: Arc::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `file` under the root, rejecting ids that would escape it
    pub fn path_of(&self, file: &FileId) -> Result<PathBuf, HandleError> {
        let rel = Path::new(file.as_str());
        let plain = !file.as_str().is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !plain {
            return Err(HandleError::InvalidName(file.as_str().to_string()));
        }
        Ok(self.root.join(rel))
    }

    /// Number of cached handles
    pub fn open_count(&self) -> usize {
        self.open.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl HandleProvider for DirHandleProvider {
    fn handle(&self, file: &FileId) -> Result<Arc<File>, HandleError> {
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = open.get(file) {
            return Ok(Arc::clone(handle));
        }

        let path = self.path_of(file)?;
        // Write access is needed for F_WRLCK
        let handle = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| HandleError::Open {
                file: file.clone(),
                message: e.to_string(),
            })?;
        let handle = Arc::new(handle);
        open.insert(file.clone(), Arc::clone(&handle));
        tracing::debug!(file = %file, path = %path.display(), "opened lock handle");
        Ok(handle)
    }

    fn close(&self, file: &FileId) {
        let closed = self
            .open
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(file)
            .is_some();
        if closed {
            tracing::debug!(file = %file, "closed lock handle");
        }
    }
}

#[cfg(test)]
#[path = "dir_tests.rs"]
mod tests;
