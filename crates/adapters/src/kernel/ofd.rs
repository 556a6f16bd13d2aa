// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Open file description locks (Linux `F_OFD_SETLK`)
//!
//! OFD locks belong to the open file description rather than the process,
//! so every file is locked through the single descriptor its
//! [`HandleProvider`] hands out. Locks taken through one description merge
//! and convert like the coordinator's union coverage does.

use super::{KernelError, KernelLockAdapter};
use crate::handle::HandleProvider;
use async_trait::async_trait;
use brl_core::{FileId, LockRange, LockType, RangeEnd};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg};
use nix::libc;

/// Kernel adapter backed by non-blocking OFD locks
#[derive(Clone)]
pub struct OfdKernelAdapter<H> {
    handles: H,
}

impl<H: HandleProvider> OfdKernelAdapter<H> {
    pub fn new(handles: H) -> Self {
        Self { handles }
    }

    fn set_lock(
        &self,
        file: &FileId,
        range: LockRange,
        lock_type: libc::c_short,
    ) -> Result<(), KernelError> {
        let handle = self.handles.handle(file)?;
        let (l_start, l_len) = flock_span(range)?;
        let lock = libc::flock {
            l_type: lock_type,
            l_whence: libc::SEEK_SET as libc::c_short,
            l_start,
            l_len,
            // Must be zero for OFD locks
            l_pid: 0,
        };

        match fcntl(&*handle, FcntlArg::F_OFD_SETLK(&lock)) {
            Ok(_) => Ok(()),
            Err(Errno::EAGAIN) | Err(Errno::EACCES) => Err(KernelError::Contended {
                file: file.clone(),
                range,
            }),
            Err(e) => Err(KernelError::Io(e.desc().to_string())),
        }
    }
}

/// `(l_start, l_len)` for a range, zero length meaning to end of file
fn flock_span(range: LockRange) -> Result<(libc::off_t, libc::off_t), KernelError> {
    let too_large = || KernelError::RangeTooLarge(range);
    let start = libc::off_t::try_from(range.start).map_err(|_| too_large())?;
    let len = match range.end {
        RangeEnd::Eof => 0,
        RangeEnd::Offset(end) => {
            libc::off_t::try_from(end.saturating_sub(range.start)).map_err(|_| too_large())?
        }
    };
    Ok((start, len))
}

#[async_trait]
impl<H: HandleProvider> KernelLockAdapter for OfdKernelAdapter<H> {
    async fn acquire(
        &self,
        file: &FileId,
        range: LockRange,
        kind: LockType,
    ) -> Result<(), KernelError> {
        let lock_type = match kind {
            LockType::Read => libc::F_RDLCK,
            LockType::Write => libc::F_WRLCK,
        };
        self.set_lock(file, range, lock_type as libc::c_short)
    }

    async fn release(&self, file: &FileId, range: LockRange) -> Result<(), KernelError> {
        self.set_lock(file, range, libc::F_UNLCK as libc::c_short)
    }

    fn forget(&self, file: &FileId) {
        self.handles.close(file);
    }
}

#[cfg(test)]
#[path = "ofd_tests.rs"]
mod tests;
