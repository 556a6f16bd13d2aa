// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod daemon;
pub mod lock;

use brl_core::{LockOwner, LockRange, LockType, OwnerKind, RangeError};
use clap::ValueEnum;

/// Lock mode as spelled on the command line
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum Mode {
    #[default]
    Read,
    Write,
}

impl From<Mode> for LockType {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Read => LockType::Read,
            Mode::Write => LockType::Write,
        }
    }
}

/// Protocol family of the owner
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum Family {
    #[default]
    Local,
    Nlm,
    Nfs4,
    #[value(name = "9p")]
    NineP,
}

impl From<Family> for OwnerKind {
    fn from(family: Family) -> Self {
        match family {
            Family::Local => OwnerKind::Local,
            Family::Nlm => OwnerKind::Nlm,
            Family::Nfs4 => OwnerKind::Nfs4,
            Family::NineP => OwnerKind::NineP,
        }
    }
}

/// Who is asking
#[derive(clap::Args, Debug, Clone)]
pub struct OwnerArgs {
    /// Client identity of the lock owner
    #[arg(long, global = true, env = "BRL_CLIENT", default_value = "brl")]
    pub client: String,

    /// Process or session id of the lock owner
    #[arg(long, global = true, default_value_t = 0)]
    pub process: u64,

    /// Protocol family of the lock owner
    #[arg(long, global = true, value_enum, default_value_t = Family::Local)]
    pub family: Family,
}

impl OwnerArgs {
    pub fn owner(&self) -> LockOwner {
        LockOwner::new(self.family.into(), self.client.clone(), self.process)
    }
}

/// File and byte range of a lock
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// File id, relative to the daemon's export root
    pub file: String,

    /// First byte of the range
    #[arg(default_value_t = 0)]
    pub offset: u64,

    /// Number of bytes; 0 means to end of file
    #[arg(default_value_t = 0)]
    pub length: u64,
}

impl TargetArgs {
    pub fn range(&self) -> Result<LockRange, RangeError> {
        LockRange::from_length(self.offset, self.length)
    }
}
