// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock owner and file identities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol family a lock owner belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Nlm,
    Nfs4,
    NineP,
    /// Owners created by local tooling
    Local,
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OwnerKind::Nlm => "nlm",
            OwnerKind::Nfs4 => "nfs4",
            OwnerKind::NineP => "9p",
            OwnerKind::Local => "local",
        };
        f.write_str(name)
    }
}

/// Identity of an independent lock holder
///
/// Two owners are the same holder only if every field matches. Owners are
/// compared for equality and hashed, never ordered.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockOwner {
    pub kind: OwnerKind,
    /// Client identity (host name, client id)
    pub client: String,
    /// Process id (NLM svid) or session/sequence identity
    pub process: u64,
    /// Opaque owner handle supplied by the client
    #[serde(default)]
    pub cookie: Vec<u8>,
}

impl LockOwner {
    pub fn new(kind: OwnerKind, client: impl Into<String>, process: u64) -> Self {
        Self {
            kind,
            client: client.into(),
            process,
            cookie: Vec::new(),
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<Vec<u8>>) -> Self {
        self.cookie = cookie.into();
        self
    }

    /// Owner used by local tools and tests
    pub fn local(client: impl Into<String>, process: u64) -> Self {
        Self::new(OwnerKind::Local, client, process)
    }

    /// True if both owners come from the same client
    pub fn same_client(&self, other: &LockOwner) -> bool {
        self.kind == other.kind && self.client == other.client
    }
}

impl fmt::Display for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.kind, self.client, self.process)?;
        if !self.cookie.is_empty() {
            f.write_str("#")?;
            for byte in &self.cookie {
                write!(f, "{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

/// Identity of a locked file as handed over by the protocol layer
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[path = "owner_tests.rs"]
mod tests;
