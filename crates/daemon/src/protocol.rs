// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between `brl` and `brld`
//!
//! Each message is a 4-byte big-endian length followed by that many bytes of
//! JSON. One request and one response per connection.

use std::time::Duration;

use brl_core::{LockEntry, LockOwner, LockRange, LockType};
use brl_engine::{ParkedRequest, RequestState, WaitToken};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Version reported in the Hello handshake
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound on one encoded message
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Timeout for reading a request or writing a response
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Ping,

    Hello {
        version: String,
    },

    Lock {
        file: String,
        owner: LockOwner,
        range: LockRange,
        kind: LockType,
        #[serde(default)]
        blocking: bool,
    },

    Unlock {
        file: String,
        owner: LockOwner,
        range: LockRange,
    },

    /// Without an owner every entry counts; with one, that owner's are skipped
    Test {
        file: String,
        range: LockRange,
        kind: LockType,
        #[serde(default)]
        owner: Option<LockOwner>,
    },

    Cancel {
        token: WaitToken,
    },

    CancelMatching {
        file: String,
        owner: LockOwner,
        range: LockRange,
        kind: LockType,
    },

    ReleaseOwner {
        owner: LockOwner,
    },

    /// Wait up to `timeout_ms` for a parked request to finish
    Wait {
        token: WaitToken,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Granted and parked locks of one file, or of every file
    Entries {
        #[serde(default)]
        file: Option<String>,
    },

    Status,

    Shutdown,
}

/// Daemon response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Ok,

    Pong,

    Hello {
        version: String,
    },

    ShuttingDown,

    Granted,

    Denied {
        blockers: Vec<LockEntry>,
    },

    /// Blocking request parked; poll with Wait
    Pending {
        token: WaitToken,
    },

    AlreadyPending {
        token: WaitToken,
    },

    Unlocked {
        /// Ranges released in the kernel
        release: Vec<LockRange>,
        /// Ranges another owner still covers
        retained: Vec<LockRange>,
        /// The owner's parked requests that were cancelled
        cancelled: Vec<WaitToken>,
        /// Kernel release failure, if any
        #[serde(default)]
        divergence: Option<String>,
    },

    Conflicts {
        blockers: Vec<LockEntry>,
    },

    Cancelled {
        cancelled: bool,
    },

    Released {
        files: Vec<String>,
    },

    Waited {
        state: RequestState,
    },

    Entries {
        files: Vec<FileEntries>,
    },

    Status {
        uptime_secs: u64,
        files: usize,
        entries: usize,
        parked: usize,
    },

    Error {
        message: String,
    },
}

/// Locks held and requested on one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntries {
    pub file: String,
    pub entries: Vec<LockEntry>,
    pub parked: Vec<ParkedSummary>,
}

/// Wire form of a parked request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkedSummary {
    pub token: WaitToken,
    pub owner: LockOwner,
    pub range: LockRange,
    pub kind: LockType,
}

impl From<ParkedRequest> for ParkedSummary {
    fn from(p: ParkedRequest) -> Self {
        Self {
            token: p.token,
            owner: p.owner,
            range: p.range,
            kind: p.kind,
        }
    }
}

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Encode a message as JSON (no length prefix)
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

/// Decode a JSON message
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write a length-prefixed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a length-prefixed message
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

/// Read one request, bounded by `timeout`
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

/// Write one response, bounded by `timeout`
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
