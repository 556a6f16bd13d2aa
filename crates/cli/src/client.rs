// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::{Path, PathBuf};
use std::time::Duration;

use brl_core::{FileId, LockEntry, LockOwner, LockRange, LockType};
use brl_daemon::config::Config;
use brl_daemon::protocol::{self, ProtocolError};
use brl_daemon::{FileEntries, Request, Response};
use brl_engine::{RequestState, WaitToken};
use thiserror::Error;
use tokio::net::UnixStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("BRL_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running (no socket at {})", .0.display())]
    DaemonNotRunning(PathBuf),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a LOCK request as the console sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockReply {
    Granted,
    Denied(Vec<LockEntry>),
    Pending(WaitToken),
    AlreadyPending(WaitToken),
}

/// Socket to talk to: `--socket`, then `BRL_SOCKET`, then the daemon config
pub fn resolve_socket(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if let Some(path) = std::env::var_os("BRL_SOCKET") {
        return PathBuf::from(path);
    }
    Config::load(&Config::locate(None))
        .map(|c| c.socket_path)
        .unwrap_or_else(|_| Config::default().socket_path)
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to an existing daemon
    pub fn connect(socket_path: PathBuf) -> Result<Self, ClientError> {
        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning(socket_path));
        }
        Ok(Self { socket_path })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send a request and receive a response with specific timeouts
    async fn send_with_timeout(
        &self,
        request: Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
                    ClientError::DaemonNotRunning(self.socket_path.clone())
                }
                _ => ClientError::Io(e),
            })?;
        let (mut reader, mut writer) = stream.into_split();

        tracing::debug!(?request, "sending");
        let data = protocol::encode(&request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        let response: Response = protocol::decode(&response_bytes)?;
        tracing::debug!(?response, "received");
        Ok(response)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc(), timeout_ipc())
            .await
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn lock(
        &self,
        file: &FileId,
        owner: &LockOwner,
        range: LockRange,
        kind: LockType,
        blocking: bool,
    ) -> Result<LockReply, ClientError> {
        let request = Request::Lock {
            file: file.to_string(),
            owner: owner.clone(),
            range,
            kind,
            blocking,
        };
        match self.send(request).await? {
            Response::Granted => Ok(LockReply::Granted),
            Response::Denied { blockers } => Ok(LockReply::Denied(blockers)),
            Response::Pending { token } => Ok(LockReply::Pending(token)),
            Response::AlreadyPending { token } => Ok(LockReply::AlreadyPending(token)),
            other => Err(unexpected(other)),
        }
    }

    /// Unlock, returning the daemon's report unchanged
    pub async fn unlock(
        &self,
        file: &FileId,
        owner: &LockOwner,
        range: LockRange,
    ) -> Result<Response, ClientError> {
        let request = Request::Unlock {
            file: file.to_string(),
            owner: owner.clone(),
            range,
        };
        match self.send(request).await? {
            unlocked @ Response::Unlocked { .. } => Ok(unlocked),
            other => Err(unexpected(other)),
        }
    }

    pub async fn test(
        &self,
        file: &FileId,
        range: LockRange,
        kind: LockType,
        owner: Option<&LockOwner>,
    ) -> Result<Vec<LockEntry>, ClientError> {
        let request = Request::Test {
            file: file.to_string(),
            range,
            kind,
            owner: owner.cloned(),
        };
        match self.send(request).await? {
            Response::Conflicts { blockers } => Ok(blockers),
            other => Err(unexpected(other)),
        }
    }

    pub async fn cancel(&self, token: &WaitToken) -> Result<bool, ClientError> {
        let request = Request::Cancel {
            token: token.clone(),
        };
        match self.send(request).await? {
            Response::Cancelled { cancelled } => Ok(cancelled),
            other => Err(unexpected(other)),
        }
    }

    pub async fn cancel_matching(
        &self,
        file: &FileId,
        owner: &LockOwner,
        range: LockRange,
        kind: LockType,
    ) -> Result<bool, ClientError> {
        let request = Request::CancelMatching {
            file: file.to_string(),
            owner: owner.clone(),
            range,
            kind,
        };
        match self.send(request).await? {
            Response::Cancelled { cancelled } => Ok(cancelled),
            other => Err(unexpected(other)),
        }
    }

    /// Wait for a parked request; `Pending` means the timeout passed first
    pub async fn wait(
        &self,
        token: &WaitToken,
        timeout: Duration,
    ) -> Result<RequestState, ClientError> {
        let request = Request::Wait {
            token: token.clone(),
            timeout_ms: Some(timeout.as_millis() as u64),
        };
        // The daemon holds the reply for up to `timeout`
        match self
            .send_with_timeout(request, timeout + timeout_ipc(), timeout_ipc())
            .await?
        {
            Response::Waited { state } => Ok(state),
            other => Err(unexpected(other)),
        }
    }

    pub async fn release_owner(&self, owner: &LockOwner) -> Result<Vec<String>, ClientError> {
        let request = Request::ReleaseOwner {
            owner: owner.clone(),
        };
        match self.send(request).await? {
            Response::Released { files } => Ok(files),
            other => Err(unexpected(other)),
        }
    }

    pub async fn entries(&self, file: Option<&FileId>) -> Result<Vec<FileEntries>, ClientError> {
        let request = Request::Entries {
            file: file.map(|f| f.to_string()),
        };
        match self.send(request).await? {
            Response::Entries { files } => Ok(files),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<Response, ClientError> {
        match self.send(Request::Status).await? {
            status @ Response::Status { .. } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Error { message } => ClientError::Rejected(message),
        _ => ClientError::UnexpectedResponse,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
