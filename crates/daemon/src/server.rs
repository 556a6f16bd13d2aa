// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and request dispatch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use brl_adapters::KernelLockAdapter;
use brl_core::FileId;
use brl_daemon::config::DEFAULT_WAIT_RETENTION;
use brl_daemon::protocol::{
    self, FileEntries, ParkedSummary, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION,
};
use brl_engine::{
    LockCoordinator, LockError, LockOutcome, LockRequest, PendingLock, RequestState, WaitOutcome,
    WaitToken,
};
use tokio::net::UnixStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WaitRecords = Arc<Mutex<HashMap<WaitToken, watch::Receiver<RequestState>>>>;

/// Lock service shared by every connection
pub struct Server<K: KernelLockAdapter> {
    coordinator: LockCoordinator<K>,
    /// Requests driven by the daemon, keyed by token, until their outcome expires
    waits: WaitRecords,
    wait_timeout: Option<Duration>,
    retention: Duration,
    start_time: Instant,
    shutdown: CancellationToken,
}

impl<K: KernelLockAdapter> Server<K> {
    pub fn new(coordinator: LockCoordinator<K>, wait_timeout: Option<Duration>) -> Self {
        Self {
            coordinator,
            waits: Arc::new(Mutex::new(HashMap::new())),
            wait_timeout,
            retention: DEFAULT_WAIT_RETENTION,
            start_time: Instant::now(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Keep a finished request's outcome for `retention` before dropping it
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Daemon-driven requests whose record has not expired yet
    pub fn wait_records(&self) -> usize {
        self.waits().len()
    }

    /// Cancelled once a client asks the daemon to stop
    pub fn shutdown_requested(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn coordinator(&self) -> &LockCoordinator<K> {
        &self.coordinator
    }

    fn waits(&self) -> MutexGuard<'_, HashMap<WaitToken, watch::Receiver<RequestState>>> {
        lock_records(&self.waits)
    }

    /// Handle a single request and return a response
    pub async fn handle_request(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::Hello { version: _ } => Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
            },

            Request::Lock {
                file,
                owner,
                range,
                kind,
                blocking,
            } => {
                let mut request = LockRequest::new(file, owner, range, kind);
                request.blocking = blocking;
                match self.coordinator.lock(request).await {
                    Ok(LockOutcome::Granted) => Response::Granted,
                    Ok(LockOutcome::Denied(blockers)) => Response::Denied { blockers },
                    Ok(LockOutcome::Pending(pending)) => Response::Pending {
                        token: self.drive(pending),
                    },
                    Ok(LockOutcome::AlreadyPending(token)) => Response::AlreadyPending { token },
                    Err(e) => error_response(e),
                }
            }

            Request::Unlock { file, owner, range } => {
                match self.coordinator.unlock(&FileId::new(file), &owner, range).await {
                    Ok(result) => Response::Unlocked {
                        release: result.plan.release,
                        retained: result.plan.retained,
                        cancelled: result.cancelled,
                        divergence: result.divergence.map(|e| e.to_string()),
                    },
                    Err(e) => error_response(e),
                }
            }

            Request::Test {
                file,
                range,
                kind,
                owner,
            } => {
                let file = FileId::new(file);
                let result = match &owner {
                    Some(owner) => self.coordinator.test_for(&file, owner, range, kind),
                    None => self.coordinator.test(&file, range, kind),
                };
                match result {
                    Ok(blockers) => Response::Conflicts { blockers },
                    Err(e) => error_response(e),
                }
            }

            Request::Cancel { token } => Response::Cancelled {
                cancelled: self.coordinator.cancel(&token),
            },

            Request::CancelMatching {
                file,
                owner,
                range,
                kind,
            } => Response::Cancelled {
                cancelled: self
                    .coordinator
                    .cancel_matching(&FileId::new(file), &owner, range, kind),
            },

            Request::ReleaseOwner { owner } => match self.coordinator.release_owner(&owner).await {
                Ok(released) => Response::Released {
                    files: released.into_iter().map(|(f, _)| f.0).collect(),
                },
                Err(e) => error_response(e),
            },

            Request::Wait { token, timeout_ms } => Response::Waited {
                state: self
                    .wait(&token, timeout_ms.map(Duration::from_millis))
                    .await,
            },

            Request::Entries { file } => {
                let files = match file {
                    Some(file) => vec![FileId::new(file)],
                    None => self.coordinator.files(),
                };
                Response::Entries {
                    files: files
                        .into_iter()
                        .map(|file| FileEntries {
                            entries: self.coordinator.entries(&file),
                            parked: self
                                .coordinator
                                .parked(&file)
                                .into_iter()
                                .map(ParkedSummary::from)
                                .collect(),
                            file: file.0,
                        })
                        .collect(),
                }
            }

            Request::Status => {
                let files = self.coordinator.files();
                let (entries, parked) = files.iter().fold((0, 0), |(e, p), file| {
                    (
                        e + self.coordinator.entries(file).len(),
                        p + self.coordinator.parked(file).len(),
                    )
                });
                Response::Status {
                    uptime_secs: self.start_time.elapsed().as_secs(),
                    files: files.len(),
                    entries,
                    parked,
                }
            }

            Request::Shutdown => {
                self.shutdown.cancel();
                Response::ShuttingDown
            }
        }
    }

    /// Wait for a parked request in the background and record how it ends
    ///
    /// The record outlives the request by the retention period whether or
    /// not a client ever asks for it.
    fn drive(&self, pending: PendingLock<K>) -> WaitToken {
        let token = pending.token().clone();
        let (tx, rx) = watch::channel(RequestState::Pending);
        self.waits().insert(token.clone(), rx);

        let timeout = self.wait_timeout;
        let retention = self.retention;
        let records = Arc::clone(&self.waits);
        let task_token = token.clone();
        tokio::spawn(async move {
            let state = match pending.wait(timeout).await {
                Ok(WaitOutcome::Granted) => {
                    info!(token = %task_token, "parked lock granted");
                    RequestState::Granted
                }
                Ok(outcome) => {
                    debug!(token = %task_token, ?outcome, "parked lock ended");
                    outcome.state()
                }
                Err(e) => {
                    warn!(token = %task_token, error = %e, "parked lock failed");
                    RequestState::Cancelled
                }
            };
            let _ = tx.send(state);

            tokio::time::sleep(retention).await;
            if lock_records(&records).remove(&task_token).is_some() {
                debug!(token = %task_token, "expired wait record");
            }
        });
        token
    }

    /// State of a daemon-driven request once terminal or after `timeout`
    ///
    /// A terminal state is reported once; the record is then dropped.
    async fn wait(&self, token: &WaitToken, timeout: Option<Duration>) -> RequestState {
        let Some(mut rx) = self.waits().get(token).cloned() else {
            return RequestState::Cancelled;
        };
        let finished = async {
            match rx.wait_for(|s| s.is_terminal()).await {
                Ok(state) => *state,
                // Sender gone without a verdict
                Err(_) => RequestState::Cancelled,
            }
        };
        let state = match timeout {
            Some(t) => tokio::time::timeout(t, finished)
                .await
                .unwrap_or(RequestState::Pending),
            None => finished.await,
        };
        if state.is_terminal() {
            self.waits().remove(token);
        }
        state
    }
}

fn lock_records(
    records: &WaitRecords,
) -> MutexGuard<'_, HashMap<WaitToken, watch::Receiver<RequestState>>> {
    records.lock().unwrap_or_else(|e| e.into_inner())
}

fn error_response(e: LockError) -> Response {
    Response::Error {
        message: e.to_string(),
    }
}

/// Handle a single client connection
pub async fn handle_connection<K: KernelLockAdapter>(
    server: Arc<Server<K>>,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    let response = server.handle_request(request).await;

    debug!("Sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
