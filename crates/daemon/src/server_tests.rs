// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use brl_adapters::FakeKernelAdapter;
use brl_core::{LockOwner, LockRange, LockType, RangeEnd};

fn server() -> Server<FakeKernelAdapter> {
    Server::new(LockCoordinator::new(FakeKernelAdapter::new()), None)
}

fn r(start: u64, end: u64) -> LockRange {
    LockRange::new(start, RangeEnd::Offset(end))
}

fn lock(who: &str, range: LockRange, kind: LockType, blocking: bool) -> Request {
    Request::Lock {
        file: "data.db".to_string(),
        owner: LockOwner::local(who, 1),
        range,
        kind,
        blocking,
    }
}

fn unlock(who: &str, range: LockRange) -> Request {
    Request::Unlock {
        file: "data.db".to_string(),
        owner: LockOwner::local(who, 1),
        range,
    }
}

fn wait(token: &WaitToken, timeout_ms: u64) -> Request {
    Request::Wait {
        token: token.clone(),
        timeout_ms: Some(timeout_ms),
    }
}

async fn park(server: &Server<FakeKernelAdapter>, request: Request) -> WaitToken {
    match server.handle_request(request).await {
        Response::Pending { token } => token,
        other => panic!("expected Pending, got {:?}", other),
    }
}

#[tokio::test]
async fn ping_and_hello() {
    let server = server();
    assert_eq!(server.handle_request(Request::Ping).await, Response::Pong);
    assert_eq!(
        server
            .handle_request(Request::Hello {
                version: "0".to_string()
            })
            .await,
        Response::Hello {
            version: PROTOCOL_VERSION.to_string()
        }
    );
}

#[tokio::test]
async fn conflicting_non_blocking_lock_is_denied() {
    let server = server();
    assert_eq!(
        server.handle_request(lock("a", r(0, 10), LockType::Write, false)).await,
        Response::Granted
    );
    match server.handle_request(lock("b", r(5, 6), LockType::Read, false)).await {
        Response::Denied { blockers } => assert_eq!(blockers.len(), 1),
        other => panic!("expected Denied, got {:?}", other),
    }
}

#[tokio::test]
async fn invalid_range_is_an_error_response() {
    let server = server();
    let response = server.handle_request(lock("a", r(7, 7), LockType::Read, false)).await;
    assert!(matches!(response, Response::Error { .. }), "{:?}", response);
}

#[tokio::test]
async fn parked_lock_is_granted_after_unlock() {
    let server = server();
    server.handle_request(lock("a", r(0, 10), LockType::Write, false)).await;
    let token = park(&server, lock("b", r(0, 10), LockType::Write, true)).await;

    assert_eq!(
        server.handle_request(wait(&token, 20)).await,
        Response::Waited {
            state: RequestState::Pending
        }
    );
    assert_eq!(
        server.handle_request(lock("b", r(0, 10), LockType::Write, true)).await,
        Response::AlreadyPending {
            token: token.clone()
        }
    );

    server.handle_request(unlock("a", r(0, 10))).await;
    assert_eq!(
        server.handle_request(wait(&token, 5_000)).await,
        Response::Waited {
            state: RequestState::Granted
        }
    );
    assert_eq!(
        server.coordinator().entries(&FileId::new("data.db")).len(),
        1
    );
}

#[tokio::test]
async fn cancel_ends_a_parked_lock() {
    let server = server();
    server.handle_request(lock("a", r(0, 10), LockType::Write, false)).await;
    let token = park(&server, lock("b", r(0, 10), LockType::Read, true)).await;

    assert_eq!(
        server
            .handle_request(Request::Cancel {
                token: token.clone()
            })
            .await,
        Response::Cancelled { cancelled: true }
    );
    assert_eq!(
        server.handle_request(wait(&token, 5_000)).await,
        Response::Waited {
            state: RequestState::Cancelled
        }
    );
}

#[tokio::test]
async fn daemon_wait_timeout_cancels() {
    let server = Server::new(
        LockCoordinator::new(FakeKernelAdapter::new()),
        Some(Duration::from_millis(20)),
    );
    server.handle_request(lock("a", r(0, 10), LockType::Write, false)).await;
    let token = park(&server, lock("b", r(0, 10), LockType::Read, true)).await;

    assert_eq!(
        server.handle_request(wait(&token, 5_000)).await,
        Response::Waited {
            state: RequestState::Cancelled
        }
    );
    assert!(server.coordinator().parked(&FileId::new("data.db")).is_empty());
}

#[tokio::test]
async fn finished_requests_expire_without_a_wait() {
    let server = server().with_retention(Duration::from_millis(20));
    for _ in 0..10 {
        server.handle_request(lock("a", r(0, 10), LockType::Write, false)).await;
        park(&server, lock("b", r(0, 10), LockType::Write, true)).await;
        server.handle_request(unlock("b", r(0, 10))).await;
        server.handle_request(unlock("a", r(0, 10))).await;
    }
    assert!(server.coordinator().parked(&FileId::new("data.db")).is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.wait_records(), 0);
}

#[tokio::test]
async fn granted_outcome_is_kept_for_the_retention_period() {
    let server = server().with_retention(Duration::from_secs(30));
    server.handle_request(lock("a", r(0, 10), LockType::Write, false)).await;
    let token = park(&server, lock("b", r(0, 10), LockType::Write, true)).await;
    server.handle_request(unlock("a", r(0, 10))).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.wait_records(), 1);
    assert_eq!(
        server.handle_request(wait(&token, 1_000)).await,
        Response::Waited {
            state: RequestState::Granted
        }
    );
    assert_eq!(server.wait_records(), 0);
}

#[tokio::test]
async fn unlock_reports_netted_plan() {
    let server = server();
    server.handle_request(lock("a", r(0, 100), LockType::Read, false)).await;
    server.handle_request(lock("b", r(50, 150), LockType::Read, false)).await;

    match server.handle_request(unlock("a", r(0, 100))).await {
        Response::Unlocked {
            release,
            retained,
            divergence,
            ..
        } => {
            assert_eq!(release, vec![r(0, 50)]);
            assert_eq!(retained, vec![r(50, 100)]);
            assert_eq!(divergence, None);
        }
        other => panic!("expected Unlocked, got {:?}", other),
    }
}

#[tokio::test]
async fn test_with_owner_skips_own_entries() {
    let server = server();
    server.handle_request(lock("a", r(0, 10), LockType::Write, false)).await;

    let test = |owner: Option<LockOwner>| Request::Test {
        file: "data.db".to_string(),
        range: r(0, 10),
        kind: LockType::Write,
        owner,
    };
    match server.handle_request(test(None)).await {
        Response::Conflicts { blockers } => assert_eq!(blockers.len(), 1),
        other => panic!("expected Conflicts, got {:?}", other),
    }
    assert_eq!(
        server
            .handle_request(test(Some(LockOwner::local("a", 1))))
            .await,
        Response::Conflicts {
            blockers: Vec::new()
        }
    );
}

#[tokio::test]
async fn entries_status_and_release_owner() {
    let server = server();
    server.handle_request(lock("a", r(0, 10), LockType::Write, false)).await;
    let _token = park(&server, lock("b", r(0, 10), LockType::Read, true)).await;

    match server.handle_request(Request::Entries { file: None }).await {
        Response::Entries { files } => {
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].file, "data.db");
            assert_eq!(files[0].entries.len(), 1);
            assert_eq!(files[0].parked.len(), 1);
        }
        other => panic!("expected Entries, got {:?}", other),
    }
    match server.handle_request(Request::Status).await {
        Response::Status {
            files,
            entries,
            parked,
            ..
        } => assert_eq!((files, entries, parked), (1, 1, 1)),
        other => panic!("expected Status, got {:?}", other),
    }

    assert_eq!(
        server
            .handle_request(Request::ReleaseOwner {
                owner: LockOwner::local("a", 1)
            })
            .await,
        Response::Released {
            files: vec!["data.db".to_string()]
        }
    );
}

#[tokio::test]
async fn shutdown_request_trips_the_token() {
    let server = server();
    assert!(!server.shutdown_requested().is_cancelled());
    assert_eq!(
        server.handle_request(Request::Shutdown).await,
        Response::ShuttingDown
    );
    assert!(server.shutdown_requested().is_cancelled());
}
