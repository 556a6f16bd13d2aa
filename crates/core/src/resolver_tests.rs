// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::range::RangeEnd;
use yare::parameterized;

fn r(start: u64, end: u64) -> LockRange {
    LockRange::new(start, RangeEnd::Offset(end))
}

fn owner(name: &str) -> LockOwner {
    LockOwner::local(name, 1)
}

fn table_with(entries: &[(&str, LockRange, LockType)]) -> FileLockState {
    let mut table = FileLockState::new();
    for (name, range, kind) in entries {
        table.insert(owner(name), *range, *kind).unwrap();
    }
    table
}

#[parameterized(
    read_read = { LockType::Read, LockType::Read, true },
    read_write = { LockType::Read, LockType::Write, false },
    write_read = { LockType::Write, LockType::Read, false },
    write_write = { LockType::Write, LockType::Write, false },
)]
fn compatibility_between_owners(held: LockType, requested: LockType, granted: bool) {
    let table = table_with(&[("a", r(0, 100), held)]);
    let resolution = resolve(&table, &owner("b"), r(50, 150), requested);
    assert_eq!(resolution.is_grantable(), granted);
}

#[test]
fn conflict_lists_the_blockers() {
    let table = table_with(&[("a", r(0, 10), LockType::Read), ("c", r(20, 30), LockType::Read)]);
    match resolve(&table, &owner("b"), r(5, 25), LockType::Write) {
        Resolution::Conflict(blockers) => {
            let owners: Vec<&LockOwner> = blockers.iter().map(|e| e.owner()).collect();
            assert_eq!(owners, vec![&owner("a"), &owner("c")]);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn disjoint_request_is_granted() {
    let table = table_with(&[("a", r(0, 10), LockType::Write)]);
    assert_eq!(
        resolve(&table, &owner("b"), r(10, 20), LockType::Write),
        Resolution::Grant
    );
}

#[test]
fn own_entries_never_block() {
    let table = table_with(&[("a", r(0, 10), LockType::Write)]);
    assert_eq!(
        resolve(&table, &owner("a"), r(0, 10), LockType::Write),
        Resolution::Grant
    );
}

#[test]
fn own_read_under_write_request_is_an_upgrade() {
    let table = table_with(&[("a", r(0, 100), LockType::Read)]);
    match resolve(&table, &owner("a"), r(40, 60), LockType::Write) {
        Resolution::Upgrade { replaced } => {
            assert_eq!(replaced.len(), 1);
            assert_eq!(replaced[0].range(), r(0, 100));
        }
        other => panic!("expected upgrade, got {other:?}"),
    }
}

#[test]
fn upgrade_blocked_by_other_reader() {
    let table = table_with(&[("a", r(0, 100), LockType::Read), ("b", r(50, 60), LockType::Read)]);
    assert!(matches!(
        resolve(&table, &owner("a"), r(0, 100), LockType::Write),
        Resolution::Conflict(_)
    ));
}

#[test]
fn own_write_under_read_request_is_a_downgrade() {
    let table = table_with(&[("a", r(0, 100), LockType::Write)]);
    assert!(matches!(
        resolve(&table, &owner("a"), r(0, 100), LockType::Read),
        Resolution::Downgrade { .. }
    ));
}

#[test]
fn empty_range_is_invalid() {
    let table = FileLockState::new();
    assert_eq!(
        resolve(&table, &owner("a"), r(5, 5), LockType::Read),
        Resolution::Invalid(RangeError::Empty(5))
    );
}
