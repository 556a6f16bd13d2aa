// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::range::RangeEnd;

fn r(start: u64, end: u64) -> LockRange {
    LockRange::new(start, RangeEnd::Offset(end))
}

#[test]
fn empty_plan_needs_no_release() {
    let plan = UnlockPlan::empty();
    assert!(plan.is_empty());
    assert!(!plan.needs_release());
}

#[test]
fn from_removed_coalesces_pieces() {
    let plan = UnlockPlan::from_removed(vec![r(10, 20), r(0, 10), r(40, 50)]);
    assert_eq!(plan.removed, vec![r(0, 20), r(40, 50)]);
    assert_eq!(plan.release, plan.removed);
    assert!(plan.retained.is_empty());
}

#[test]
fn netting_against_shared_reader_releases_nothing() {
    let own = UnlockPlan::from_removed(vec![r(0, 100)]);
    let projection = UnlockPlan {
        removed: vec![r(0, 100)],
        retained: vec![r(0, 100)],
        release: Vec::new(),
    };

    let plan = own.netted(&projection);
    assert_eq!(plan.removed, vec![r(0, 100)]);
    assert_eq!(plan.retained, vec![r(0, 100)]);
    assert!(!plan.needs_release());
}

#[test]
fn netting_against_empty_projection_releases_everything() {
    let own = UnlockPlan::from_removed(vec![r(0, 10), r(20, 30)]);
    let plan = own.netted(&UnlockPlan::empty());
    assert_eq!(plan.release, vec![r(0, 10), r(20, 30)]);
    assert!(plan.retained.is_empty());
}

#[test]
fn netting_releases_only_uncovered_bytes() {
    let own = UnlockPlan::from_removed(vec![LockRange::to_eof(0)]);
    let projection = UnlockPlan {
        removed: vec![LockRange::to_eof(0)],
        retained: vec![r(50, 60)],
        release: Vec::new(),
    };

    let plan = own.netted(&projection);
    assert_eq!(plan.retained, vec![r(50, 60)]);
    assert_eq!(plan.release, vec![r(0, 50), LockRange::to_eof(60)]);
}

#[test]
fn netting_an_empty_plan_stays_empty() {
    let projection = UnlockPlan {
        removed: vec![r(0, 10)],
        retained: vec![r(0, 10)],
        release: Vec::new(),
    };
    let plan = UnlockPlan::empty().netted(&projection);
    assert!(plan.is_empty());
    assert!(!plan.needs_release());
}
