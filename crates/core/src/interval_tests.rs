// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::entry::LockType;
use crate::owner::LockOwner;
use proptest::prelude::*;
use yare::parameterized;

fn r(start: u64, end: u64) -> LockRange {
    LockRange::new(start, RangeEnd::Offset(end))
}

fn entry(owner: &str, range: LockRange, kind: LockType) -> LockEntry {
    LockEntry::new(LockOwner::local(owner, 1), range, kind)
}

#[parameterized(
    disjoint = { r(0, 10), r(20, 30), false },
    adjacent = { r(0, 10), r(10, 20), false },
    partial = { r(0, 10), r(5, 15), true },
    nested = { r(0, 100), r(40, 60), true },
    identical = { r(5, 6), r(5, 6), true },
    eof_tail = { LockRange::to_eof(50), r(99, 100), true },
    eof_before = { LockRange::to_eof(50), r(0, 50), false },
)]
fn overlap_cases(a: LockRange, b: LockRange, expected: bool) {
    assert_eq!(overlaps(&a, &b), expected);
    assert_eq!(overlaps(&b, &a), expected);
}

#[test]
fn adjacent_ranges_touch_but_gaps_do_not() {
    assert!(touches(&r(0, 10), &r(10, 20)));
    assert!(!touches(&r(0, 10), &r(11, 20)));
    assert!(touches(&r(0, 10), &LockRange::to_eof(10)));
}

#[test]
fn mergeable_requires_same_owner_and_type() {
    let a = entry("a", r(0, 10), LockType::Read);
    assert!(mergeable(&a, &entry("a", r(10, 20), LockType::Read)));
    assert!(!mergeable(&a, &entry("a", r(10, 20), LockType::Write)));
    assert!(!mergeable(&a, &entry("b", r(5, 20), LockType::Read)));
    assert!(!mergeable(&a, &entry("a", r(11, 20), LockType::Read)));
}

#[test]
fn split_middle_leaves_two_residuals() {
    let e = entry("a", r(0, 100), LockType::Write);
    let (left, right) = split(&e, &r(25, 75));
    assert_eq!(left.map(|e| e.range()), Some(r(0, 25)));
    assert_eq!(right.map(|e| e.range()), Some(r(75, 100)));
}

#[test]
fn split_keeps_owner_and_type() {
    let e = entry("a", r(0, 100), LockType::Write);
    let (left, _) = split(&e, &r(50, 60));
    let left = left.unwrap();
    assert_eq!(left.owner(), e.owner());
    assert_eq!(left.kind(), LockType::Write);
}

#[parameterized(
    covers_all = { r(0, 100), r(0, 100), None, None },
    cuts_head = { r(0, 100), r(0, 40), None, Some(r(40, 100)) },
    cuts_tail = { r(0, 100), r(60, 200), Some(r(0, 60)), None },
    cut_to_eof = { LockRange::to_eof(10), LockRange::to_eof(30), Some(r(10, 30)), None },
    eof_middle = { LockRange::to_eof(0), r(10, 20), Some(r(0, 10)), Some(LockRange::to_eof(20)) },
    disjoint_after = { r(0, 10), r(20, 30), Some(r(0, 10)), None },
    disjoint_before = { r(40, 50), r(20, 30), None, Some(r(40, 50)) },
)]
fn split_range_cases(
    range: LockRange,
    cut: LockRange,
    left: Option<LockRange>,
    right: Option<LockRange>,
) {
    assert_eq!(split_range(&range, &cut), (left, right));
}

#[test]
fn intersection_of_disjoint_is_none() {
    assert_eq!(intersection(&r(0, 10), &r(10, 20)), None);
    assert_eq!(intersection(&r(0, 10), &r(5, 20)), Some(r(5, 10)));
    assert_eq!(
        intersection(&LockRange::to_eof(0), &LockRange::to_eof(7)),
        Some(LockRange::to_eof(7))
    );
}

#[test]
fn subtract_all_removes_every_cut() {
    let left = subtract_all(&[r(0, 100)], &[r(10, 20), r(50, 60)]);
    assert_eq!(left, vec![r(0, 10), r(20, 50), r(60, 100)]);
}

#[test]
fn coalesce_merges_touching_and_overlapping() {
    let merged = coalesce(vec![r(20, 30), r(0, 10), r(10, 15), r(25, 40), r(50, 60)]);
    assert_eq!(merged, vec![r(0, 15), r(20, 40), r(50, 60)]);
}

fn arb_range() -> impl Strategy<Value = LockRange> {
    (0u64..200, 1u64..100, any::<bool>()).prop_map(|(start, len, eof)| {
        if eof {
            LockRange::to_eof(start)
        } else {
            r(start, start + len)
        }
    })
}

fn bytes(ranges: &[LockRange], limit: u64) -> Vec<bool> {
    (0..limit)
        .map(|b| ranges.iter().any(|r| r.contains(b)))
        .collect()
}

proptest! {
    #[test]
    fn split_removes_exactly_the_cut(range in arb_range(), cut in arb_range()) {
        let (left, right) = split_range(&range, &cut);
        let residual: Vec<LockRange> = left.into_iter().chain(right).collect();
        for b in 0..400u64 {
            let expected = range.contains(b) && !cut.contains(b);
            let actual = residual.iter().any(|r| r.contains(b));
            prop_assert_eq!(expected, actual, "byte {}", b);
        }
        for piece in &residual {
            prop_assert!(piece.is_valid());
        }
    }

    #[test]
    fn coalesce_preserves_coverage_and_separates(ranges in proptest::collection::vec(arb_range(), 0..8)) {
        let merged = coalesce(ranges.clone());
        prop_assert_eq!(bytes(&ranges, 400), bytes(&merged, 400));
        for pair in merged.windows(2) {
            prop_assert!(!touches(&pair[0], &pair[1]));
            prop_assert!(pair[0].start < pair[1].start);
        }
    }
}
