// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn eof_sorts_after_every_offset() {
    assert!(RangeEnd::Offset(u64::MAX) < RangeEnd::Eof);
    assert!(RangeEnd::Offset(0) < RangeEnd::Offset(1));
}

#[test]
fn bounded_rejects_empty_range() {
    assert_eq!(LockRange::bounded(10, 10), Err(RangeError::Empty(10)));
}

#[test]
fn bounded_rejects_inverted_range() {
    assert_eq!(
        LockRange::bounded(10, 5),
        Err(RangeError::Inverted { start: 10, end: 5 })
    );
}

#[parameterized(
    zero_length_is_eof = { 100, 0, LockRange::to_eof(100) },
    plain = { 0, 100, LockRange::new(0, RangeEnd::Offset(100)) },
    single_byte = { 7, 1, LockRange::new(7, RangeEnd::Offset(8)) },
)]
fn from_length_converts(start: u64, length: u64, expected: LockRange) {
    assert_eq!(LockRange::from_length(start, length), Ok(expected));
}

#[test]
fn from_length_rejects_overflow() {
    assert_eq!(
        LockRange::from_length(u64::MAX, 2),
        Err(RangeError::Overflow {
            start: u64::MAX,
            length: 2
        })
    );
}

#[test]
fn wire_length_round_trips_eof() {
    assert_eq!(LockRange::to_eof(5).wire_length(), 0);
    assert_eq!(LockRange::new(5, RangeEnd::Offset(9)).wire_length(), 4);
}

#[test]
fn contains_respects_half_open_end() {
    let range = LockRange::new(10, RangeEnd::Offset(20));
    assert!(range.contains(10));
    assert!(range.contains(19));
    assert!(!range.contains(20));
    assert!(!range.contains(9));
    assert!(LockRange::to_eof(10).contains(u64::MAX));
}

#[test]
fn covers_nested_ranges() {
    let outer = LockRange::to_eof(0);
    let inner = LockRange::new(5, RangeEnd::Offset(10));
    assert!(outer.covers(&inner));
    assert!(!inner.covers(&outer));
}

#[test]
fn display_shows_half_open_form() {
    assert_eq!(LockRange::new(0, RangeEnd::Offset(25)).to_string(), "[0, 25)");
    assert_eq!(LockRange::to_eof(75).to_string(), "[75, EOF)");
}
