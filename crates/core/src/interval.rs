// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interval algebra over lock ranges
//!
//! Pure functions, no state. Bounds compare as unsigned 64-bit offsets with
//! end-of-file above every finite offset; `[s1,e1)` and `[s2,e2)` overlap iff
//! `s1 < e2 && s2 < e1`.

use crate::entry::LockEntry;
use crate::range::{LockRange, RangeEnd};

/// True if the two ranges share at least one byte
pub fn overlaps(a: &LockRange, b: &LockRange) -> bool {
    b.end.is_after(a.start) && a.end.is_after(b.start)
}

/// True if the ranges overlap or one ends exactly where the other starts
pub fn touches(a: &LockRange, b: &LockRange) -> bool {
    RangeEnd::Offset(a.start) <= b.end && RangeEnd::Offset(b.start) <= a.end
}

/// True if the entries can be coalesced into one
pub fn mergeable(a: &LockEntry, b: &LockEntry) -> bool {
    a.owner() == b.owner() && a.kind() == b.kind() && touches(&a.range(), &b.range())
}

/// Bytes covered by both ranges
pub fn intersection(a: &LockRange, b: &LockRange) -> Option<LockRange> {
    if !overlaps(a, b) {
        return None;
    }
    Some(LockRange::new(a.start.max(b.start), a.end.min(b.end)))
}

/// Smallest range covering both
pub fn hull(a: &LockRange, b: &LockRange) -> LockRange {
    LockRange::new(a.start.min(b.start), a.end.max(b.end))
}

/// Remove `cut` from `range`, returning what is left on either side
pub fn split_range(range: &LockRange, cut: &LockRange) -> (Option<LockRange>, Option<LockRange>) {
    let left = (range.start < cut.start).then(|| {
        LockRange::new(range.start, range.end.min(RangeEnd::Offset(cut.start)))
    });
    let right = match cut.end {
        RangeEnd::Offset(cut_end) if cut.end < range.end => {
            Some(LockRange::new(range.start.max(cut_end), range.end))
        }
        _ => None,
    };
    (left, right)
}

/// Remove `cut` from an entry's range
///
/// The residuals keep the entry's owner and type. An entry that does not
/// overlap `cut` comes back whole on the side it lies on.
pub fn split(entry: &LockEntry, cut: &LockRange) -> (Option<LockEntry>, Option<LockEntry>) {
    let (left, right) = split_range(&entry.range(), cut);
    (
        left.map(|r| entry.with_range(r)),
        right.map(|r| entry.with_range(r)),
    )
}

/// Remove `cut` from every range in the set
pub fn subtract(ranges: &[LockRange], cut: &LockRange) -> Vec<LockRange> {
    let mut out = Vec::with_capacity(ranges.len() + 1);
    for range in ranges {
        if !overlaps(range, cut) {
            out.push(*range);
            continue;
        }
        let (left, right) = split_range(range, cut);
        out.extend(left);
        out.extend(right);
    }
    out
}

/// Remove every range in `cuts` from `ranges`
pub fn subtract_all(ranges: &[LockRange], cuts: &[LockRange]) -> Vec<LockRange> {
    cuts.iter()
        .fold(ranges.to_vec(), |acc, cut| subtract(&acc, cut))
}

/// Sort and merge touching ranges into a minimal disjoint set
pub fn coalesce(mut ranges: Vec<LockRange>) -> Vec<LockRange> {
    ranges.sort_by_key(|r| (r.start, r.end));
    let mut out: Vec<LockRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match out.last_mut() {
            Some(last) if touches(last, &range) => *last = hull(last, &range),
            _ => out.push(range),
        }
    }
    out
}

#[cfg(test)]
#[path = "interval_tests.rs"]
mod tests;
