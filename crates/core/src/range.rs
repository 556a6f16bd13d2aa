// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Byte ranges over 64-bit file offsets
//!
//! A [`LockRange`] is the half-open interval `[start, end)`. The end may be
//! [`RangeEnd::Eof`], which compares greater than every finite offset and
//! stands for "to end of file, including future growth".

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Exclusive end of a lock range
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeEnd {
    /// Ends just before this offset
    Offset(u64),
    /// Extends to end of file
    Eof,
}

impl RangeEnd {
    pub fn is_eof(&self) -> bool {
        matches!(self, RangeEnd::Eof)
    }

    /// True if the offset lies before this end
    pub fn is_after(&self, offset: u64) -> bool {
        match self {
            RangeEnd::Offset(end) => offset < *end,
            RangeEnd::Eof => true,
        }
    }
}

impl fmt::Display for RangeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeEnd::Offset(end) => write!(f, "{}", end),
            RangeEnd::Eof => write!(f, "EOF"),
        }
    }
}

/// Errors from building a range
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("zero-length range at offset {0}")]
    Empty(u64),
    #[error("range end {end} precedes start {start}")]
    Inverted { start: u64, end: u64 },
    #[error("offset {start} + length {length} overflows 64 bits")]
    Overflow { start: u64, length: u64 },
}

/// Half-open interval `[start, end)` of file offsets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockRange {
    pub start: u64,
    pub end: RangeEnd,
}

impl LockRange {
    /// Build a range without validating it
    ///
    /// Requests decoded off the wire arrive this way; the resolver rejects
    /// the invalid ones before any state is touched.
    pub const fn new(start: u64, end: RangeEnd) -> Self {
        Self { start, end }
    }

    /// Build a finite range, rejecting empty and inverted ones
    pub fn bounded(start: u64, end: u64) -> Result<Self, RangeError> {
        let range = Self::new(start, RangeEnd::Offset(end));
        range.validate()?;
        Ok(range)
    }

    /// Range from `start` to end of file
    pub const fn to_eof(start: u64) -> Self {
        Self::new(start, RangeEnd::Eof)
    }

    /// The whole file
    pub const fn whole_file() -> Self {
        Self::to_eof(0)
    }

    /// Convert an NLM/NFS style `(offset, length)` pair
    ///
    /// A length of zero means "to end of file".
    pub fn from_length(start: u64, length: u64) -> Result<Self, RangeError> {
        if length == 0 {
            return Ok(Self::to_eof(start));
        }
        let end = start
            .checked_add(length)
            .ok_or(RangeError::Overflow { start, length })?;
        Ok(Self::new(start, RangeEnd::Offset(end)))
    }

    /// Check the range is non-empty and not inverted
    pub fn validate(&self) -> Result<(), RangeError> {
        match self.end {
            RangeEnd::Eof => Ok(()),
            RangeEnd::Offset(end) if end == self.start => Err(RangeError::Empty(self.start)),
            RangeEnd::Offset(end) if end < self.start => Err(RangeError::Inverted {
                start: self.start,
                end,
            }),
            RangeEnd::Offset(_) => Ok(()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Length in bytes, `None` for ranges that run to end of file
    pub fn len(&self) -> Option<u64> {
        match self.end {
            RangeEnd::Offset(end) => Some(end.saturating_sub(self.start)),
            RangeEnd::Eof => None,
        }
    }

    /// Protocol-style length, zero meaning "to end of file"
    pub fn wire_length(&self) -> u64 {
        self.len().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// True if `offset` falls inside the range
    pub fn contains(&self, offset: u64) -> bool {
        self.start <= offset && self.end.is_after(offset)
    }

    /// True if `other` lies entirely inside this range
    pub fn covers(&self, other: &LockRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for LockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
#[path = "range_tests.rs"]
mod tests;
