// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use brl_core::{FileId, LockOwner, LockType, RangeEnd};
use brl_daemon::ParkedSummary;
use brl_engine::{WaitHandle, WaitToken};

fn r(start: u64, end: u64) -> LockRange {
    LockRange::new(start, RangeEnd::Offset(end))
}

#[test]
fn empty_entries_use_placeholder() {
    assert_eq!(entry_lines(&[], "No conflicts"), "No conflicts");
}

#[test]
fn entry_lines_show_type_range_and_owner() {
    let entry = LockEntry::new(LockOwner::local("host", 3), r(0, 10), LockType::Read);
    let line = entry_lines(&[entry], "");
    assert!(line.starts_with("READ"), "{}", line);
    assert!(line.contains("[0, 10)"));
    assert!(line.ends_with("local:host/3"));
}

#[test]
fn range_list_joins_or_dashes() {
    assert_eq!(range_list(&[]), "-");
    assert_eq!(range_list(&[r(0, 5), r(9, 12)]), "[0, 5) [9, 12)");
}

#[test]
fn file_table_marks_parked_requests() {
    let files = vec![FileEntries {
        file: "data.db".to_string(),
        entries: vec![LockEntry::new(
            LockOwner::local("a", 1),
            r(0, 10),
            LockType::Write,
        )],
        parked: vec![ParkedSummary {
            token: WaitToken {
                file: FileId::new("data.db"),
                handle: WaitHandle {
                    index: 0,
                    generation: 0,
                },
            },
            owner: LockOwner::local("b", 1),
            range: r(0, 10),
            kind: LockType::Read,
        }],
    }];

    let table = file_table(&files);
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines[0], "data.db:");
    assert!(lines[1].trim_start().starts_with("granted"));
    assert!(lines[2].trim_start().starts_with("parked"));
    assert!(lines[2].ends_with("token=data.db#0.0"));
}

#[test]
fn no_files_is_no_locks() {
    assert_eq!(file_table(&[]), "No locks");
}
