// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;
use yare::parameterized;

#[parameterized(
    parent = { "../etc/passwd" },
    absolute = { "/etc/passwd" },
    nested_parent = { "a/../../b" },
    empty = { "" },
)]
fn escaping_ids_are_rejected(id: &str) {
    let provider = DirHandleProvider::new("/srv/locks");
    assert!(matches!(
        provider.path_of(&FileId::new(id)),
        Err(HandleError::InvalidName(_))
    ));
}

#[test]
fn nested_ids_resolve_under_root() {
    let provider = DirHandleProvider::new("/srv/locks");
    assert_eq!(
        provider.path_of(&FileId::new("db/table.dat")).unwrap(),
        PathBuf::from("/srv/locks/db/table.dat")
    );
}

#[test]
fn handles_are_cached_until_closed() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("f"), b"x").unwrap();
    let provider = DirHandleProvider::new(dir.path());
    let file = FileId::new("f");

    let first = provider.handle(&file).unwrap();
    let second = provider.handle(&file).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(provider.open_count(), 1);

    provider.close(&file);
    assert_eq!(provider.open_count(), 0);
    let third = provider.handle(&file).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
}

#[test]
fn missing_file_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let provider = DirHandleProvider::new(dir.path());
    let err = provider.handle(&FileId::new("nope")).unwrap_err();
    assert!(matches!(err, HandleError::Open { .. }));
    assert_eq!(provider.open_count(), 0);
}
