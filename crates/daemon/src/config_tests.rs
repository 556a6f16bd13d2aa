// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn empty_file_is_all_defaults() {
    assert_eq!(Config::parse("").unwrap(), Config::default());
}

#[test]
fn missing_file_is_all_defaults() {
    let dir = tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn keys_override_defaults() {
    let config = Config::parse(
        r#"
socket_path = "/run/brl/brld.sock"
export_root = "/srv/export"
kernel = "none"
wait_timeout = "30s"
wait_retention = "5m"
log_filter = "brl_engine=debug"
"#,
    )
    .unwrap();

    assert_eq!(config.socket_path, PathBuf::from("/run/brl/brld.sock"));
    assert_eq!(config.export_root, PathBuf::from("/srv/export"));
    assert_eq!(config.kernel, KernelMode::None);
    assert_eq!(config.wait_timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.wait_retention, Duration::from_secs(300));
    assert_eq!(config.log_filter, "brl_engine=debug");
    assert_eq!(config.lock_path, Config::default().lock_path);
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(Config::parse("sokcet_path = \"/tmp/x\"").is_err());
}

#[test]
fn bad_kernel_mode_is_rejected() {
    assert!(Config::parse("kernel = \"flock\"").is_err());
}

#[test]
fn parse_error_names_the_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("brld.toml");
    std::fs::write(&path, "wait_timeout = \"soon\"").unwrap();

    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(ref p, _) if p == &path));
    assert!(err.to_string().contains("brld.toml"));
}

#[test]
fn explicit_path_wins() {
    let path = PathBuf::from("/etc/brl/brld.toml");
    assert_eq!(Config::locate(Some(path.clone())), path);
}
