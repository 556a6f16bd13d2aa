// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration loaded from TOML

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How granted locks are mirrored into the host kernel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelMode {
    /// Open-file-description `fcntl` locks on files under the export root
    #[default]
    Ofd,
    /// Keep locks in the daemon only
    None,
}

/// Default for [`Config::wait_retention`]
pub const DEFAULT_WAIT_RETENTION: Duration = Duration::from_secs(60);

/// Daemon configuration
///
/// Every key is optional; a missing file means all defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Directory the file ids in lock requests resolve against
    pub export_root: PathBuf,
    pub kernel: KernelMode,
    /// Bound on how long the daemon keeps a blocking request parked
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Option<Duration>,
    /// How long a finished blocking request's outcome stays available to `Wait`
    #[serde(with = "humantime_serde")]
    pub wait_retention: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let state = state_dir();
        Self {
            socket_path: socket_dir().join("brld.sock"),
            lock_path: state.join("brld.pid"),
            log_path: state.join("brld.log"),
            log_filter: "info".to_string(),
            export_root: state.join("export"),
            kernel: KernelMode::default(),
            wait_timeout: None,
            wait_retention: DEFAULT_WAIT_RETENTION,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Invalid config {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
}

impl Config {
    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|e| ConfigError::Parse(path.into(), e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Read(path.into(), e)),
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Config path from the command line, `BRL_CONFIG`, or the default
    pub fn locate(arg: Option<PathBuf>) -> PathBuf {
        arg.or_else(|| std::env::var_os("BRL_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| config_dir().join("brld.toml"))
    }
}

/// State directory for brld
///
/// `XDG_STATE_HOME/brl`, else `~/.local/state/brl`, else a temp directory.
fn state_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("brl");
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".local/state/brl"),
        None => std::env::temp_dir().join("brl"),
    }
}

fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("brl");
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config/brl"),
        None => std::env::temp_dir().join("brl"),
    }
}

/// Socket directory for brld
///
/// Uses /tmp/brl by default to keep paths short (macOS SUN_LEN = 104).
/// Can be overridden with BRL_SOCKET_DIR.
pub fn socket_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("BRL_SOCKET_DIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from("/tmp/brl")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
