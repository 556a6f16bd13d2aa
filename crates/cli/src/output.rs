// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use brl_core::{LockEntry, LockRange};
use brl_daemon::FileEntries;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print `value` as JSON, or `text` otherwise
pub fn print<T: Serialize>(value: &T, text: impl FnOnce() -> String, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", text()),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// One line per entry, or a placeholder when empty
pub fn entry_lines(entries: &[LockEntry], empty: &str) -> String {
    if entries.is_empty() {
        return empty.to_string();
    }
    entries
        .iter()
        .map(|e| format!("{:<6} {:<24} {}", e.kind().to_string(), e.range().to_string(), e.owner()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn range_list(ranges: &[LockRange]) -> String {
    if ranges.is_empty() {
        return "-".to_string();
    }
    ranges
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Table of granted and parked locks per file
pub fn file_table(files: &[FileEntries]) -> String {
    if files.is_empty() {
        return "No locks".to_string();
    }
    let mut out = Vec::new();
    for file in files {
        out.push(format!("{}:", file.file));
        for e in &file.entries {
            out.push(format!(
                "  {:<8} {:<6} {:<24} {}",
                "granted",
                e.kind().to_string(),
                e.range().to_string(),
                e.owner()
            ));
        }
        for p in &file.parked {
            out.push(format!(
                "  {:<8} {:<6} {:<24} {} token={}",
                "parked",
                p.kind.to_string(),
                p.range.to_string(),
                p.owner,
                p.token
            ));
        }
    }
    out.join("\n")
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
