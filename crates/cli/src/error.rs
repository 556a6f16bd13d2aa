// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.

use std::fmt;
use std::path::Path;

use brl_core::LockEntry;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct BrlError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
}

impl BrlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// No daemon behind the socket
    pub fn daemon_not_running(socket: &Path) -> Self {
        BrlError::new("brld is not running")
            .with_context(format!("No daemon answered at {}", socket.display()))
            .with_suggestion("Start it: brld [CONFIG]")
            .with_suggestion("Point at another socket: brl --socket PATH ...")
    }

    /// Non-blocking lock refused
    pub fn lock_denied(file: &str, blockers: &[LockEntry]) -> Self {
        let err = BrlError::new(format!("Lock on '{}' denied", file));
        blockers
            .iter()
            .fold(err, |err, b| err.with_context(format!("held: {}", b)))
            .with_suggestion("Wait for it: add --block")
    }
}

impl fmt::Display for BrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for BrlError {}

#[cfg(test)]
mod tests {
    use super::*;
    use brl_core::{LockOwner, LockRange, LockType};

    #[test]
    fn error_display() {
        let err = BrlError::new("Something went wrong")
            .with_context("First context")
            .with_suggestion("Try this")
            .with_suggestion("Or this");

        let output = format!("{}", err);
        assert!(output.contains("error: Something went wrong"));
        assert!(output.contains("-> First context"));
        assert!(output.contains("1. Try this"));
        assert!(output.contains("2. Or this"));
    }

    #[test]
    fn lock_denied_lists_blockers() {
        let blocker = LockEntry::new(
            LockOwner::local("host", 9),
            LockRange::whole_file(),
            LockType::Write,
        );
        let output = BrlError::lock_denied("data.db", &[blocker]).to_string();
        assert!(output.contains("'data.db' denied"));
        assert!(output.contains("held: WRITE [0, EOF) owner=local:host/9"));
    }
}
