// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon inspection and owner teardown

use anyhow::Result;
use brl_core::{FileId, LockOwner};
use brl_daemon::Response;
use clap::Subcommand;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Check the daemon answers
    Ping,
    /// Uptime and lock counts
    Status,
    /// Stop the daemon, cancelling parked requests
    Shutdown,
}

pub async fn handle(
    client: &DaemonClient,
    command: DaemonCommand,
    format: OutputFormat,
) -> Result<()> {
    match command {
        DaemonCommand::Ping => {
            client.ping().await?;
            let version = client.hello().await?;
            output::print(
                &serde_json::json!({ "version": version }),
                || format!("brld {} at {}", version, client.socket_path().display()),
                format,
            );
        }
        DaemonCommand::Status => {
            let status = client.status().await?;
            if let Response::Status {
                uptime_secs,
                files,
                entries,
                parked,
            } = &status
            {
                output::print(
                    &status,
                    || {
                        format!(
                            "uptime: {}s\nfiles: {}\nentries: {}\nparked: {}",
                            uptime_secs, files, entries, parked
                        )
                    },
                    format,
                );
            }
        }
        DaemonCommand::Shutdown => {
            client.shutdown().await?;
            output::print(
                &serde_json::json!({ "shutting_down": true }),
                || "Daemon shutting down".to_string(),
                format,
            );
        }
    }
    Ok(())
}

pub async fn entries(
    client: &DaemonClient,
    file: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let file = file.map(FileId::from);
    let files = client.entries(file.as_ref()).await?;
    output::print(&files, || output::file_table(&files), format);
    Ok(())
}

pub async fn release_owner(
    client: &DaemonClient,
    owner: &LockOwner,
    format: OutputFormat,
) -> Result<()> {
    let files = client.release_owner(owner).await?;
    output::print(
        &files,
        || {
            if files.is_empty() {
                format!("{} held nothing", owner)
            } else {
                format!("released {} on {}", owner, files.join(", "))
            }
        },
        format,
    );
    Ok(())
}
