// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LOCK, UNLOCK, TEST, CANCEL and WAIT

use std::time::Duration;

use anyhow::{bail, Result};
use brl_core::{FileId, LockEntry, LockOwner, LockRange};
use brl_daemon::Response;
use brl_engine::{RequestState, WaitToken};
use serde::Serialize;

use super::{Mode, TargetArgs};
use crate::client::{DaemonClient, LockReply};
use crate::error::BrlError;
use crate::output::{self, OutputFormat};

#[derive(clap::Args, Debug)]
pub struct LockArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long, value_enum, default_value_t = Mode::Read)]
    pub mode: Mode,

    /// Park on conflict instead of failing
    #[arg(long)]
    pub block: bool,

    /// Park on conflict and wait up to this many milliseconds
    #[arg(long, value_name = "MS")]
    pub wait_ms: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct TestArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long, value_enum, default_value_t = Mode::Write)]
    pub mode: Mode,

    /// Ignore locks held by the asking owner
    #[arg(long)]
    pub exclude_self: bool,
}

#[derive(Serialize)]
struct LockReport {
    file: String,
    range: LockRange,
    state: RequestState,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<WaitToken>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    blockers: Vec<LockEntry>,
}

impl LockReport {
    fn text(&self) -> String {
        match &self.token {
            Some(token) => format!("{} {} {} token={}", self.state, self.file, self.range, token),
            None => format!("{} {} {}", self.state, self.file, self.range),
        }
    }
}

pub async fn lock(
    client: &DaemonClient,
    owner: &LockOwner,
    args: LockArgs,
    format: OutputFormat,
) -> Result<()> {
    let range = args.target.range()?;
    let file = FileId::new(args.target.file.as_str());
    let blocking = args.block || args.wait_ms.is_some();

    let mut report = LockReport {
        file: args.target.file.clone(),
        range,
        state: RequestState::Granted,
        token: None,
        blockers: Vec::new(),
    };
    let token = match client
        .lock(&file, owner, range, args.mode.into(), blocking)
        .await?
    {
        LockReply::Granted => {
            output::print(&report, || report.text(), format);
            return Ok(());
        }
        LockReply::Denied(blockers) => {
            report.state = RequestState::Rejected;
            if let OutputFormat::Json = format {
                report.blockers = blockers.clone();
                output::print(&report, || report.text(), format);
            }
            return Err(BrlError::lock_denied(&args.target.file, &blockers).into());
        }
        LockReply::Pending(token) | LockReply::AlreadyPending(token) => token,
    };

    report.state = RequestState::Pending;
    report.token = Some(token.clone());
    let Some(ms) = args.wait_ms else {
        output::print(&report, || report.text(), format);
        return Ok(());
    };

    report.state = client.wait(&token, Duration::from_millis(ms)).await?;
    output::print(&report, || report.text(), format);
    match report.state {
        RequestState::Granted => Ok(()),
        RequestState::Pending => bail!("still waiting after {}ms; request {} stays parked", ms, token),
        state => bail!("request {} ended {}", token, state),
    }
}

pub async fn unlock(
    client: &DaemonClient,
    owner: &LockOwner,
    target: TargetArgs,
    format: OutputFormat,
) -> Result<()> {
    let range = target.range()?;
    let response = client
        .unlock(&FileId::new(target.file.as_str()), owner, range)
        .await?;
    if let Response::Unlocked {
        release,
        retained,
        cancelled,
        divergence,
    } = &response
    {
        output::print(
            &response,
            || {
                let mut text = format!(
                    "unlocked {} {}\n  released: {}\n  retained: {}",
                    target.file,
                    range,
                    output::range_list(release),
                    output::range_list(retained)
                );
                for token in cancelled {
                    text.push_str(&format!("\n  cancelled: {}", token));
                }
                if let Some(divergence) = divergence {
                    text.push_str(&format!("\n  kernel divergence: {}", divergence));
                }
                text
            },
            format,
        );
    }
    Ok(())
}

pub async fn test(
    client: &DaemonClient,
    owner: &LockOwner,
    args: TestArgs,
    format: OutputFormat,
) -> Result<()> {
    let range = args.target.range()?;
    let blockers = client
        .test(
            &FileId::new(args.target.file.as_str()),
            range,
            args.mode.into(),
            args.exclude_self.then_some(owner),
        )
        .await?;
    output::print(
        &blockers,
        || output::entry_lines(&blockers, "No conflicts"),
        format,
    );
    Ok(())
}

pub async fn cancel(client: &DaemonClient, token: WaitToken, format: OutputFormat) -> Result<()> {
    let cancelled = client.cancel(&token).await?;
    print_cancelled(cancelled, &token.to_string(), format);
    Ok(())
}

pub async fn cancel_matching(
    client: &DaemonClient,
    owner: &LockOwner,
    target: TargetArgs,
    mode: Mode,
    format: OutputFormat,
) -> Result<()> {
    let range = target.range()?;
    let cancelled = client
        .cancel_matching(
            &FileId::new(target.file.as_str()),
            owner,
            range,
            mode.into(),
        )
        .await?;
    print_cancelled(cancelled, &format!("{} {}", target.file, range), format);
    Ok(())
}

fn print_cancelled(cancelled: bool, what: &str, format: OutputFormat) {
    output::print(
        &serde_json::json!({ "cancelled": cancelled }),
        || {
            if cancelled {
                format!("cancelled {}", what)
            } else {
                format!("nothing parked for {}", what)
            }
        },
        format,
    );
}

pub async fn wait(
    client: &DaemonClient,
    token: WaitToken,
    timeout_ms: u64,
    format: OutputFormat,
) -> Result<()> {
    let state = client
        .wait(&token, Duration::from_millis(timeout_ms))
        .await?;
    output::print(
        &serde_json::json!({ "token": token, "state": state }),
        || format!("{} {}", state, token),
        format,
    );
    Ok(())
}
