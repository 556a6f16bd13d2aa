// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! brl - byte-range lock console

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod completions;
mod error;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use brl_engine::WaitToken;
use clap::{Parser, Subcommand};
use commands::{daemon, lock, Mode, OwnerArgs, TargetArgs};

use crate::client::{resolve_socket, ClientError, DaemonClient};
use crate::error::BrlError;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "brl", version, about = "Byte-range lock console for brld")]
struct Cli {
    /// Daemon socket (default: BRL_SOCKET, then the brld config)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(flatten)]
    owner: OwnerArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a lock
    Lock(lock::LockArgs),
    /// Drop locks over a range
    Unlock(TargetArgs),
    /// List locks that would block a request
    Test(lock::TestArgs),
    /// Cancel a parked request by token
    Cancel {
        token: WaitToken,
    },
    /// Cancel a parked request by its description
    CancelMatching {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long, value_enum, default_value_t = Mode::Read)]
        mode: Mode,
    },
    /// Wait for a parked request to finish
    Wait {
        token: WaitToken,
        /// Give up after this many milliseconds
        #[arg(long, value_name = "MS", default_value_t = 30_000)]
        timeout_ms: u64,
    },
    /// Drop every lock and parked request of the owner
    ReleaseOwner,
    /// Show granted and parked locks
    Entries {
        /// Limit to one file
        file: Option<String>,
    },
    /// Daemon management
    #[command(subcommand)]
    Daemon(daemon::DaemonCommand),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    if let Commands::Completions(args) = cli.command {
        completions::generate_completions::<Cli>(args.shell);
        return Ok(());
    }

    let socket = resolve_socket(cli.socket);
    let client = match DaemonClient::connect(socket) {
        Ok(client) => client,
        Err(ClientError::DaemonNotRunning(socket)) => {
            return Err(BrlError::daemon_not_running(&socket).into())
        }
        Err(e) => return Err(e.into()),
    };
    let owner = cli.owner.owner();
    let format = cli.format;

    let result = match cli.command {
        Commands::Lock(args) => lock::lock(&client, &owner, args, format).await,
        Commands::Unlock(target) => lock::unlock(&client, &owner, target, format).await,
        Commands::Test(args) => lock::test(&client, &owner, args, format).await,
        Commands::Cancel { token } => lock::cancel(&client, token, format).await,
        Commands::CancelMatching { target, mode } => {
            lock::cancel_matching(&client, &owner, target, mode, format).await
        }
        Commands::Wait { token, timeout_ms } => {
            lock::wait(&client, token, timeout_ms, format).await
        }
        Commands::ReleaseOwner => daemon::release_owner(&client, &owner, format).await,
        Commands::Entries { file } => daemon::entries(&client, file, format).await,
        Commands::Daemon(command) => daemon::handle(&client, command, format).await,
        Commands::Completions(_) => Ok(()),
    };

    // The socket vanished between the check and the request
    match result {
        Err(e) => match e.downcast::<ClientError>() {
            Ok(ClientError::DaemonNotRunning(socket)) => {
                Err(BrlError::daemon_not_running(&socket).into())
            }
            Ok(other) => Err(other.into()),
            Err(e) => Err(e),
        },
        ok => ok,
    }
}

/// Diagnostics to stderr, quiet unless `RUST_LOG` asks
fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
