// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! PVS Editor CLI - Main binary entry point
//!
//! Interactive PVS console and batch typechecking

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pvs_editor::bus::{BusEvent, StatusEvent};
use pvs_editor::protocol::StatusUpdate;
use pvs_editor::{Command, FileRef, LogLevel, Session, SessionConfig, SymbolKind, SymbolNode};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

mod output;
mod repl;

use output::{OutputFormat, OutputFormatter};

/// PVS Editor - session controller for the PVS theorem prover
#[derive(Parser)]
#[command(name = "pvs-editor")]
#[command(version, about, long_about = None)]
#[command(author = "ECHIDNA Project Team")]
struct Cli {
    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Logger verbosity (default, debug, off); `-logger<level>` also works
    #[arg(long, global = true)]
    logger: Option<String>,

    /// Prover executable (absolute, or relative to the installation folder)
    #[arg(long, global = true)]
    pvs: Option<PathBuf>,

    /// Installation folder (default: parent of this executable's folder)
    #[arg(long, global = true)]
    install_dir: Option<PathBuf>,

    /// Milliseconds to wait for PVS to exit before killing it
    #[arg(long, global = true)]
    stop_timeout: Option<u64>,

    /// Disable colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive PVS console (default)
    Console {
        /// Do not start PVS until `:start`
        #[arg(long)]
        no_start: bool,
    },

    /// Typecheck a file and print its symbol tree
    Typecheck {
        /// Path to the .pvs file
        file: PathBuf,

        /// Seconds to wait for PVS to finish
        #[arg(short, long, default_value = "300")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if cfg!(windows) {
        eprintln!("{}", "PVS Editor does not run on Windows".red().bold());
        std::process::exit(1);
    }

    let cli = Cli::parse_from(LogLevel::normalize_args(std::env::args()));

    let (log_level, bad_level) = match cli.logger.as_deref().map(str::parse::<LogLevel>) {
        None => (LogLevel::Default, None),
        Some(Ok(level)) => (level, None),
        Some(Err(e)) => (LogLevel::Default, Some(e)),
    };
    init_tracing(log_level);
    if let Some(e) = bad_level {
        warn!("{}; using default logging", e);
    }

    if cli.no_color {
        colored::control::set_override(false);
    }

    let formatter = OutputFormatter::new(cli.format);
    let config = create_config(&cli, log_level)?;
    info!(
        "PVS executable: {} (log level {})",
        config.executable_path().display(),
        config.log_level
    );

    match cli.command.unwrap_or(Commands::Console { no_start: false }) {
        Commands::Console { no_start } => {
            let session = Arc::new(Session::new(config));
            repl::start_repl(session, formatter, !no_start).await?;
        }
        Commands::Typecheck { file, timeout } => {
            typecheck_command(config, file, timeout, &formatter).await?;
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::{fmt, prelude::*};

    tracing_subscriber::registry()
        .with(EnvFilter::new(level.directive()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn create_config(cli: &Cli, log_level: LogLevel) -> Result<SessionConfig> {
    let mut config = match &cli.install_dir {
        Some(dir) => SessionConfig {
            install_dir: dir.clone(),
            ..Default::default()
        },
        None => SessionConfig::discover().context("Failed to locate the installation folder")?,
    };
    if let Some(pvs) = &cli.pvs {
        config.executable = pvs.clone();
    }
    if let Some(ms) = cli.stop_timeout {
        config.stop_timeout_ms = ms;
    }
    config.log_level = log_level;
    Ok(config)
}

/// Start PVS, typecheck one file, print the resulting tree
async fn typecheck_command(
    config: SessionConfig,
    file: PathBuf,
    timeout: u64,
    formatter: &OutputFormatter,
) -> Result<()> {
    let file = FileRef::new(file)?;
    let context = file
        .path()
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .map(|d| d.to_path_buf());
    if let Some(dir) = &context {
        info!("PVS context: {}", dir.display());
    }
    let config = SessionConfig {
        working_dir: context,
        ..config
    };
    // PVS already starts in the file's directory
    let file = FileRef::new(file.name())?;

    let session = Session::new(config);
    let mut events = session.subscribe();
    let pb = create_progress_bar("Starting PVS...");

    session.start().await.context("Failed to start PVS")?;
    pb.set_message(format!("Typechecking {}...", file.name()));
    session
        .dispatch(Command::Typecheck(file.clone()))
        .await
        .context("Failed to send typecheck request")?;

    let outcome = tokio::time::timeout(
        Duration::from_secs(timeout),
        wait_for_response(&mut events, &pb),
    )
    .await;

    pb.finish_and_clear();
    let stopped = session.stop().await;

    let errors = match outcome {
        Ok(result) => result?,
        Err(_) => bail!("PVS did not finish within {}s", timeout),
    };
    stopped.context("Failed to stop PVS")?;

    let tree = settled_tree(&session, file.name()).await;
    if tree.child(file.name()).is_none() {
        formatter.warning(&format!("No symbols reported for {}", file.name()))?;
    }
    formatter.output_tree(&tree)?;

    if errors > 0 {
        formatter.error(&format!("✗ {} has {} error(s)", file.name(), errors))?;
        std::process::exit(1);
    }
    formatter.success(&format!("✓ Typechecked {}", file.name()))?;
    Ok(())
}

/// Wait for the prompt that ends the response; returns the error count
async fn wait_for_response(
    events: &mut tokio::sync::broadcast::Receiver<BusEvent>,
    pb: &ProgressBar,
) -> Result<usize> {
    let mut errors = 0;
    loop {
        match events.recv().await {
            Ok(BusEvent::ConsoleWritePrompt(_)) => return Ok(errors),
            Ok(BusEvent::ConsoleWriteLine(line)) => pb.set_message(line),
            Ok(BusEvent::PvsStatus(StatusEvent::Update(StatusUpdate::Node(desc)))) => {
                if desc.kind == SymbolKind::Error {
                    errors += 1;
                }
            }
            Ok(BusEvent::PvsStatus(StatusEvent::Update(StatusUpdate::ProcessExited { code }))) => {
                bail!("PVS exited unexpectedly (code {:?})", code)
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("{} events skipped", skipped),
            Err(RecvError::Closed) => bail!("session closed"),
        }
    }
}

/// Tree snapshot once the update for `file` has been applied
async fn settled_tree(session: &Session, file: &str) -> Arc<SymbolNode> {
    let mut tree = session.watch_tree();
    let published = tokio::time::timeout(
        Duration::from_secs(1),
        tree.wait_for(|t| t.child(file).is_some()),
    )
    .await
    .is_ok_and(|r| r.is_ok());
    if !published {
        warn!("symbol tree for {} not published", file);
    }
    session.tree_snapshot()
}

/// Create a spinner for long-running operations
fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
