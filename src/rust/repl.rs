// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Interactive PVS console
//!
//! Lines starting with ':' drive the session; anything else is sent to
//! the prover as typed. Prover output is printed by a background task
//! subscribed to the message bus.

use anyhow::{anyhow, Result};
use colored::Colorize;
use pvs_editor::bus::BusEvent;
use pvs_editor::dispatcher::{Command, FileRef, FormulaRef};
use pvs_editor::error::DispatchError;
use pvs_editor::mode::Mode;
use pvs_editor::Session;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::output::OutputFormatter;

/// What a console line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplAction {
    Dispatch(Command),
    EnterEditor,
    ResumeProver,
    ShowTree,
    ShowMode,
    Help,
    Quit,
    Raw(String),
}

/// Start the interactive console
pub async fn start_repl(session: Arc<Session>, formatter: OutputFormatter, autostart: bool) -> Result<()> {
    let printer = tokio::spawn(print_events(session.subscribe(), formatter));

    print_welcome(&session);

    if autostart {
        if let Err(e) = session.start().await {
            debug!("autostart failed: {}", e);
        }
    }

    let mut rl = DefaultEditor::new()?;

    loop {
        let prompt = create_prompt(session.mode());
        let readline = tokio::task::block_in_place(|| rl.readline(&prompt));

        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match parse_input(line) {
                    Ok(ReplAction::Quit) => break,
                    Ok(action) => {
                        if let Err(e) = execute(&session, &formatter, action).await {
                            report_error(&formatter, &e)?;
                        }
                    }
                    Err(e) => {
                        formatter.error(&format!("Error: {}", e))?;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                formatter.error(&format!("Error: {:?}", err))?;
                break;
            }
        }
    }

    shutdown(&session).await;
    printer.abort();

    println!("{}", "Goodbye!".cyan());

    Ok(())
}

/// Print every bus event until the session goes away
async fn print_events(mut events: broadcast::Receiver<BusEvent>, formatter: OutputFormatter) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(e) = formatter.output_event(&event) {
                    warn!("cannot print event: {}", e);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("console fell behind; {} events skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Quit, falling back to a plain stop when the prover state is unknown
async fn shutdown(session: &Session) {
    if session.mode() == Mode::Unknown {
        let _ = session.stop().await;
    } else if let Err(e) = session.quit().await {
        debug!("quit: {}", e);
        let _ = session.stop().await;
    }
}

fn print_welcome(session: &Session) {
    println!("{}", "╔═══════════════════════════════════════════════════════════╗".cyan());
    println!("{}", "║  PVS Editor Console                                       ║".cyan().bold());
    println!("{}", "╚═══════════════════════════════════════════════════════════╝".cyan());
    println!();
    println!(
        "Prover: {}",
        session.config().executable_path().display().to_string().green().bold()
    );
    println!();
    print_help();
}

fn print_help() {
    println!("{}", "Commands:".yellow().bold());
    println!("  :start                  - Start PVS");
    println!("  :stop                   - Stop PVS");
    println!("  :typecheck <file>       - Typecheck a .pvs file");
    println!("  :prove <theory> <name>  - Prove a formula");
    println!("  :close <file>           - Remove a file from the symbol tree");
    println!("  :edit                   - Switch to editor mode");
    println!("  :resume                 - Switch back to prover mode");
    println!("  :tree                   - Show the symbol tree");
    println!("  :mode                   - Show the session mode");
    println!("  :help                   - Show this help");
    println!("  :quit                   - Exit");
    println!();
    println!("Anything not starting with ':' is sent to PVS as typed");
    println!();
}

fn create_prompt(mode: Mode) -> String {
    match mode {
        Mode::Prover => format!("{}> ", "pvs".green()),
        Mode::Editor => format!("{}> ", "edit".cyan()),
        Mode::Unknown => format!("{}> ", "pvs?".red()),
        Mode::Off => format!("{}> ", "off".dimmed()),
    }
}

fn parse_input(input: &str) -> Result<ReplAction> {
    let Some(meta) = input.strip_prefix(':') else {
        return Ok(ReplAction::Raw(input.to_string()));
    };

    let parts: Vec<&str> = meta.split_whitespace().collect();
    let Some(command) = parts.first() else {
        return Err(anyhow!("empty command"));
    };
    let args = &parts[1..];

    let action = match command.to_lowercase().as_str() {
        "quit" | "exit" | "q" => ReplAction::Quit,
        "help" | "h" => ReplAction::Help,
        "start" => ReplAction::Dispatch(Command::StartSession),
        "stop" => ReplAction::Dispatch(Command::StopSession),
        "typecheck" | "tc" => match args {
            [file] => ReplAction::Dispatch(Command::Typecheck(FileRef::new(*file)?)),
            _ => return Err(anyhow!("usage: :typecheck <file>")),
        },
        "prove" | "pr" => match args {
            [theory, formula] => {
                ReplAction::Dispatch(Command::ProveFormula(FormulaRef::new(*theory, *formula)?))
            }
            _ => return Err(anyhow!("usage: :prove <theory> <formula>")),
        },
        "close" => match args {
            [file] => ReplAction::Dispatch(Command::CloseFile(FileRef::new(*file)?)),
            _ => return Err(anyhow!("usage: :close <file>")),
        },
        "edit" => ReplAction::EnterEditor,
        "resume" => ReplAction::ResumeProver,
        "tree" | "t" => ReplAction::ShowTree,
        "mode" | "m" => ReplAction::ShowMode,
        other => return Err(anyhow!("unknown command :{} (try :help)", other)),
    };
    Ok(action)
}

async fn execute(session: &Session, formatter: &OutputFormatter, action: ReplAction) -> Result<()> {
    match action {
        ReplAction::Dispatch(command) => session.dispatch(command).await?,
        ReplAction::Raw(line) => session.send_raw(&line).await?,
        ReplAction::EnterEditor => {
            session.enter_editor()?;
        }
        ReplAction::ResumeProver => {
            session.resume_prover()?;
        }
        ReplAction::ShowTree => formatter.output_tree(&session.tree_snapshot())?,
        ReplAction::ShowMode => formatter.info(&session.mode().label())?,
        ReplAction::Help => print_help(),
        ReplAction::Quit => {}
    }
    Ok(())
}

/// Session failures already reached the console through the bus
fn report_error(formatter: &OutputFormatter, error: &anyhow::Error) -> Result<()> {
    match error.downcast_ref::<DispatchError>() {
        Some(e) => {
            debug!("{}", e);
            Ok(())
        }
        None => formatter.error(&format!("Error: {}", error)),
    }
}
