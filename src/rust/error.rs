// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the session core
//!
//! Session operations return these to the caller and also publish them on
//! the message bus as `pvs-status` errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::mode::{Mode, Trigger};

/// Errors raised by the prover process supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The prover executable is missing or could not be spawned
    #[error("failed to start prover `{}`: {source}", executable.display())]
    ProcessStart {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A prover process is already held by the supervisor
    #[error("prover process is already running")]
    AlreadyRunning,

    /// No prover process is held by the supervisor
    #[error("prover process is not running")]
    NotRunning,

    /// Writing a request failed, usually because the process has exited
    #[error("failed to write to prover: {0}")]
    Write(#[source] std::io::Error),

    /// Reading the output stream failed
    #[error("failed to read from prover: {0}")]
    Read(#[source] std::io::Error),

    /// Forced termination failed
    #[error("failed to terminate prover: {0}")]
    Kill(#[source] std::io::Error),
}

/// Illegal mode state machine input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ModeError {
    #[error("cannot apply `{trigger}` in {mode} mode")]
    IllegalTransition { mode: Mode, trigger: Trigger },
}

/// Errors returned by command dispatch
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Prover command issued outside Prover mode; nothing was sent
    #[error("`{command}` is not allowed in {mode} mode")]
    IllegalMode { command: &'static str, mode: Mode },

    /// A structured request is still awaiting its prompt
    #[error("`{command}` rejected: the prover is still busy with a previous request")]
    Busy { command: &'static str },

    /// Theory, formula or file reference that cannot be sent to the prover
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown log level `{0}` (expected `debug` or `off`)")]
    UnknownLogLevel(String),

    #[error("cannot determine installation folder: {0}")]
    InstallDir(String),
}

impl DispatchError {
    /// True when the error was produced before any process contact
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DispatchError::IllegalMode { .. }
                | DispatchError::Busy { .. }
                | DispatchError::InvalidReference(_)
                | DispatchError::Mode(_)
        )
    }
}
