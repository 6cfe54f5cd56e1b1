// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Startup configuration
//!
//! Built once when the application starts and shared read-only (behind an
//! `Arc`) with the supervisor and the logger setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Legacy command line prefix selecting logger verbosity (`-loggerdebug`)
pub const LOGGER_FLAG: &str = "-logger";

/// Default prover executable name inside the installation folder
pub const DEFAULT_EXECUTABLE: &str = "pvs";

/// Logger verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Default,
    Debug,
    Off,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "off" => Ok(LogLevel::Off),
            "default" | "info" => Ok(LogLevel::Default),
            _ => Err(ConfigError::UnknownLogLevel(s.to_string())),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Default => write!(f, "default"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Off => write!(f, "off"),
        }
    }
}

impl LogLevel {
    /// `tracing_subscriber::EnvFilter` directive for this level
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Default => "pvs_editor=info,warn",
            LogLevel::Debug => "pvs_editor=debug,info",
            LogLevel::Off => "off",
        }
    }

    /// Rewrite legacy `-logger<level>` arguments into `--logger=<level>`
    ///
    /// Everything else is passed through untouched.
    pub fn normalize_args<I>(args: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        args.into_iter()
            .map(|arg| match arg.strip_prefix(LOGGER_FLAG) {
                Some(level) if !level.is_empty() && !level.starts_with('=') => {
                    format!("--logger={}", level)
                }
                _ => arg,
            })
            .collect()
    }
}

/// Immutable session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Installation folder; relative executables are resolved against it
    pub install_dir: PathBuf,

    /// Prover executable (absolute, or relative to `install_dir`)
    pub executable: PathBuf,

    /// Additional prover arguments
    pub args: Vec<String>,

    /// Working directory of the prover process
    pub working_dir: Option<PathBuf>,

    /// Graceful termination wait before the process is killed
    pub stop_timeout_ms: u64,

    /// Capacity of the message bus ring buffer
    pub bus_capacity: usize,

    /// Logger verbosity
    pub log_level: LogLevel,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            install_dir: PathBuf::from("."),
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            args: vec![],
            working_dir: None,
            stop_timeout_ms: 3000,
            bus_capacity: 1024,
            log_level: LogLevel::Default,
        }
    }
}

impl SessionConfig {
    /// Default configuration rooted at the folder the application runs from
    ///
    /// The installation folder is the parent of the directory holding the
    /// running executable (`<install>/bin/pvs-editor` → `<install>`).
    pub fn discover() -> Result<Self, ConfigError> {
        let exe = std::env::current_exe().map_err(|e| ConfigError::InstallDir(e.to_string()))?;
        let install_dir = install_dir_for(&exe)?;
        Ok(SessionConfig {
            install_dir,
            ..Default::default()
        })
    }

    /// Absolute path of the prover executable
    pub fn executable_path(&self) -> PathBuf {
        if self.executable.is_absolute() {
            self.executable.clone()
        } else {
            self.install_dir.join(&self.executable)
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

fn install_dir_for(exe: &Path) -> Result<PathBuf, ConfigError> {
    let bin_dir = exe
        .parent()
        .ok_or_else(|| ConfigError::InstallDir(format!("{} has no parent", exe.display())))?;
    Ok(bin_dir.parent().unwrap_or(bin_dir).to_path_buf())
}
