// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prover process supervisor
//!
//! Owns the external PVS process: spawning, line transport over
//! stdin/stdout, graceful termination with a bounded wait, forced kill.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::dispatcher::QUIT_REQUEST;
use crate::error::SupervisorError;

/// Lazy line sequence of one process output stream
#[derive(Debug)]
pub struct OutputLines<R> {
    lines: Lines<BufReader<R>>,
    generation: u64,
}

/// stdout of the current prover process
pub type ProverLines = OutputLines<ChildStdout>;

/// stderr of the current prover process
pub type ProverErrors = OutputLines<ChildStderr>;

impl<R: AsyncRead + Unpin> OutputLines<R> {
    fn new(reader: R, generation: u64) -> Self {
        OutputLines {
            lines: BufReader::new(reader).lines(),
            generation,
        }
    }

    /// Process generation this sequence belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Next line, or `None` once the process closed the stream
    pub async fn next_line(&mut self) -> Result<Option<String>, SupervisorError> {
        self.lines.next_line().await.map_err(SupervisorError::Read)
    }
}

#[derive(Debug)]
struct ProverProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    generation: u64,
}

/// Lifecycle owner of the prover process
#[derive(Debug)]
pub struct ProverSupervisor {
    config: Arc<SessionConfig>,
    process: Option<ProverProcess>,
    generation: u64,
}

impl ProverSupervisor {
    pub fn new(config: Arc<SessionConfig>) -> Self {
        ProverSupervisor {
            config,
            process: None,
            generation: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    /// Generation of the current (or last) process
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Spawn the prover; returns the new process generation
    pub fn start(&mut self) -> Result<u64, SupervisorError> {
        if self.process.is_some() {
            return Err(SupervisorError::AlreadyRunning);
        }

        let executable = self.config.executable_path();
        if !executable.is_file() {
            return Err(SupervisorError::ProcessStart {
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist", executable.display()),
                ),
                executable,
            });
        }

        let mut command = Command::new(&executable);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|source| SupervisorError::ProcessStart {
                executable: executable.clone(),
                source,
            })?;

        self.generation += 1;
        info!(
            pid = ?child.id(),
            generation = self.generation,
            "Started prover {}",
            executable.display()
        );

        self.process = Some(ProverProcess {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            generation: self.generation,
        });
        Ok(self.generation)
    }

    /// Output lines of the current process; handed out once per process
    pub fn lines(&mut self) -> Option<ProverLines> {
        let process = self.process.as_mut()?;
        let stdout = process.stdout.take()?;
        Some(OutputLines::new(stdout, process.generation))
    }

    /// Error stream of the current process; handed out once per process
    pub fn stderr_lines(&mut self) -> Option<ProverErrors> {
        let process = self.process.as_mut()?;
        let stderr = process.stderr.take()?;
        Some(OutputLines::new(stderr, process.generation))
    }

    /// Write one request line
    pub async fn send(&mut self, request: &str) -> Result<(), SupervisorError> {
        let stdin = self
            .process
            .as_mut()
            .and_then(|p| p.stdin.as_mut())
            .ok_or(SupervisorError::NotRunning)?;

        debug!("-> {}", request);
        write_line(stdin, request)
            .await
            .map_err(SupervisorError::Write)
    }

    /// Exit code if the process has already terminated
    pub fn exit_code(&mut self) -> Option<i32> {
        let process = self.process.as_mut()?;
        process.child.try_wait().ok().flatten().and_then(|s| s.code())
    }

    /// Ask the prover to quit, wait up to the stop timeout, then kill it
    ///
    /// Calling this with no process running is a no-op returning `Ok(None)`.
    pub async fn stop(&mut self) -> Result<Option<ExitStatus>, SupervisorError> {
        let Some(mut process) = self.process.take() else {
            debug!("stop requested with no prover running");
            return Ok(None);
        };

        if let Some(mut stdin) = process.stdin.take() {
            if let Err(e) = write_line(&mut stdin, QUIT_REQUEST).await {
                debug!("quit request not delivered: {}", e);
            }
        }

        let grace = self.config.stop_timeout();
        match timeout(grace, process.child.wait()).await {
            Ok(Ok(status)) => {
                info!(generation = process.generation, "Prover exited: {}", status);
                Ok(Some(status))
            }
            Ok(Err(e)) => {
                warn!("waiting for prover failed ({}); killing it", e);
                kill(&mut process.child).await
            }
            Err(_) => {
                warn!("prover still running after {:?}; killing it", grace);
                kill(&mut process.child).await
            }
        }
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

async fn kill(child: &mut Child) -> Result<Option<ExitStatus>, SupervisorError> {
    child.kill().await.map_err(SupervisorError::Kill)?;
    Ok(child.try_wait().ok().flatten())
}
