// Translator process execution
//
// - locate: finding the translator executable
// - ProcessRunner: spawning one command, streaming its output, cancellation

pub mod locate;

pub use locate::{ExecutableLocator, DEFAULT_EXECUTABLE};

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::CancellationSignal;
use crate::command::GstCommand;
use crate::console::Console;
use crate::error::{Result, GstError};

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("ANSI escape pattern is valid")
});

/// Remove ANSI escape sequences from a line of output.
pub fn strip_ansi(line: &str) -> String {
    ANSI_ESCAPE.replace_all(line, "").into_owned()
}

/// How one translator run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed { code: Option<i32> },
    Cancelled,
    Error(String),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Timeouts used while running and stopping a child process.
#[derive(Debug, Clone, Copy)]
pub struct RunnerTimeouts {
    /// How long a terminated child gets before it is killed
    pub terminate_grace: Duration,
    /// Bounded wait for exit once output has ended
    pub exit_wait: Duration,
}

impl Default for RunnerTimeouts {
    fn default() -> Self {
        Self {
            terminate_grace: Duration::from_secs(3),
            exit_wait: Duration::from_secs(1),
        }
    }
}

/// Runs translator commands one at a time, forwarding output to a [`Console`].
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    console: Console,
    timeouts: RunnerTimeouts,
}

impl ProcessRunner {
    pub fn new(console: Console) -> Self {
        Self {
            console,
            timeouts: RunnerTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: RunnerTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Execute `command` for the zero-based `pair` and report how it ended.
    ///
    /// Errors never escape: spawn and read failures are logged and reported
    /// as [`RunOutcome::Error`].
    pub async fn run(&self, command: &GstCommand, pair: usize, cancel: &CancellationSignal) -> RunOutcome {
        let number = pair + 1;
        self.console.status(format!("Executing: {}", command));

        let outcome = match self.execute(command, pair, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => RunOutcome::Error(e.to_string()),
        };

        match &outcome {
            RunOutcome::Succeeded => {
                self.console.status(format!("Pair {} processed successfully", number));
            }
            RunOutcome::Failed { code } => {
                let code = code.map_or_else(|| "signal".to_string(), |code| code.to_string());
                self.console
                    .status(format!("Pair {} finished with error (code: {})", number, code));
            }
            RunOutcome::Cancelled => {
                self.console.status(format!("Pair {} cancelled", number));
            }
            RunOutcome::Error(message) => {
                warn!("Translator run for pair {} failed: {}", number, message);
                self.console
                    .status(format!("Error executing command for pair {}: {}", number, message));
            }
        }

        outcome
    }

    async fn execute(&self, command: &GstCommand, pair: usize, cancel: &CancellationSignal) -> Result<RunOutcome> {
        debug!("Spawning translator: {:?} {:?}", command.program, command.args);

        // stdout and stderr share one pipe so lines arrive in the order the child wrote them.
        let (reader, writer) = std::io::pipe()?;
        let stderr_writer = writer.try_clone()?;

        // The Command holds the parent's copies of the write end; it is dropped
        // right after spawning so the reader sees EOF once the child exits.
        let mut child = {
            let mut process = Command::new(&command.program);
            process
                .args(&command.args)
                .env("PYTHONIOENCODING", "utf-8")
                .env("PYTHONUTF8", "1")
                .stdin(Stdio::null())
                .stdout(writer)
                .stderr(stderr_writer)
                .kill_on_drop(true);
            process
                .spawn()
                .map_err(|e| GstError::Execution(format!("Failed to start {}: {}", command.program.display(), e)))?
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        std::thread::Builder::new()
            .name(format!("gst-output-{}", pair + 1))
            .spawn(move || forward_lines(reader, tx))?;

        loop {
            if cancel.is_cancelled() {
                self.console.status(format!("Canceling process for pair {}", pair + 1));
                self.terminate(&mut child, pair).await;
                return Ok(RunOutcome::Cancelled);
            }

            tokio::select! {
                line = rx.recv() => match line {
                    Some(line) => self.console.output(pair, line),
                    None => break,
                },
                _ = cancel.cancelled() => {}
            }
        }

        let status = match tokio::time::timeout(self.timeouts.exit_wait, child.wait()).await {
            Ok(status) => status?,
            Err(_) if cancel.is_cancelled() => {
                self.terminate(&mut child, pair).await;
                return Ok(RunOutcome::Cancelled);
            }
            Err(_) => child.wait().await?,
        };

        Ok(outcome_for(status))
    }

    /// Ask the child to stop, escalating to a kill after the grace period.
    async fn terminate(&self, child: &mut Child, pair: usize) {
        request_termination(child);

        match tokio::time::timeout(self.timeouts.terminate_grace, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                self.console.status(format!("Force killing process for pair {}", pair + 1));
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill translator process: {}", e);
                }
            }
        }
        info!("Translator process for pair {} stopped", pair + 1);
    }
}

fn outcome_for(status: ExitStatus) -> RunOutcome {
    if status.success() {
        RunOutcome::Succeeded
    } else {
        RunOutcome::Failed { code: status.code() }
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
    match child.id() {
        Some(pid) => {
            // SAFETY: plain kill(2) on a pid we spawned and have not reaped yet.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                warn!("SIGTERM to pid {} failed: {}", pid, std::io::Error::last_os_error());
            }
        }
        None => debug!("Translator process already exited"),
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("Failed to stop translator process: {}", e);
    }
}

/// Read `reader` line by line, decode lossily, strip ANSI escapes and send
/// every non-empty line.
///
/// Blocking; runs on its own thread until the write end is closed.
fn forward_lines<R: Read>(reader: R, tx: mpsc::UnboundedSender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let decoded = String::from_utf8_lossy(&buf);
                let line = strip_ansi(decoded.trim_end());
                if !line.is_empty() && tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(format!("Error reading output: {}", e));
                break;
            }
        }
    }
}
