//! Command execution.
//!
//! The orchestrator never spawns processes itself; it hands an [`Execution`]
//! to an [`Executor`]. [`CommandExecutor`] is the tokio-backed default.

pub mod version;

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

pub use version::VersionProbe;

#[derive(Debug, Error)]
pub enum ExecError {
  #[error("failed to launch {command}: {source}")]
  Launch {
    command: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read output of {command}: {source}")]
  Output {
    command: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{command} {}", exit_description(.code))]
  Failed { command: String, code: Option<i32> },
}

fn exit_description(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exited with code {}", code),
    None => "terminated by signal".to_string(),
  }
}

/// What to do with a command's stdout and stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
  /// Forward each line to the logger as it arrives.
  #[default]
  Log,
  /// Collect both streams and return them (stdout first).
  Capture,
}

/// A single command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
  pub command: String,
  pub args: Vec<String>,
  pub dir: PathBuf,
  pub output: OutputMode,
}

impl Execution {
  pub fn new(command: impl Into<String>, args: Vec<String>, dir: impl Into<PathBuf>) -> Self {
    Self {
      command: command.into(),
      args,
      dir: dir.into(),
      output: OutputMode::Log,
    }
  }

  pub fn capture(mut self) -> Self {
    self.output = OutputMode::Capture;
    self
  }

  /// The command line, for messages.
  pub fn display(&self) -> String {
    std::iter::once(self.command.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// Runs commands to completion.
///
/// Returns the captured output for [`OutputMode::Capture`] and an empty
/// string for [`OutputMode::Log`]. A non-zero exit is an error.
#[async_trait]
pub trait Executor: Send + Sync {
  async fn execute(&self, execution: &Execution) -> Result<String, ExecError>;
}

/// Executes commands as child processes of the current one.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandExecutor;

#[async_trait]
impl Executor for CommandExecutor {
  async fn execute(&self, execution: &Execution) -> Result<String, ExecError> {
    let command_line = execution.display();
    info!(command = %command_line, dir = %execution.dir.display(), "executing command");

    let mut child = Command::new(&execution.command)
      .args(&execution.args)
      .current_dir(&execution.dir)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|source| ExecError::Launch {
        command: command_line.clone(),
        source,
      })?;

    let mode = execution.output;
    let stdout = child.stdout.take().map(|s| drain(s, mode, "stdout"));
    let stderr = child.stderr.take().map(|s| drain(s, mode, "stderr"));

    let (out, err) = tokio::join!(join_optional(stdout), join_optional(stderr));
    let output_err = |source| ExecError::Output {
      command: command_line.clone(),
      source,
    };
    let out = out.map_err(output_err)?;
    let err = err.map_err(output_err)?;

    let status = child.wait().await.map_err(|source| ExecError::Launch {
      command: command_line.clone(),
      source,
    })?;

    if !status.success() {
      return Err(ExecError::Failed {
        command: command_line,
        code: status.code(),
      });
    }

    debug!(command = %command_line, "command finished");
    Ok(format!("{}{}", out, err))
  }
}

async fn drain<R: AsyncRead + Unpin>(stream: R, mode: OutputMode, name: &'static str) -> std::io::Result<String> {
  let mut reader = BufReader::new(stream);
  let mut buf = Vec::new();
  let mut captured = String::new();
  loop {
    buf.clear();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
      break;
    }
    let line = String::from_utf8_lossy(&buf);
    let line = line.trim_end_matches(['\n', '\r']);
    match mode {
      OutputMode::Log => info!(stream = name, "{}", line),
      OutputMode::Capture => {
        captured.push_str(line);
        captured.push('\n');
      }
    }
  }
  Ok(captured)
}

async fn join_optional<F>(future: Option<F>) -> std::io::Result<String>
where
  F: std::future::Future<Output = std::io::Result<String>>,
{
  match future {
    Some(future) => future.await,
    None => Ok(String::new()),
  }
}
