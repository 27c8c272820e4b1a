//! Build tool version probing.

use std::path::Path;

use tracing::debug;

use super::{ExecError, Execution, Executor};

const UNKNOWN_VERSION: &str = "unknown";

/// A command whose output names the build tool's version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionProbe {
  pub command: String,
  pub args: Vec<String>,
}

impl Default for VersionProbe {
  fn default() -> Self {
    Self {
      command: "javac".to_string(),
      args: vec!["-version".to_string()],
    }
  }
}

impl VersionProbe {
  pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      command: command.into(),
      args,
    }
  }

  /// Run the probe in `dir` and parse its combined output.
  pub async fn probe(&self, executor: &dyn Executor, dir: &Path) -> Result<String, ExecError> {
    let execution = Execution::new(&self.command, self.args.clone(), dir).capture();
    let output = executor.execute(&execution).await?;
    let version = parse_version(&output);
    debug!(command = %execution.display(), version = %version, "probed tool version");
    Ok(version)
  }
}

/// `javac 17.0.2` → `17.0.2`, `1.2.3` → `1.2.3`, anything else → `unknown`.
pub fn parse_version(output: &str) -> String {
  let tokens: Vec<&str> = output.trim().split(' ').collect();
  match tokens.as_slice() {
    [_, version] => version.to_string(),
    [version] if !version.is_empty() => version.to_string(),
    _ => UNKNOWN_VERSION.to_string(),
  }
}
