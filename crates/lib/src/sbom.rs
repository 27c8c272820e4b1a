//! Build SBOM generation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::exec::{ExecError, Execution, Executor};

#[derive(Debug, Error)]
pub enum SbomError {
  #[error("at least one SBOM format is required")]
  NoFormats,

  #[error("failed to scan {path}: {source}")]
  Scan {
    path: PathBuf,
    #[source]
    source: ExecError,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SbomFormat {
  CycloneDxJson,
  SyftJson,
}

impl SbomFormat {
  /// The scanner's name for the format.
  pub fn id(&self) -> &'static str {
    match self {
      SbomFormat::CycloneDxJson => "cyclonedx-json",
      SbomFormat::SyftJson => "syft-json",
    }
  }

  pub fn extension(&self) -> &'static str {
    match self {
      SbomFormat::CycloneDxJson => "cdx.json",
      SbomFormat::SyftJson => "syft.json",
    }
  }
}

/// Produces a bill of materials for a build's inputs.
#[async_trait]
pub trait SbomScanner: Send + Sync {
  async fn scan_build(&self, root: &Path, formats: &[SbomFormat]) -> Result<(), SbomError>;
}

const SYFT_COMMAND: &str = "syft";

/// Runs `syft` and writes `build.sbom.<ext>` files into the layers directory.
pub struct SyftScanner {
  executor: Arc<dyn Executor>,
  layers_dir: PathBuf,
  command: String,
}

impl SyftScanner {
  pub fn new(executor: Arc<dyn Executor>, layers_dir: impl Into<PathBuf>) -> Self {
    Self {
      executor,
      layers_dir: layers_dir.into(),
      command: SYFT_COMMAND.to_string(),
    }
  }

  /// Use a different `syft` executable.
  pub fn with_command(mut self, command: impl Into<String>) -> Self {
    self.command = command.into();
    self
  }

  pub fn output_path(&self, format: SbomFormat) -> PathBuf {
    self.layers_dir.join(format!("build.sbom.{}", format.extension()))
  }

  fn execution(&self, root: &Path, formats: &[SbomFormat]) -> Execution {
    let mut args = vec![
      "packages".to_string(),
      format!("dir:{}", root.display()),
      "--quiet".to_string(),
    ];
    for format in formats {
      args.push("--output".to_string());
      args.push(format!("{}={}", format.id(), self.output_path(*format).display()));
    }
    Execution::new(&self.command, args, root)
  }
}

#[async_trait]
impl SbomScanner for SyftScanner {
  async fn scan_build(&self, root: &Path, formats: &[SbomFormat]) -> Result<(), SbomError> {
    if formats.is_empty() {
      return Err(SbomError::NoFormats);
    }

    info!(path = %root.display(), "Generating SBOM");
    self
      .executor
      .execute(&self.execution(root, formats))
      .await
      .map_err(|source| SbomError::Scan {
        path: root.to_path_buf(),
        source,
      })?;
    Ok(())
  }
}
