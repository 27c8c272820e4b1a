//! Build-and-cache orchestration.
//!
//! An [`Application`] runs one pass of the pipeline:
//!
//! ```text
//! cache hit ─────────────────────────────┐
//! cache miss → build → resolve → capture ┴→ scan → record → purge → restore
//! ```
//!
//! The workspace is purged only after the captured copy has been verified
//! against the originals and the layer sidecar has been written. Every
//! failure is terminal for the run; a failure while restoring leaves the
//! workspace without its sources.

mod factory;

pub use factory::{ApplicationFactory, ApplicationOptions, FactoryError};

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{CacheError, DependencyCache};
use crate::consts::ARCHIVE_NAME;
use crate::exec::{ExecError, Execution, Executor};
use crate::fingerprint::Fingerprint;
use crate::layer::{Layer, LayerError};
use crate::provenance::{Ledger, ProvenanceError};
use crate::resolve::{ArtifactResolver, ResolveError};
use crate::sbom::{SbomError, SbomFormat, SbomScanner};
use crate::source::{SourceError, SourceRetention};
use crate::util::fs::{copy_file, copy_path, extract_zip, list_dir};
use crate::util::hash::{ContentHash, HashError, hash_file, hash_resolved_directory};

/// Coarse classification of orchestration failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
  PatternMalformed,
  ResolutionAmbiguous,
  ResolutionEmpty,
  BuildExecutionFailed,
  CaptureIOFailed,
  PurgeIOFailed,
  RestoreIOFailed,
  ScanOrLedgerFailed,
}

#[derive(Debug, Error)]
pub enum ApplicationError {
  #[error("error running build: {0}")]
  Build(#[source] ExecError),

  #[error("unable to resolve artifacts: {0}")]
  Resolve(#[from] ResolveError),

  #[error("unable to prepare layer: {0}")]
  Layer(#[source] LayerError),

  #[error("unable to copy {src} to {dst}: {source}")]
  Capture {
    src: PathBuf,
    dst: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("more than one artifact is named {name}")]
  DuplicateName { name: String },

  #[error("unable to verify copy of {path}: {source}")]
  VerifyHash {
    path: PathBuf,
    #[source]
    source: HashError,
  },

  #[error("copy of {src} at {dst} does not match (expected {expected}, found {actual})")]
  VerifyMismatch {
    src: PathBuf,
    dst: PathBuf,
    expected: ContentHash,
    actual: ContentHash,
  },

  #[error("unable to create build SBOM: {0}")]
  Sbom(#[from] SbomError),

  #[error("unable to generate build dependencies: {0}")]
  Dependencies(#[from] CacheError),

  #[error("unable to record build dependencies: {0}")]
  Ledger(#[from] ProvenanceError),

  #[error("unable to remove source code: {0}")]
  Purge(#[from] SourceError),

  #[error("unable to restore {path}: {source}")]
  Restore {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl ApplicationError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ApplicationError::Build(_) => ErrorKind::BuildExecutionFailed,
      ApplicationError::Resolve(e) => match e {
        ResolveError::BadPattern { .. } | ResolveError::Words { .. } => ErrorKind::PatternMalformed,
        ResolveError::Ambiguous { .. } | ResolveError::Interest { .. } => ErrorKind::ResolutionAmbiguous,
        ResolveError::Empty { .. } | ResolveError::ListRoot { .. } => ErrorKind::ResolutionEmpty,
      },
      ApplicationError::Layer(_)
      | ApplicationError::Capture { .. }
      | ApplicationError::DuplicateName { .. }
      | ApplicationError::VerifyHash { .. }
      | ApplicationError::VerifyMismatch { .. } => ErrorKind::CaptureIOFailed,
      ApplicationError::Sbom(_) | ApplicationError::Dependencies(_) | ApplicationError::Ledger(_) => {
        ErrorKind::ScanOrLedgerFailed
      }
      ApplicationError::Purge(_) => ErrorKind::PurgeIOFailed,
      ApplicationError::Restore { .. } => ErrorKind::RestoreIOFailed,
    }
  }
}

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  CacheHit,
  CacheMiss,
  Building,
  Resolving,
  Capturing,
  SbomScanned,
  ProvenanceRecorded,
  Purged,
  Restored,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::CacheHit => "cache-hit",
      Stage::CacheMiss => "cache-miss",
      Stage::Building => "building",
      Stage::Resolving => "resolving",
      Stage::Capturing => "capturing",
      Stage::SbomScanned => "sbom-scanned",
      Stage::ProvenanceRecorded => "provenance-recorded",
      Stage::Purged => "purged",
      Stage::Restored => "restored",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheOutcome {
  Hit,
  Miss,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contribution {
  pub outcome: CacheOutcome,
  pub layer_path: PathBuf,
  /// Top-level workspace entries created by restoration.
  pub restored: Vec<PathBuf>,
}

/// One build-and-cache run over a workspace.
///
/// Built by [`ApplicationFactory::new_application`], which computes the
/// fingerprint before anything in the workspace changes.
pub struct Application {
  pub workspace: PathBuf,
  pub command: String,
  pub arguments: Vec<String>,
  pub resolver: ArtifactResolver,
  pub layer: Layer,
  pub fingerprint: Fingerprint,
  pub cache: DependencyCache,
  pub retention: SourceRetention,
  executor: Arc<dyn Executor>,
  sbom: Arc<dyn SbomScanner>,
  ledger: Arc<dyn Ledger>,
}

impl fmt::Debug for Application {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Application")
      .field("workspace", &self.workspace)
      .field("command", &self.command)
      .field("arguments", &self.arguments)
      .field("layer", &self.layer)
      .finish_non_exhaustive()
  }
}

impl Application {
  /// Run the pipeline.
  pub async fn contribute(&self) -> Result<Contribution, ApplicationError> {
    let outcome = if self.layer.is_cached(&self.fingerprint) {
      enter(Stage::CacheHit);
      info!(layer = %self.layer.name, "Reusing cached layer");
      CacheOutcome::Hit
    } else {
      enter(Stage::CacheMiss);
      self.build().await?;
      CacheOutcome::Miss
    };

    self
      .sbom
      .scan_build(&self.workspace, &[SbomFormat::CycloneDxJson, SbomFormat::SyftJson])
      .await?;
    enter(Stage::SbomScanned);

    let entry = self.cache.as_provenance_entry()?;
    self.ledger.record(entry)?;
    enter(Stage::ProvenanceRecorded);

    let removed = self.retention.purge(&self.workspace)?;
    debug!(count = removed.len(), "removed source paths");
    enter(Stage::Purged);

    let restored = self.restore()?;
    enter(Stage::Restored);

    Ok(Contribution {
      outcome,
      layer_path: self.layer.path.clone(),
      restored,
    })
  }

  async fn build(&self) -> Result<(), ApplicationError> {
    self.layer.reset().map_err(ApplicationError::Layer)?;

    enter(Stage::Building);
    let command_name = Path::new(&self.command)
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_else(|| self.command.clone());
    info!("Executing {} {}", command_name, self.arguments.join(" "));
    let execution = Execution::new(&self.command, self.arguments.clone(), &self.workspace);
    self.executor.execute(&execution).await.map_err(ApplicationError::Build)?;

    enter(Stage::Resolving);
    let artifacts = self.resolver.resolve_many(&self.workspace)?;

    enter(Stage::Capturing);
    self.capture(&artifacts)?;
    self
      .layer
      .complete(&self.fingerprint)
      .map_err(ApplicationError::Layer)?;
    Ok(())
  }

  /// Copy the artifacts into the layer and verify every copy.
  fn capture(&self, artifacts: &[PathBuf]) -> Result<(), ApplicationError> {
    if let [artifact] = artifacts {
      if fs::metadata(artifact).map(|m| m.is_file()).unwrap_or(false) {
        let dst = self.layer.path.join(ARCHIVE_NAME);
        info!(artifact = %artifact.display(), "Copying artifact to {}", ARCHIVE_NAME);
        copy_file(artifact, &dst).map_err(|source| ApplicationError::Capture {
          src: artifact.clone(),
          dst: dst.clone(),
          source,
        })?;
        return verify(artifact, &dst);
      }
    }

    let mut names = HashSet::new();
    for artifact in artifacts {
      let name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
      if !names.insert(name.clone()) {
        return Err(ApplicationError::DuplicateName { name });
      }

      let dst = self.layer.path.join(&name);
      info!(artifact = %artifact.display(), "Copying artifact to {}", name);
      copy_path(artifact, &dst).map_err(|source| ApplicationError::Capture {
        src: artifact.clone(),
        dst: dst.clone(),
        source,
      })?;
      verify(artifact, &dst)?;
    }
    Ok(())
  }

  /// Populate the workspace from the layer.
  fn restore(&self) -> Result<Vec<PathBuf>, ApplicationError> {
    let restore_err = |path: &Path| {
      let path = path.to_path_buf();
      move |source| ApplicationError::Restore { path, source }
    };

    let before: HashSet<PathBuf> = list_dir(&self.workspace)
      .map_err(restore_err(&self.workspace))?
      .into_iter()
      .collect();

    let archive = self.layer.path.join(ARCHIVE_NAME);
    if archive.is_file() {
      info!(archive = %archive.display(), "Extracting application archive");
      extract_zip(&archive, &self.workspace).map_err(restore_err(&archive))?;
    } else {
      for entry in list_dir(&self.layer.path).map_err(restore_err(&self.layer.path))? {
        let Some(name) = entry.file_name() else {
          continue;
        };
        debug!(entry = %entry.display(), "restoring layer entry");
        copy_path(&entry, &self.workspace.join(name)).map_err(restore_err(&entry))?;
      }
    }

    Ok(
      list_dir(&self.workspace)
        .map_err(restore_err(&self.workspace))?
        .into_iter()
        .filter(|p| !before.contains(p))
        .collect(),
    )
  }
}

fn enter(stage: Stage) {
  info!(stage = %stage, "entering stage");
}

fn verify(src: &Path, dst: &Path) -> Result<(), ApplicationError> {
  let hash = |path: &Path| {
    let result = if fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false) {
      hash_resolved_directory(path)
    } else {
      hash_file(path)
    };
    result.map_err(|source| ApplicationError::VerifyHash {
      path: path.to_path_buf(),
      source,
    })
  };

  let expected = hash(src)?;
  let actual = hash(dst)?;
  if expected != actual {
    return Err(ApplicationError::VerifyMismatch {
      src: src.to_path_buf(),
      dst: dst.to_path_buf(),
      expected,
      actual,
    });
  }
  debug!(path = %dst.display(), hash = %actual, "verified capture");
  Ok(())
}
