use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::Application;
use crate::cache::DependencyCache;
use crate::consts::APPLICATION_LAYER_NAME;
use crate::exec::{ExecError, Executor, VersionProbe};
use crate::fingerprint::{
  ARGUMENTS_KEY, FILES_KEY, Fingerprint, FingerprintError, PATTERN_KEY, TOOL_VERSION_KEY, list_files,
};
use crate::layer::Layer;
use crate::provenance::Ledger;
use crate::resolve::ArtifactResolver;
use crate::sbom::SbomScanner;
use crate::source::SourceRetention;

#[derive(Debug, Error)]
pub enum FactoryError {
  #[error("unable to create file listing for {path}: {source}")]
  Listing {
    path: PathBuf,
    #[source]
    source: FingerprintError,
  },

  #[error("unable to resolve {path}: {source}")]
  Canonicalize {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("layers directory {layers} must be outside the workspace {workspace}")]
  LayersInWorkspace { layers: PathBuf, workspace: PathBuf },

  #[error("unable to determine tool version: {0}")]
  Probe(#[source] ExecError),

  #[error("failed to generate expected metadata: {0}")]
  Metadata(#[source] FingerprintError),
}

/// Everything that describes one run.
#[derive(Debug, Clone)]
pub struct ApplicationOptions {
  pub workspace: PathBuf,
  pub layers_dir: PathBuf,
  pub command: String,
  pub arguments: Vec<String>,
  pub resolver: ArtifactResolver,
  pub cache: DependencyCache,
  pub retention: SourceRetention,
  /// Merged into the fingerprint last; may replace built-in keys.
  pub additional_metadata: BTreeMap<String, Value>,
}

/// Builds [`Application`]s with their expected fingerprint.
#[derive(Clone)]
pub struct ApplicationFactory {
  executor: Arc<dyn Executor>,
  version_probe: VersionProbe,
}

impl ApplicationFactory {
  pub fn new(executor: Arc<dyn Executor>) -> Self {
    Self {
      executor,
      version_probe: VersionProbe::default(),
    }
  }

  pub fn with_version_probe(mut self, version_probe: VersionProbe) -> Self {
    self.version_probe = version_probe;
    self
  }

  pub async fn new_application(
    &self,
    options: ApplicationOptions,
    sbom: Arc<dyn SbomScanner>,
    ledger: Arc<dyn Ledger>,
  ) -> Result<Application, FactoryError> {
    ensure_layers_outside(&options.layers_dir, &options.workspace)?;
    let fingerprint = self.expected_fingerprint(&options).await?;
    let layer = Layer::new(&options.layers_dir, APPLICATION_LAYER_NAME);
    info!(
      workspace = %options.workspace.display(),
      layer = %layer.path.display(),
      digest = %fingerprint.digest(),
      "computed fingerprint"
    );

    Ok(Application {
      workspace: options.workspace,
      command: options.command,
      arguments: options.arguments,
      resolver: options.resolver,
      layer,
      fingerprint,
      cache: options.cache,
      retention: options.retention,
      executor: self.executor.clone(),
      sbom,
      ledger,
    })
  }

  /// The fingerprint for the workspace as it is right now.
  pub async fn expected_fingerprint(&self, options: &ApplicationOptions) -> Result<Fingerprint, FactoryError> {
    let files = list_files(&options.workspace).map_err(|source| FactoryError::Listing {
      path: options.workspace.clone(),
      source,
    })?;
    debug!(count = files.len(), "listed workspace files");

    let version = self
      .version_probe
      .probe(self.executor.as_ref(), &options.workspace)
      .await
      .map_err(FactoryError::Probe)?;

    let mut fingerprint = Fingerprint::new();
    fingerprint.insert(FILES_KEY, files).map_err(FactoryError::Metadata)?;
    fingerprint
      .insert(ARGUMENTS_KEY, &options.arguments)
      .map_err(FactoryError::Metadata)?;
    fingerprint
      .insert(PATTERN_KEY, options.resolver.pattern())
      .map_err(FactoryError::Metadata)?;
    fingerprint
      .insert(TOOL_VERSION_KEY, version)
      .map_err(FactoryError::Metadata)?;
    fingerprint.extend(options.additional_metadata.clone());

    Ok(fingerprint)
  }
}

/// Layers may not live inside (or be) the workspace.
fn ensure_layers_outside(layers_dir: &Path, workspace: &Path) -> Result<(), FactoryError> {
  let workspace = dunce::canonicalize(workspace).map_err(|source| FactoryError::Canonicalize {
    path: workspace.to_path_buf(),
    source,
  })?;
  let layers = canonicalize_lenient(layers_dir)?;
  if layers.starts_with(&workspace) {
    return Err(FactoryError::LayersInWorkspace { layers, workspace });
  }
  Ok(())
}

/// Canonicalize the longest existing prefix of `path` and re-append the rest.
fn canonicalize_lenient(path: &Path) -> Result<PathBuf, FactoryError> {
  let mut missing = Vec::new();
  let mut existing = path;
  loop {
    match dunce::canonicalize(existing) {
      Ok(base) => return Ok(missing.iter().rev().fold(base, |acc: PathBuf, part| acc.join(part))),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
          return Err(FactoryError::Canonicalize {
            path: path.to_path_buf(),
            source: e,
          });
        };
        missing.push(name);
        existing = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
      }
      Err(source) => {
        return Err(FactoryError::Canonicalize {
          path: path.to_path_buf(),
          source,
        });
      }
    }
  }
}
