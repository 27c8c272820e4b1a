//! Cache directories ("layers") and their fingerprint sidecars.
//!
//! A layer named `application` under `layers/` is the directory
//! `layers/application/` plus the sidecar `layers/application.json`. The
//! sidecar is written only after the layer's contents are complete and
//! verified, so its presence marks a finished layer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::LAYER_METADATA_VERSION;
use crate::fingerprint::Fingerprint;
use crate::util::hash::{ContentHash, HashError, hash_directory};

#[derive(Debug, Error)]
pub enum LayerError {
  #[error("failed to reset layer {path}: {source}")]
  Reset {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read layer metadata {path}: {source}")]
  ReadMetadata {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse layer metadata {path}: {source}")]
  ParseMetadata {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize layer metadata: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write layer metadata {path}: {source}")]
  WriteMetadata {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),
}

/// Contents of a layer sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMetadata {
  pub version: u32,
  /// Digest of `metadata`.
  pub digest: ContentHash,
  /// Hash of the layer directory at the time it was completed.
  pub content_hash: ContentHash,
  pub metadata: Fingerprint,
}

/// A named cache directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
  pub name: String,
  pub path: PathBuf,
  pub metadata_path: PathBuf,
}

impl Layer {
  pub fn new(layers_dir: &Path, name: &str) -> Self {
    Self {
      name: name.to_string(),
      path: layers_dir.join(name),
      metadata_path: layers_dir.join(format!("{}.json", name)),
    }
  }

  /// Read the sidecar. `None` if the layer was never completed.
  pub fn read_metadata(&self) -> Result<Option<LayerMetadata>, LayerError> {
    let content = match fs::read_to_string(&self.metadata_path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => {
        return Err(LayerError::ReadMetadata {
          path: self.metadata_path.clone(),
          source,
        });
      }
    };

    let metadata = serde_json::from_str(&content).map_err(|source| LayerError::ParseMetadata {
      path: self.metadata_path.clone(),
      source,
    })?;
    Ok(Some(metadata))
  }

  /// Whether the layer holds verified output for `fingerprint`.
  ///
  /// Anything short of a completed layer with a matching digest and intact
  /// contents is a miss. Unreadable sidecars and corrupted contents are
  /// logged.
  pub fn is_cached(&self, fingerprint: &Fingerprint) -> bool {
    let metadata = match self.read_metadata() {
      Ok(Some(metadata)) => metadata,
      Ok(None) => {
        debug!(layer = %self.name, "no layer metadata");
        return false;
      }
      Err(e) => {
        warn!(layer = %self.name, error = %e, "unreadable layer metadata, will rebuild");
        return false;
      }
    };

    let expected = fingerprint.digest();
    if metadata.digest != expected {
      debug!(
        layer = %self.name,
        expected = %expected,
        actual = %metadata.digest,
        "fingerprint changed"
      );
      return false;
    }

    if !self.path.is_dir() {
      warn!(layer = %self.name, path = %self.path.display(), "layer directory missing, will rebuild");
      return false;
    }

    match self.content_hash() {
      Ok(actual) if actual == metadata.content_hash => true,
      Ok(actual) => {
        warn!(
          layer = %self.name,
          expected = %metadata.content_hash,
          actual = %actual,
          "layer contents corrupted, will rebuild"
        );
        false
      }
      Err(e) => {
        warn!(layer = %self.name, error = %e, "failed to hash layer contents, will rebuild");
        false
      }
    }
  }

  /// Remove the layer and its sidecar, then recreate an empty directory.
  pub fn reset(&self) -> Result<(), LayerError> {
    let reset_err = |path: &Path| {
      let path = path.to_path_buf();
      move |source| LayerError::Reset { path, source }
    };

    match fs::remove_file(&self.metadata_path) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(reset_err(&self.metadata_path)(e)),
    }
    if fs::symlink_metadata(&self.path).is_ok() {
      crate::util::fs::remove_path(&self.path).map_err(reset_err(&self.path))?;
    }
    fs::create_dir_all(&self.path).map_err(reset_err(&self.path))?;

    debug!(layer = %self.name, path = %self.path.display(), "reset layer");
    Ok(())
  }

  pub fn content_hash(&self) -> Result<ContentHash, HashError> {
    hash_directory(&self.path, &[])
  }

  /// Hash the layer's current contents and write the sidecar atomically.
  pub fn complete(&self, fingerprint: &Fingerprint) -> Result<LayerMetadata, LayerError> {
    let metadata = LayerMetadata {
      version: LAYER_METADATA_VERSION,
      digest: fingerprint.digest(),
      content_hash: self.content_hash()?,
      metadata: fingerprint.clone(),
    };

    let content = serde_json::to_string_pretty(&metadata).map_err(LayerError::Serialize)?;
    let temp_path = self.metadata_path.with_extension("json.tmp");
    let write_err = |source| LayerError::WriteMetadata {
      path: self.metadata_path.clone(),
      source,
    };
    fs::write(&temp_path, content).map_err(write_err)?;
    fs::rename(&temp_path, &self.metadata_path).map_err(write_err)?;

    debug!(layer = %self.name, digest = %metadata.digest, "layer completed");
    Ok(metadata)
  }
}
