//! Cache fingerprints.
//!
//! A fingerprint is an ordered key/value document describing everything a
//! build's output depends on: the workspace listing, the build arguments,
//! the artifact pattern, the tool version and caller-supplied extras. Two
//! runs with equal fingerprints are allowed to share cached output.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use walkdir::WalkDir;

use crate::util::hash::{ContentHash, hash_bytes};

pub const FILES_KEY: &str = "files";
pub const ARGUMENTS_KEY: &str = "arguments";
pub const PATTERN_KEY: &str = "artifact-pattern";
pub const TOOL_VERSION_KEY: &str = "tool-version";

#[derive(Debug, Error)]
pub enum FingerprintError {
  #[error("failed to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to stat {path}: {source}")]
  Metadata {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize fingerprint value for {key}: {source}")]
  Serialize {
    key: String,
    #[source]
    source: serde_json::Error,
  },
}

/// One regular file (or symlink) in a workspace listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
  /// Workspace-relative, `/`-separated.
  pub path: String,
  pub size: u64,
  /// Nanoseconds since the Unix epoch; 0 when unavailable.
  pub mtime: u64,
}

/// List every non-directory entry under `root`, sorted by path.
///
/// Symlinks are listed, not followed.
pub fn list_files(root: &Path) -> Result<Vec<FileEntry>, FingerprintError> {
  let mut entries = Vec::new();

  for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|source| FingerprintError::Walk {
      path: root.to_path_buf(),
      source,
    })?;
    if entry.file_type().is_dir() {
      continue;
    }

    let metadata = fs::symlink_metadata(entry.path()).map_err(|source| FingerprintError::Metadata {
      path: entry.path().to_path_buf(),
      source,
    })?;
    let mtime = metadata
      .modified()
      .ok()
      .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
      .map(|d| d.as_nanos() as u64)
      .unwrap_or(0);

    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
    let path = rel
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");

    entries.push(FileEntry {
      path,
      size: metadata.len(),
      mtime,
    });
  }

  entries.sort_by(|a, b| a.path.cmp(&b.path));
  Ok(entries)
}

/// The expected cache metadata of a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint {
  metadata: BTreeMap<String, Value>,
}

impl Fingerprint {
  pub fn new() -> Self {
    Self::default()
  }

  /// Set `key`, replacing any previous value.
  pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<(), FingerprintError> {
    let key = key.into();
    let value = serde_json::to_value(value).map_err(|source| FingerprintError::Serialize {
      key: key.clone(),
      source,
    })?;
    self.metadata.insert(key, value);
    Ok(())
  }

  /// Merge `extra` over the current keys.
  pub fn extend(&mut self, extra: BTreeMap<String, Value>) {
    self.metadata.extend(extra);
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.metadata.get(key)
  }

  pub fn metadata(&self) -> &BTreeMap<String, Value> {
    &self.metadata
  }

  /// SHA-256 of the canonical (key-sorted) JSON encoding.
  pub fn digest(&self) -> ContentHash {
    hash_bytes(Value::Object(self.metadata.clone().into_iter().collect()).to_string().as_bytes())
  }
}
