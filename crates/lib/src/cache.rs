//! The build tool's dependency cache.
//!
//! Dependency directories such as `~/.m2` are redirected into a cache layer
//! with a symlink so downloads survive between runs.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

use crate::consts::{BUILD_DEPENDENCIES_ENTRY, CACHE_LAYER_NAME};
use crate::provenance::ProvenanceEntry;
use crate::util::hash::{HashError, hash_file};

const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, Error)]
pub enum CacheError {
  #[error("unable to create directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("unable to link cache from {layer} to {path}: {source}")]
  Link {
    layer: PathBuf,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("unable to list dependencies in {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("unable to serialize dependencies: {0}")]
  Serialize(#[source] serde_json::Error),
}

/// A JAR found in the dependency cache.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dependency {
  pub name: String,
  pub version: String,
  pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCache {
  pub path: PathBuf,
}

impl DependencyCache {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn name(&self) -> &'static str {
    CACHE_LAYER_NAME
  }

  /// Link the dependency directory to `layer_path`.
  pub fn contribute(&self, layer_path: &Path) -> Result<(), CacheError> {
    create_dir(layer_path)?;
    if let Some(parent) = self.path.parent() {
      create_dir(parent)?;
    }

    match symlink_dir(layer_path, &self.path) {
      Ok(()) => {
        info!(path = %self.path.display(), "Creating cache directory");
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
        info!(path = %self.path.display(), "Cache already exists");
        Ok(())
      }
      Err(source) => Err(CacheError::Link {
        layer: layer_path.to_path_buf(),
        path: self.path.clone(),
        source,
      }),
    }
  }

  /// Every JAR under the cache, sorted by name then version.
  ///
  /// A cache that does not exist yet has no dependencies.
  pub fn dependencies(&self) -> Result<Vec<Dependency>, CacheError> {
    let mut dependencies = Vec::new();
    if !self.path.exists() {
      return Ok(dependencies);
    }

    for entry in WalkDir::new(&self.path).follow_links(true) {
      let entry = entry.map_err(|source| CacheError::Walk {
        path: self.path.clone(),
        source,
      })?;
      if !entry.file_type().is_file() || entry.path().extension().and_then(|e| e.to_str()) != Some("jar") {
        continue;
      }

      let stem = entry.path().file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
      let (name, version) = split_name_version(&stem);
      dependencies.push(Dependency {
        name,
        version,
        sha256: hash_file(entry.path())?.0,
      });
    }

    dependencies.sort();
    Ok(dependencies)
  }

  /// The ledger entry describing this cache's dependencies.
  pub fn as_provenance_entry(&self) -> Result<ProvenanceEntry, CacheError> {
    let dependencies = serde_json::to_value(self.dependencies()?).map_err(CacheError::Serialize)?;

    Ok(ProvenanceEntry {
      name: BUILD_DEPENDENCIES_ENTRY.to_string(),
      metadata: BTreeMap::from([
        ("dependencies".to_string(), dependencies),
        ("layer".to_string(), Value::from(self.name())),
      ]),
      build: true,
      launch: false,
    })
  }
}

fn create_dir(path: &Path) -> Result<(), CacheError> {
  fs::create_dir_all(path).map_err(|source| CacheError::CreateDir {
    path: path.to_path_buf(),
    source,
  })
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
  std::os::windows::fs::symlink_dir(target, link)
}

/// `spring-core-5.3.1` → (`spring-core`, `5.3.1`).
fn split_name_version(stem: &str) -> (String, String) {
  let bytes = stem.as_bytes();
  for (i, window) in bytes.windows(2).enumerate() {
    if window[0] == b'-' && window[1].is_ascii_digit() {
      return (stem[..i].to_string(), stem[i + 1..].to_string());
    }
  }
  (stem.to_string(), UNKNOWN_VERSION.to_string())
}
