//! Source removal after a successful capture.
//!
//! By default every direct child of the workspace is removed. Include
//! patterns keep matching paths (and everything under a kept directory);
//! exclude patterns override includes. Patterns are globs matched against
//! workspace-relative, `/`-separated paths.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::ConfigurationResolver;
use crate::consts::{EXCLUDE_FILES_KEY, INCLUDE_FILES_KEY};
use crate::util::fs::{list_dir, remove_path};

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("bad retention pattern {pattern}: {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: globset::Error,
  },

  #[error("unable to list children of {path}: {source}")]
  List {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("unable to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("unable to remove {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone)]
pub struct SourceRetention {
  include: GlobSet,
  exclude: GlobSet,
  retains: bool,
}

impl Default for SourceRetention {
  fn default() -> Self {
    Self {
      include: GlobSet::empty(),
      exclude: GlobSet::empty(),
      retains: false,
    }
  }
}

impl SourceRetention {
  pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, SourceError> {
    Ok(Self {
      include: build_set(include)?,
      exclude: build_set(exclude)?,
      retains: !include.is_empty(),
    })
  }

  /// Read include/exclude lists (colon-separated) from configuration.
  pub fn from_configuration(configuration: &ConfigurationResolver) -> Result<Self, SourceError> {
    Self::new(
      &configuration.resolve_list(INCLUDE_FILES_KEY),
      &configuration.resolve_list(EXCLUDE_FILES_KEY),
    )
  }

  /// Whether `rel` survives the purge on its own account.
  pub fn keeps(&self, rel: &str) -> bool {
    self.retains && self.include.is_match(rel) && !self.exclude.is_match(rel)
  }

  /// Remove everything in `workspace` that is not retained.
  ///
  /// Returns the removed paths in removal order.
  pub fn purge(&self, workspace: &Path) -> Result<Vec<PathBuf>, SourceError> {
    info!(path = %workspace.display(), "Removing source code");
    let mut removed = Vec::new();
    self.purge_dir(workspace, workspace, &mut removed)?;
    Ok(removed)
  }

  fn purge_dir(&self, workspace: &Path, dir: &Path, removed: &mut Vec<PathBuf>) -> Result<(), SourceError> {
    let children = list_dir(dir).map_err(|source| SourceError::List {
      path: dir.to_path_buf(),
      source,
    })?;

    for child in children {
      let rel = relative(workspace, &child);
      if self.keeps(&rel) {
        debug!(path = %rel, "retaining source");
        continue;
      }

      let is_dir = fs::symlink_metadata(&child).map(|m| m.is_dir()).unwrap_or(false);
      if is_dir && self.contains_kept(workspace, &child)? {
        self.purge_dir(workspace, &child, removed)?;
        continue;
      }

      remove_path(&child).map_err(|source| SourceError::Remove {
        path: child.clone(),
        source,
      })?;
      removed.push(child);
    }

    Ok(())
  }

  fn contains_kept(&self, workspace: &Path, dir: &Path) -> Result<bool, SourceError> {
    if !self.retains {
      return Ok(false);
    }
    for entry in WalkDir::new(dir).min_depth(1) {
      let entry = entry.map_err(|source| SourceError::Walk {
        path: dir.to_path_buf(),
        source,
      })?;
      if self.keeps(&relative(workspace, entry.path())) {
        return Ok(true);
      }
    }
    Ok(false)
  }
}

fn build_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet, SourceError> {
  let mut builder = GlobSetBuilder::new();
  for pattern in patterns {
    let pattern = pattern.as_ref();
    let glob = GlobBuilder::new(pattern)
      .literal_separator(true)
      .build()
      .map_err(|source| SourceError::Pattern {
        pattern: pattern.to_string(),
        source,
      })?;
    builder.add(glob);
  }
  builder.build().map_err(|source| SourceError::Pattern {
    pattern: patterns.iter().map(|p| p.as_ref()).collect::<Vec<_>>().join(":"),
    source,
  })
}

fn relative(workspace: &Path, path: &Path) -> String {
  path
    .strip_prefix(workspace)
    .unwrap_or(path)
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}
