//! Hashing utilities for fingerprints and capture verification.
//!
//! Everything is SHA-256, rendered as lowercase hex.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// A 64-character SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error while hashing files or directories.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("failed to walk directory {path}: {source}")]
  WalkDir {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to read file {path}: {source}")]
  ReadFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read symlink {path}: {source}")]
  ReadSymlink {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Hash a directory tree.
///
/// Each entry contributes one line: its kind, its `/`-joined path relative
/// to `path`, and for files and symlinks the hash of the content or link
/// target. Timestamps and permissions are ignored, so identical trees hash
/// the same wherever they live. Names in `exclude` are skipped at any depth,
/// along with everything beneath them.
pub fn hash_directory(path: &Path, exclude: &[&str]) -> Result<ContentHash, HashError> {
  hash_tree(path, exclude, false)
}

/// Hash a directory tree as it reads through its symlinks.
///
/// A tree and a dereferenced copy of it hash the same.
pub fn hash_resolved_directory(path: &Path) -> Result<ContentHash, HashError> {
  hash_tree(path, &[], true)
}

fn hash_tree(path: &Path, exclude: &[&str], follow_links: bool) -> Result<ContentHash, HashError> {
  let walker = WalkDir::new(path)
    .follow_links(follow_links)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.file_name().to_str().is_none_or(|name| !exclude.contains(&name)));

  let mut lines = Vec::new();
  for entry in walker {
    let entry = entry.map_err(|source| HashError::WalkDir {
      path: path.to_path_buf(),
      source,
    })?;
    if let Some(line) = entry_line(path, entry.path(), entry.file_type())? {
      lines.push(line);
    }
  }
  lines.sort();

  let mut hasher = Sha256::new();
  for line in &lines {
    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }
  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

fn entry_line(root: &Path, entry: &Path, file_type: fs::FileType) -> Result<Option<String>, HashError> {
  let rel = entry
    .strip_prefix(root)
    .unwrap_or(entry)
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/");

  let line = if file_type.is_dir() {
    format!("D:{}", rel)
  } else if file_type.is_symlink() {
    let target = fs::read_link(entry).map_err(|source| HashError::ReadSymlink {
      path: entry.to_path_buf(),
      source,
    })?;
    format!("L:{}:{}", rel, hash_bytes(target.to_string_lossy().as_bytes()))
  } else if file_type.is_file() {
    format!("F:{}:{}", rel, hash_file(entry)?)
  } else {
    return Ok(None);
  };
  Ok(Some(line))
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let read_err = |source| HashError::ReadFile {
    path: path.to_path_buf(),
    source,
  };
  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  io::copy(&mut file, &mut hasher).map_err(read_err)?;
  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(format!("{:x}", hasher.finalize()))
}
