//! Provenance entries and the ledger that records them.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProvenanceError {
  #[error("failed to read ledger {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse ledger {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize ledger: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write ledger {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A record of something that went into (or out of) a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
  pub name: String,
  pub metadata: BTreeMap<String, Value>,
  pub build: bool,
  pub launch: bool,
}

/// Append-only sink for provenance entries.
pub trait Ledger: Send + Sync {
  fn record(&self, entry: ProvenanceEntry) -> Result<(), ProvenanceError>;
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
  entries: Mutex<Vec<ProvenanceEntry>>,
}

impl MemoryLedger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entries(&self) -> Vec<ProvenanceEntry> {
    self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }
}

impl Ledger for MemoryLedger {
  fn record(&self, entry: ProvenanceEntry) -> Result<(), ProvenanceError> {
    self.entries.lock().unwrap_or_else(|e| e.into_inner()).push(entry);
    Ok(())
  }
}

/// Appends entries to a JSON array on disk.
///
/// Each record rewrites the whole file through a temp file and a rename.
#[derive(Debug)]
pub struct FileLedger {
  path: PathBuf,
  lock: Mutex<()>,
}

impl FileLedger {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      lock: Mutex::new(()),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Every entry recorded so far; empty if the file does not exist yet.
  pub fn load(&self) -> Result<Vec<ProvenanceEntry>, ProvenanceError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => {
        return Err(ProvenanceError::Read {
          path: self.path.clone(),
          source,
        });
      }
    };
    serde_json::from_str(&content).map_err(|source| ProvenanceError::Parse {
      path: self.path.clone(),
      source,
    })
  }
}

impl Ledger for FileLedger {
  fn record(&self, entry: ProvenanceEntry) -> Result<(), ProvenanceError> {
    let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

    let mut entries = self.load()?;
    debug!(ledger = %self.path.display(), entry = %entry.name, "recording provenance entry");
    entries.push(entry);

    let write_err = |source| ProvenanceError::Write {
      path: self.path.clone(),
      source,
    };
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent).map_err(write_err)?;
    }

    let content = serde_json::to_string_pretty(&entries).map_err(ProvenanceError::Serialize)?;
    let temp_path = self.path.with_extension("json.tmp");
    fs::write(&temp_path, content).map_err(write_err)?;
    fs::rename(&temp_path, &self.path).map_err(write_err)?;
    Ok(())
  }
}
