//! Interest classification: is a candidate the build's real output?
//!
//! When a pattern matches several files, the single-artifact resolver asks
//! an [`Interesting`] implementation to narrow the set down. The closed set
//! of classifiers lives in [`InterestClassifier`].

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

const WEB_INF_DIR: &str = "WEB-INF/";
const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
const MAIN_CLASS_KEY: &str = "Main-Class";

#[derive(Debug, Error)]
pub enum InterestError {
  #[error("failed to open {path}: {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read archive {path}: {source}")]
  Archive {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("failed to read entry {entry} of {path}: {source}")]
  Entry {
    path: PathBuf,
    entry: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse properties in {entry} of {path}: {source}")]
  Properties {
    path: PathBuf,
    entry: String,
    #[source]
    source: java_properties::PropertiesError,
  },
}

/// Decides whether a candidate path is an interesting build output.
pub trait Interesting {
  fn interesting(&self, path: &Path) -> Result<bool, InterestError>;
}

/// The built-in classifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InterestClassifier {
  /// Every candidate is interesting.
  #[default]
  Always,
  /// Executable JARs (manifest `Main-Class`) and WARs (`WEB-INF/` directory).
  ExecutableArchive,
}

impl Interesting for InterestClassifier {
  fn interesting(&self, path: &Path) -> Result<bool, InterestError> {
    match self {
      InterestClassifier::Always => Ok(true),
      InterestClassifier::ExecutableArchive => executable_archive(path),
    }
  }
}

fn executable_archive(path: &Path) -> Result<bool, InterestError> {
  let file = File::open(path).map_err(|source| InterestError::Open {
    path: path.to_path_buf(),
    source,
  })?;
  let archive_err = |source| InterestError::Archive {
    path: path.to_path_buf(),
    source,
  };
  let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(archive_err)?;

  for i in 0..archive.len() {
    let mut entry = archive.by_index(i).map_err(archive_err)?;
    let name = entry.name().to_string();

    if name == WEB_INF_DIR && entry.is_dir() {
      debug!(path = %path.display(), "archive contains WEB-INF/");
      return Ok(true);
    }

    if name == MANIFEST_PATH {
      let mut bytes = Vec::new();
      entry.read_to_end(&mut bytes).map_err(|source| InterestError::Entry {
        path: path.to_path_buf(),
        entry: name.clone(),
        source,
      })?;
      let properties = java_properties::read(bytes.as_slice()).map_err(|source| InterestError::Properties {
        path: path.to_path_buf(),
        entry: name.clone(),
        source,
      })?;
      if properties.contains_key(MAIN_CLASS_KEY) {
        debug!(path = %path.display(), "archive manifest declares Main-Class");
        return Ok(true);
      }
    }
  }

  Ok(false)
}
