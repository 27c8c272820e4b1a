//! Resolution of the artifact(s) a build produced.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::glob::{self, GlobError};
use super::interest::{InterestClassifier, InterestError, Interesting};
use super::pattern::PatternResolver;
use crate::util::fs::list_dir;

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("unable to proceed due to bad pattern(s):\n{}", .patterns.join("\n"))]
  BadPattern { patterns: Vec<String> },

  #[error("unable to parse patterns {pattern:?}: {source}")]
  Words {
    pattern: String,
    #[source]
    source: shell_words::ParseError,
  },

  #[error(
    "unable to find single built artifact in {pattern}, candidates: [{}]{}",
    join_paths(.candidates),
    help_suffix(.help)
  )]
  Ambiguous {
    pattern: String,
    candidates: Vec<PathBuf>,
    help: Option<String>,
  },

  #[error(
    "unable to find any built artifacts in {pattern}, directory contains: [{}]{}",
    .listing.join(" "),
    help_suffix(.help)
  )]
  Empty {
    pattern: String,
    listing: Vec<String>,
    help: Option<String>,
  },

  #[error("unable to investigate {path}: {source}")]
  Interest {
    path: PathBuf,
    #[source]
    source: InterestError,
  },

  #[error("unable to list {path}: {source}")]
  ListRoot {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

fn join_paths(paths: &[PathBuf]) -> String {
  paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" ")
}

fn help_suffix(help: &Option<String>) -> String {
  match help {
    Some(help) if !help.is_empty() => format!(". {}", help),
    _ => String::new(),
  }
}

/// Resolves build artifacts under a root directory.
///
/// The classifier is only consulted by [`ArtifactResolver::resolve`], and
/// only when the pattern does not match exactly one candidate.
#[derive(Debug, Clone)]
pub struct ArtifactResolver<C = InterestClassifier> {
  pub patterns: PatternResolver,
  pub classifier: C,
  /// Context specific instructions appended when nothing suitable is found.
  pub additional_help: Option<String>,
}

impl ArtifactResolver<InterestClassifier> {
  /// Create a resolver that treats every candidate as interesting.
  pub fn new(patterns: PatternResolver) -> Self {
    Self {
      patterns,
      classifier: InterestClassifier::Always,
      additional_help: None,
    }
  }
}

impl<C: Interesting> ArtifactResolver<C> {
  pub fn with_classifier<D: Interesting>(self, classifier: D) -> ArtifactResolver<D> {
    ArtifactResolver {
      patterns: self.patterns,
      classifier,
      additional_help: self.additional_help,
    }
  }

  pub fn with_additional_help(mut self, help: impl Into<String>) -> Self {
    self.additional_help = Some(help.into());
    self
  }

  /// The effective pattern, resolved from configuration.
  pub fn pattern(&self) -> String {
    self.patterns.pattern()
  }

  /// Resolve exactly one artifact.
  ///
  /// A single match is trusted as-is. Otherwise the matches are narrowed to
  /// the interesting ones, and anything but exactly one is an error listing
  /// the unfiltered candidates.
  pub fn resolve(&self, root: &Path) -> Result<PathBuf, ResolveError> {
    let pattern = self.pattern();
    let mut candidates = glob::expand(root, &pattern).map_err(|e| bad_patterns(vec![e]))?;

    if candidates.len() == 1 {
      return Ok(candidates.remove(0));
    }

    let mut artifacts = Vec::new();
    for candidate in &candidates {
      let interesting = self
        .classifier
        .interesting(candidate)
        .map_err(|source| ResolveError::Interest {
          path: candidate.clone(),
          source,
        })?;
      if interesting {
        artifacts.push(candidate.clone());
      }
    }

    if artifacts.len() == 1 {
      debug!(artifact = %artifacts[0].display(), "selected single interesting candidate");
      return Ok(artifacts.remove(0));
    }

    candidates.sort();
    Err(ResolveError::Ambiguous {
      pattern,
      candidates,
      help: self.additional_help.clone(),
    })
  }

  /// Resolve every artifact named by the (possibly multi-word) pattern.
  ///
  /// Each shell word is an independent glob. Matches are unioned without
  /// interest filtering; files and directories are both accepted.
  pub fn resolve_many(&self, root: &Path) -> Result<Vec<PathBuf>, ResolveError> {
    let pattern = self.pattern();
    let tokens = shell_words::split(&pattern).map_err(|source| ResolveError::Words {
      pattern: pattern.clone(),
      source,
    })?;

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let mut bad = Vec::new();

    for token in &tokens {
      match glob::expand(root, token) {
        Ok(matches) => {
          for m in matches {
            if seen.insert(m.clone()) {
              candidates.push(m);
            }
          }
        }
        Err(e) => bad.push(e),
      }
    }

    if !bad.is_empty() {
      return Err(bad_patterns(bad));
    }

    if !candidates.is_empty() {
      info!(pattern = %pattern, count = candidates.len(), "resolved built artifacts");
      return Ok(candidates);
    }

    let listing = list_dir(root)
      .map_err(|source| ResolveError::ListRoot {
        path: root.to_path_buf(),
        source,
      })?
      .iter()
      .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
      .collect();

    Err(ResolveError::Empty {
      pattern,
      listing,
      help: self.additional_help.clone(),
    })
  }
}

fn bad_patterns(errors: Vec<GlobError>) -> ResolveError {
  ResolveError::BadPattern {
    patterns: errors.into_iter().map(|e| e.pattern).collect(),
  }
}
