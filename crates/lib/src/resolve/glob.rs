//! Filesystem glob expansion.
//!
//! Patterns are expanded one path component at a time, the way a shell
//! glob walks directories: literal components are looked up directly and
//! wildcard components are matched against the sorted entries of each
//! candidate directory. Wildcards never cross a `/`.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use thiserror::Error;

/// A glob pattern could not be parsed.
#[derive(Debug, Error)]
#[error("bad pattern {pattern}: {source}")]
pub struct GlobError {
  pub pattern: String,
  #[source]
  pub source: globset::Error,
}

enum Component {
  Literal(String),
  Wildcard(GlobMatcher),
}

const META_CHARS: &[char] = &['*', '?', '[', '{', '\\'];

/// Lexically normalise a pattern into its components.
///
/// Leading `/`, empty components and `.` are dropped; `..` removes the
/// previous component. `root/pattern` therefore never escapes `root`
/// lexically.
fn components(pattern: &str) -> Vec<&str> {
  let mut parts: Vec<&str> = Vec::new();
  for part in pattern.split('/') {
    match part {
      "" | "." => {}
      ".." => {
        parts.pop();
      }
      other => parts.push(other),
    }
  }
  parts
}

fn compile(pattern: &str) -> Result<Vec<Component>, GlobError> {
  components(pattern)
    .into_iter()
    .map(|part| {
      if !part.contains(META_CHARS) {
        return Ok(Component::Literal(part.to_string()));
      }
      GlobBuilder::new(part)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map(|glob| Component::Wildcard(glob.compile_matcher()))
        .map_err(|source| GlobError {
          pattern: pattern.to_string(),
          source,
        })
    })
    .collect()
}

/// Expand `pattern` relative to `root`.
///
/// Matches are returned in lexical order per directory. Unreadable
/// directories are skipped rather than reported, so the only error is a
/// malformed pattern.
pub fn expand(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, GlobError> {
  let compiled = compile(pattern)?;

  let mut current = vec![root.to_path_buf()];
  if compiled.is_empty() {
    current.retain(|p| fs::symlink_metadata(p).is_ok());
    return Ok(current);
  }

  for component in &compiled {
    let mut next = Vec::new();
    for dir in &current {
      match component {
        Component::Literal(name) => {
          let candidate = dir.join(name);
          if fs::symlink_metadata(&candidate).is_ok() {
            next.push(candidate);
          }
        }
        Component::Wildcard(matcher) => {
          let Ok(entries) = fs::read_dir(dir) else {
            continue;
          };
          let mut names: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.file_name()).collect();
          names.sort();
          next.extend(
            names
              .into_iter()
              .filter(|name| matcher.is_match(Path::new(name)))
              .map(|name| dir.join(name)),
          );
        }
      }
    }
    if next.is_empty() {
      return Ok(next);
    }
    current = next;
  }

  Ok(current)
}
