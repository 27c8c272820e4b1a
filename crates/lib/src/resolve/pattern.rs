//! Effective artifact pattern resolution.

use tracing::debug;

use crate::config::ConfigurationResolver;

/// Resolves the glob pattern that names a build's output.
///
/// Precedence, highest first:
/// 1. the artifact key, when explicitly set, used verbatim;
/// 2. the module key, when explicitly set, joined as a directory prefix onto
///    the artifact key's default;
/// 3. the artifact key's default.
#[derive(Debug, Clone)]
pub struct PatternResolver {
  pub artifact_key: String,
  pub module_key: String,
  pub configuration: ConfigurationResolver,
}

impl PatternResolver {
  pub fn new(
    artifact_key: impl Into<String>,
    module_key: impl Into<String>,
    configuration: ConfigurationResolver,
  ) -> Self {
    Self {
      artifact_key: artifact_key.into(),
      module_key: module_key.into(),
      configuration,
    }
  }

  /// The space separated list of globs used for resolution.
  pub fn pattern(&self) -> String {
    let (pattern, explicit) = self.configuration.resolve(&self.artifact_key);
    if explicit {
      return pattern;
    }

    let (module, explicit) = self.configuration.resolve(&self.module_key);
    if explicit {
      let joined = join_module(&module, &pattern);
      debug!(module = %module, pattern = %joined, "prefixing artifact pattern with module");
      return joined;
    }

    pattern
  }
}

fn join_module(module: &str, pattern: &str) -> String {
  let module = module.trim_end_matches('/');
  let pattern = pattern.trim_start_matches('/');
  match (module.is_empty(), pattern.is_empty()) {
    (true, _) => pattern.to_string(),
    (false, true) => module.to_string(),
    (false, false) => format!("{}/{}", module, pattern),
  }
}
