//! Configuration keys read from the environment.

use anyhow::{Context, Result};
use buildcache_lib::config::{Configuration, ConfigurationResolver};
use buildcache_lib::consts::{EXCLUDE_FILES_KEY, INCLUDE_FILES_KEY};
use buildcache_lib::resolve::{ArtifactResolver, PatternResolver};

pub const ARTIFACT_KEY: &str = "BC_BUILT_ARTIFACT";
pub const MODULE_KEY: &str = "BC_BUILT_MODULE";
pub const ARGUMENTS_KEY: &str = "BC_BUILD_ARGUMENTS";

pub const DEFAULT_ARTIFACT: &str = "target/*.[jw]ar";
pub const DEFAULT_ARGUMENTS: &str = "package";

pub fn configurations() -> Vec<Configuration> {
  vec![
    Configuration::new(ARTIFACT_KEY, DEFAULT_ARTIFACT, "the built application artifact(s), space separated globs"),
    Configuration::new(MODULE_KEY, "", "the module to find the application artifact in"),
    Configuration::new(ARGUMENTS_KEY, DEFAULT_ARGUMENTS, "the arguments passed to the build command"),
    Configuration::new(INCLUDE_FILES_KEY, "", "colon separated globs of source files to keep"),
    Configuration::new(EXCLUDE_FILES_KEY, "", "colon separated globs of source files to remove"),
  ]
}

pub fn load() -> Result<ConfigurationResolver> {
  ConfigurationResolver::from_env(configurations()).context("Failed to read configuration")
}

pub fn artifact_resolver(configuration: &ConfigurationResolver, help: Option<String>) -> ArtifactResolver {
  let resolver = ArtifactResolver::new(PatternResolver::new(ARTIFACT_KEY, MODULE_KEY, configuration.clone()));
  match help {
    Some(help) => resolver.with_additional_help(help),
    None => resolver,
  }
}
