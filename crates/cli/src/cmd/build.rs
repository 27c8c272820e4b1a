//! Implementation of the `bcache build` command.
//!
//! Runs the build (or reuses the cached output), captures the artifacts into
//! the application layer, records build dependencies and replaces the
//! workspace sources with the artifacts.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use buildcache_lib::application::{ApplicationFactory, ApplicationOptions, CacheOutcome, Contribution};
use buildcache_lib::cache::DependencyCache;
use buildcache_lib::config::resolve_arguments;
use buildcache_lib::consts::CACHE_LAYER_NAME;
use buildcache_lib::exec::{CommandExecutor, Executor, VersionProbe};
use buildcache_lib::provenance::{FileLedger, Ledger, MemoryLedger};
use buildcache_lib::sbom::{SbomScanner, SyftScanner};
use buildcache_lib::source::SourceRetention;

use crate::output::{OutputFormat, format_elapsed, print_json, print_stat, print_success, truncate_hash};
use crate::settings::{self, ARGUMENTS_KEY};

#[derive(Args, Debug)]
pub struct BuildArgs {
  /// Workspace containing the sources to build
  #[arg(long, default_value = ".")]
  pub workspace: PathBuf,

  /// Directory holding the cache layers
  #[arg(long)]
  pub layers: PathBuf,

  /// Build command, run in the workspace with BC_BUILD_ARGUMENTS
  #[arg(long)]
  pub command: String,

  /// Build tool dependency directory to keep in the cache layer (e.g. ~/.m2)
  #[arg(long)]
  pub dependency_cache: Option<PathBuf>,

  /// Command printing the build tool version
  #[arg(long, default_value = "javac -version")]
  pub probe: String,

  /// syft executable used for the build SBOM
  #[arg(long, default_value = "syft")]
  pub syft: String,

  /// JSON file to append provenance entries to
  #[arg(long)]
  pub ledger: Option<PathBuf>,

  /// Hint appended to the error when no artifact is found
  #[arg(long)]
  pub help_message: Option<String>,

  /// Extra fingerprint metadata
  #[arg(short = 'm', long = "metadata", value_name = "KEY=VALUE", value_parser = parse_key_value)]
  pub metadata: Vec<(String, String)>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

#[derive(Debug, Serialize)]
struct BuildSummary {
  #[serde(flatten)]
  contribution: Contribution,
  digest: String,
  elapsed_ms: u128,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
  match s.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
  }
}

fn parse_probe(probe: &str) -> Result<VersionProbe> {
  let mut words = shell_words::split(probe).with_context(|| format!("Invalid probe command: {}", probe))?;
  if words.is_empty() {
    bail!("Probe command is empty");
  }
  let command = words.remove(0);
  Ok(VersionProbe::new(command, words))
}

pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let start = Instant::now();

  let configuration = settings::load()?;
  configuration.describe();

  let workspace = dunce::canonicalize(&args.workspace)
    .with_context(|| format!("Workspace not found: {}", args.workspace.display()))?;
  fs::create_dir_all(&args.layers)
    .with_context(|| format!("Failed to create layers directory: {}", args.layers.display()))?;
  let layers = dunce::canonicalize(&args.layers)?;

  let arguments = resolve_arguments(ARGUMENTS_KEY, &configuration).context("Failed to resolve build arguments")?;
  let probe = parse_probe(&args.probe)?;
  let retention = SourceRetention::from_configuration(&configuration).context("Invalid source retention patterns")?;

  let cache_layer = layers.join(CACHE_LAYER_NAME);
  let cache = match &args.dependency_cache {
    Some(path) => {
      let cache = DependencyCache::new(path);
      cache
        .contribute(&cache_layer)
        .context("Failed to link dependency cache")?;
      cache
    }
    None => DependencyCache::new(cache_layer),
  };

  let executor: Arc<dyn Executor> = Arc::new(CommandExecutor);
  let sbom: Arc<dyn SbomScanner> = Arc::new(SyftScanner::new(executor.clone(), &layers).with_command(args.syft));
  let ledger: Arc<dyn Ledger> = match args.ledger {
    Some(path) => Arc::new(FileLedger::new(path)),
    None => Arc::new(MemoryLedger::new()),
  };

  let additional_metadata: BTreeMap<String, Value> = args
    .metadata
    .into_iter()
    .map(|(key, value)| (key, Value::String(value)))
    .collect();

  let options = ApplicationOptions {
    workspace,
    layers_dir: layers,
    command: args.command,
    arguments,
    resolver: settings::artifact_resolver(&configuration, args.help_message),
    cache,
    retention,
    additional_metadata,
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let (digest, contribution) = rt.block_on(async {
    let application = ApplicationFactory::new(executor)
      .with_version_probe(probe)
      .new_application(options, sbom, ledger)
      .await
      .context("Failed to compute build fingerprint")?;
    let digest = application.fingerprint.digest().0;

    let contribution = application.contribute().await.map_err(|e| {
      let kind = e.kind();
      anyhow::Error::new(e).context(format!("Build failed ({:?})", kind))
    })?;
    Ok::<_, anyhow::Error>((digest, contribution))
  })?;

  let summary = BuildSummary {
    contribution,
    digest,
    elapsed_ms: start.elapsed().as_millis(),
  };
  info!(outcome = ?summary.contribution.outcome, "build finished");

  if args.output.is_json() {
    print_json(&summary)?;
  } else {
    println!();
    match summary.contribution.outcome {
      CacheOutcome::Hit => print_success("Reused cached build output"),
      CacheOutcome::Miss => print_success("Build complete!"),
    }
    print_stat("Fingerprint", truncate_hash(&summary.digest));
    print_stat("Layer", &summary.contribution.layer_path.display().to_string());
    print_stat("Restored", &summary.contribution.restored.len().to_string());
    print_stat("Duration", &format_elapsed(start.elapsed()));
  }

  Ok(())
}
