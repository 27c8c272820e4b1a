use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use buildcache_lib::resolve::InterestClassifier;

use crate::output::{OutputFormat, print_info, print_json};
use crate::settings;

#[derive(Args, Debug)]
pub struct ResolveArgs {
  /// Directory to resolve artifacts in
  #[arg(long, default_value = ".")]
  pub workspace: PathBuf,

  /// Resolve every artifact the pattern names instead of exactly one
  #[arg(long)]
  pub many: bool,

  /// Prefer executable JARs and WARs when several candidates match
  #[arg(long, conflicts_with = "many")]
  pub executable_archive: bool,

  /// Hint appended to the error when resolution fails
  #[arg(long)]
  pub help_message: Option<String>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

#[derive(Debug, Serialize)]
struct Resolution {
  pattern: String,
  artifacts: Vec<PathBuf>,
}

pub fn cmd_resolve(args: ResolveArgs) -> Result<()> {
  let configuration = settings::load()?;
  let workspace = dunce::canonicalize(&args.workspace)
    .with_context(|| format!("Workspace not found: {}", args.workspace.display()))?;

  let resolver = settings::artifact_resolver(&configuration, args.help_message);
  let pattern = resolver.pattern();

  let artifacts = if args.many {
    resolver.resolve_many(&workspace)?
  } else if args.executable_archive {
    vec![
      resolver
        .with_classifier(InterestClassifier::ExecutableArchive)
        .resolve(&workspace)?,
    ]
  } else {
    vec![resolver.resolve(&workspace)?]
  };

  if args.output.is_json() {
    print_json(&Resolution { pattern, artifacts })?;
  } else {
    print_info(&format!("Pattern: {}", pattern));
    for artifact in &artifacts {
      println!("{}", artifact.display());
    }
  }

  Ok(())
}
