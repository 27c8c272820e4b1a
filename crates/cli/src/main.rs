mod cmd;
mod output;
mod settings;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, ResolveArgs, cmd_build, cmd_config, cmd_resolve};
use output::{OutputFormat, print_error};

/// bcache - build once, cache the output, ship only the artifacts
#[derive(Parser)]
#[command(name = "bcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the workspace (or reuse cached output) and replace sources with the artifacts
  Build(BuildArgs),

  /// Print the artifact(s) the configured pattern resolves to
  Resolve(ResolveArgs),

  /// Print the configuration keys, their defaults and current values
  Config {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let cli = Cli::parse();

  let result = match cli.command {
    Commands::Build(args) => cmd_build(args),
    Commands::Resolve(args) => cmd_resolve(args),
    Commands::Config { output } => cmd_config(output),
  };

  if let Err(e) = result {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}
