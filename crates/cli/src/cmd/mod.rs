mod build;
mod config;
mod resolve;

pub use build::{BuildArgs, cmd_build};
pub use config::cmd_config;
pub use resolve::{ResolveArgs, cmd_resolve};
