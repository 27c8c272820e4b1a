//! buildcache-lib: artifact resolution and build output caching
//!
//! This crate provides the pieces a build-tool integration needs:
//! - `resolve`: find the file(s) a build produced from a configured pattern
//! - `fingerprint` / `layer`: decide whether previous output can be reused
//! - `application`: build, capture, purge sources and restore the output
//! - `cache` / `provenance` / `sbom`: dependency cache and build records

pub mod application;
pub mod cache;
pub mod config;
pub mod consts;
pub mod exec;
pub mod fingerprint;
pub mod layer;
pub mod provenance;
pub mod resolve;
pub mod sbom;
pub mod source;
pub mod util;
