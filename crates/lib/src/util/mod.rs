//! Shared utilities.
//!
//! Hashing for fingerprints and capture verification, plus the filesystem
//! primitives used to capture, purge and restore build output.

pub mod fs;
pub mod hash;
