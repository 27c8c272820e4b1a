//! Fixed names shared across the crate.

/// Name of the single captured archive inside the application layer.
///
/// Its presence is what distinguishes single-archive restoration from
/// directory-of-artifacts restoration.
pub const ARCHIVE_NAME: &str = "application.zip";

/// Layer holding the captured build output.
pub const APPLICATION_LAYER_NAME: &str = "application";

/// Layer holding the build tool's dependency cache.
pub const CACHE_LAYER_NAME: &str = "cache";

/// Ledger entry name for cached build dependencies.
pub const BUILD_DEPENDENCIES_ENTRY: &str = "build-dependencies";

/// Version of the layer sidecar format.
pub const LAYER_METADATA_VERSION: u32 = 1;

/// Configuration key listing source paths to keep when purging.
pub const INCLUDE_FILES_KEY: &str = "BC_INCLUDE_FILES";

/// Configuration key listing source paths to remove even if included.
pub const EXCLUDE_FILES_KEY: &str = "BC_EXCLUDE_FILES";
