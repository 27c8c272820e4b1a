//! Artifact resolution.
//!
//! Turns a configured glob pattern plus the files a build left behind into
//! the build's real output:
//! - `pattern`: which pattern to use (configuration precedence)
//! - `glob`: expanding a pattern under a root directory
//! - `interest`: narrowing ambiguous candidates
//! - `artifact`: single and multi artifact resolution

pub mod artifact;
pub mod glob;
pub mod interest;
pub mod pattern;

pub use artifact::{ArtifactResolver, ResolveError};
pub use interest::{InterestClassifier, InterestError, Interesting};
pub use pattern::PatternResolver;
