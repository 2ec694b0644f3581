//! Wheel reversioning engine.
//!
//! [`reversion`] takes a built wheel and writes a copy whose version is
//! replaced in the metadata directory (and any extra selected entries),
//! with the RECORD manifest re-fingerprinted and the result validated
//! before it appears at the destination.

pub mod archive;
pub mod collab;
pub mod error;
pub mod manifest;
pub mod pattern;
pub mod pipeline;
pub mod rewrite;
pub mod scratch;
pub mod validate;

// Re-exports
pub use error::{ErrorKind, ReversionError};
pub use pattern::{DEFAULT_GLOBS, PatternSet};
pub use pipeline::{PipelineOptions, Reversioned, Stage, reversion};
pub use rewrite::{Entry, RewritePlan, VersionSubstitution, rewrite_entries, rewrite_workspace};
