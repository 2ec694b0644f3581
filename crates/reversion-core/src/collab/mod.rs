//! Interfaces to the services around the engine: a release host holding
//! built assets, a package index serving published builds, and an external
//! builder producing self-contained executables.
//!
//! None of these are called by [`crate::pipeline`]. Callers pass explicit
//! configuration ([`ReleaseTarget`]) to every operation.

pub mod builder;
pub mod store;

pub use builder::{BuildError, BuildRequest, PackageBuilder};
pub use store::{
    Asset, CollaboratorError, CrossPost, IndexedFile, MemoryAssetStore, PackageIndex,
    ReleaseAssetStore, ReleaseTarget, plan_cross_posts, replace_asset,
};
