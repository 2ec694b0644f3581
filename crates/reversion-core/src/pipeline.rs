//! The reversioning pipeline.
//!
//! ```text
//! EXTRACT -> LOCATE_METADATA -> READ_VERSION -> REWRITE_CONTENT
//!         -> REWRITE_MANIFEST -> REPACKAGE -> VALIDATE -> DONE
//! ```
//!
//! Any stage failure ends the run. The source archive is never modified and
//! nothing appears at the destination unless validation passed: the output
//! is built in a scratch directory next to the destination and renamed into
//! place as the last step.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use reversion_schema::metadata::{is_dist_info_dir, parse_version};
use reversion_schema::{METADATA_FILE, RECORD_FILE};

use crate::archive::{self, Listing, entry_path};
use crate::error::{ErrorKind, ReversionError};
use crate::manifest::rewrite_manifest;
use crate::pattern::PatternSet;
use crate::rewrite::{VersionSubstitution, rewrite_workspace};
use crate::scratch::Scratch;
use crate::validate::validate;

const WORKSPACE_PREFIX: &str = "reversion-workspace-";
const BUILD_PREFIX: &str = ".reversion-build-";

/// Settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Version written in place of the declared one.
    pub target_version: String,
    /// Directory that receives the output archive (created if missing).
    pub dest_dir: PathBuf,
    /// Rewrite globs appended to the defaults.
    pub extra_globs: Vec<String>,
    /// Deflate level for the output; `None` uses the encoder default.
    pub compression_level: Option<i64>,
    /// Parent of the extraction workspace; `None` uses the system temp dir.
    pub work_dir: Option<PathBuf>,
}

impl PipelineOptions {
    /// Options with no extra globs and the default compression level.
    pub fn new(target_version: impl Into<String>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_version: target_version.into(),
            dest_dir: dest_dir.into(),
            extra_globs: Vec::new(),
            compression_level: None,
            work_dir: None,
        }
    }

    /// Append rewrite globs.
    #[must_use]
    pub fn with_extra_globs<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_globs.extend(globs.into_iter().map(Into::into));
        self
    }

    /// Extract into a workspace under `dir` instead of the system temp dir.
    #[must_use]
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }
}

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Unpack the source archive into the workspace.
    Extract,
    /// Find the single `*.dist-info` directory.
    LocateMetadata,
    /// Read the declared version.
    ReadVersion,
    /// Substitute the version in selected entries.
    RewriteContent,
    /// Refresh manifest lines of rewritten entries.
    RewriteManifest,
    /// Build the output archive.
    Repackage,
    /// Check the output independently.
    Validate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Extract => "EXTRACT",
            Self::LocateMetadata => "LOCATE_METADATA",
            Self::ReadVersion => "READ_VERSION",
            Self::RewriteContent => "REWRITE_CONTENT",
            Self::RewriteManifest => "REWRITE_MANIFEST",
            Self::Repackage => "REPACKAGE",
            Self::Validate => "VALIDATE",
        };
        f.write_str(name)
    }
}

/// A successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reversioned {
    /// Where the validated archive was written.
    pub path: PathBuf,
    /// Version the source declared.
    pub source_version: String,
    /// Version the output declares.
    pub target_version: String,
    /// Entries whose path or content was rewritten.
    pub rewritten: usize,
    /// Non-directory entries in the output.
    pub files: usize,
}

/// Reversion `input` into `options.dest_dir`.
///
/// The output file name is the input's with the old version replaced.
///
/// # Errors
///
/// Returns a [`ReversionError`] naming `input` and the failing condition.
pub fn reversion(input: &Path, options: &PipelineOptions) -> Result<Reversioned, ReversionError> {
    let fail = |kind| ReversionError::new(input, kind);

    let patterns = PatternSet::with_defaults(&options.extra_globs).map_err(fail)?;
    let workspace = match &options.work_dir {
        Some(dir) => Scratch::new_in(WORKSPACE_PREFIX, dir),
        None => Scratch::new(WORKSPACE_PREFIX),
    }
    .map_err(fail)?;

    let outcome = run(input, workspace.path(), &patterns, options);
    let released = workspace.release();

    if let Err(err) = released {
        tracing::warn!(error = %err, "failed to remove workspace");
    }
    let done = outcome.map_err(fail)?;

    tracing::info!(
        archive = %input.display(),
        output = %done.path.display(),
        from = %done.source_version,
        to = %done.target_version,
        rewritten = done.rewritten,
        "wrote reversioned archive"
    );
    Ok(done)
}

fn enter(stage: Stage, input: &Path) {
    tracing::debug!(stage = %stage, archive = %input.display(), "entering stage");
}

fn run(
    input: &Path,
    workspace: &Path,
    patterns: &PatternSet,
    options: &PipelineOptions,
) -> Result<Reversioned, ErrorKind> {
    enter(Stage::Extract, input);
    let listing = archive::extract(input, workspace)?;

    enter(Stage::LocateMetadata, input);
    let dist_info = locate_metadata(&listing)?;

    enter(Stage::ReadVersion, input);
    let source_version = read_version(workspace, &listing, &dist_info)?;
    let dest_name = destination_name(input, &source_version, &options.target_version)?;
    let substitution = VersionSubstitution::new(&source_version, &options.target_version)?;

    enter(Stage::RewriteContent, input);
    let plan = rewrite_workspace(workspace, &listing.file_names(), &substitution, patterns)?;

    enter(Stage::RewriteManifest, input);
    let manifest = format!("{dist_info}/{RECORD_FILE}");
    rewrite_manifest(workspace, &manifest, &plan)?;
    let new_manifest = plan.resolve(&manifest).to_string();

    enter(Stage::Repackage, input);
    fs::create_dir_all(&options.dest_dir).map_err(ErrorKind::io(&options.dest_dir))?;
    let build = Scratch::new_in(BUILD_PREFIX, &options.dest_dir)?;
    let staged = build.path().join(&dest_name);
    let written = archive::repackage(
        workspace,
        &listing,
        &plan,
        &staged,
        options.compression_level,
    )?;

    enter(Stage::Validate, input);
    validate(&staged, &build.path().join("check"), &new_manifest)?;

    let dest = options.dest_dir.join(&dest_name);
    fs::rename(&staged, &dest).map_err(ErrorKind::io(&dest))?;
    if let Err(err) = build.release() {
        tracing::warn!(error = %err, "failed to remove build directory");
    }

    Ok(Reversioned {
        path: dest,
        source_version,
        target_version: options.target_version.clone(),
        rewritten: plan.len(),
        files: written.len(),
    })
}

/// The one top-level `*.dist-info` directory.
fn locate_metadata(listing: &Listing) -> Result<String, ErrorKind> {
    let mut candidates: Vec<String> = listing
        .top_level_dirs()
        .into_iter()
        .filter(|dir| is_dist_info_dir(dir))
        .collect();

    if candidates.len() != 1 {
        candidates.sort();
        return Err(ErrorKind::AmbiguousMetadata { candidates });
    }
    Ok(candidates.remove(0))
}

fn read_version(workspace: &Path, listing: &Listing, dist_info: &str) -> Result<String, ErrorKind> {
    let entry = format!("{dist_info}/{METADATA_FILE}");
    if !listing.contains_file(&entry) {
        return Err(ErrorKind::VersionNotFound { entry });
    }

    let path = entry_path(workspace, &entry);
    let bytes = fs::read(&path).map_err(ErrorKind::io(&path))?;
    let text = String::from_utf8_lossy(&bytes);
    parse_version(&text)
        .map(str::to_string)
        .ok_or(ErrorKind::VersionNotFound { entry })
}

/// The input's file name with `from` replaced by `to`.
fn destination_name(input: &Path, from: &str, to: &str) -> Result<String, ErrorKind> {
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !filename.contains(from) {
        return Err(ErrorKind::FilenameMismatch {
            filename,
            version: from.to_string(),
        });
    }
    Ok(filename.replace(from, to))
}
