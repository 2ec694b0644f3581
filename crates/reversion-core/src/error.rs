//! Domain-specific errors for a reversioning run.
//!
//! Every failure is terminal for the run. [`ReversionError`] always names
//! the source archive; the [`ErrorKind`] names the offending entry where
//! there is one.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// What went wrong, independent of which archive it happened to.
#[derive(Error, Debug)]
pub enum ErrorKind {
    /// Zero or several `*.dist-info` directories at the archive root.
    #[error("expected exactly one `*.dist-info` directory, found {}", describe(.candidates))]
    AmbiguousMetadata {
        /// Matching top-level directories, possibly empty.
        candidates: Vec<String>,
    },

    /// The METADATA file declares no version.
    #[error("no `Version:` line in {entry}")]
    VersionNotFound {
        /// Archive-relative path of the METADATA file.
        entry: String,
    },

    /// A version identifier that cannot be substituted byte-for-byte.
    #[error("version {value:?} must be non-empty ASCII")]
    Encoding {
        /// The rejected version string.
        value: String,
    },

    /// The input archive violates the wheel layout.
    #[error("malformed archive at {entry}: {reason}")]
    MalformedArchive {
        /// Offending entry (or the archive filename for container-level faults).
        entry: String,
        /// Human-readable cause.
        reason: String,
    },

    /// The freshly built archive did not survive validation.
    #[error("output failed validation at {entry}: {reason}")]
    CorruptOutput {
        /// Offending entry (or the output filename for container-level faults).
        entry: String,
        /// Human-readable cause.
        reason: String,
    },

    /// The source filename does not contain the version it declares.
    #[error("filename {filename} does not contain version {version}")]
    FilenameMismatch {
        /// Source archive file name.
        filename: String,
        /// Version read from METADATA.
        version: String,
    },

    /// A rewrite glob that does not compile.
    #[error("invalid glob pattern {pattern:?}: {source}")]
    Pattern {
        /// The pattern as supplied.
        pattern: String,
        /// Parser diagnostic.
        #[source]
        source: glob::PatternError,
    },

    /// Filesystem failure on a workspace or output path.
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failure while writing the output container.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ErrorKind {
    /// Build an `Io` error for `path`, for use with `map_err`.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Process exit code for this kind; distinct per kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { .. } | Self::Zip(_) => 1,
            Self::AmbiguousMetadata { .. } => 10,
            Self::VersionNotFound { .. } => 11,
            Self::Encoding { .. } => 12,
            Self::MalformedArchive { .. } => 13,
            Self::CorruptOutput { .. } => 14,
            Self::FilenameMismatch { .. } => 15,
            Self::Pattern { .. } => 16,
        }
    }
}

fn describe(candidates: &[String]) -> String {
    if candidates.is_empty() {
        "none".to_string()
    } else {
        format!("{} ({})", candidates.len(), candidates.join(", "))
    }
}

/// A failed run over one source archive.
#[derive(Error, Debug)]
#[error("{}: {kind}", .archive.display())]
pub struct ReversionError {
    /// The source archive the run was given.
    pub archive: PathBuf,
    /// The underlying failure.
    pub kind: ErrorKind,
}

impl ReversionError {
    /// Attach the source archive to a failure.
    pub fn new(archive: impl Into<PathBuf>, kind: ErrorKind) -> Self {
        Self {
            archive: archive.into(),
            kind,
        }
    }

    /// Process exit code, see [`ErrorKind::exit_code`].
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}
