//! RECORD manifest grammar.
//!
//! One line per archived file: `path,hash,size`, terminated by CRLF. The
//! manifest lists itself with empty hash and size fields. Lines are split
//! from the right, and a path that itself contains a comma is rejected
//! rather than guessed at.

use thiserror::Error;

use crate::fingerprint::Fingerprint;

/// File name of the manifest inside the metadata directory.
pub const RECORD_FILE: &str = "RECORD";

/// Terminator written after every manifest line.
pub const LINE_TERMINATOR: &str = "\r\n";

/// A line that does not follow the `path,hash,size` grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Fewer than three comma-separated fields.
    #[error("line {line}: expected `path,hash,size`, got {text:?}")]
    MissingFields {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        text: String,
    },

    /// The path field contains a comma.
    #[error("line {line}: path contains a comma, which RECORD lines cannot express: {text:?}")]
    CommaInPath {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        text: String,
    },
}

/// One parsed manifest line, borrowing from the manifest text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLine<'a> {
    /// Archive-relative path, `/`-separated.
    pub path: &'a str,
    /// Tagged digest, or empty for unhashed entries.
    pub hash: &'a str,
    /// Decimal size, or empty for unhashed entries.
    pub size: &'a str,
}

impl<'a> RecordLine<'a> {
    /// Parse a single line (without its terminator). `line` is 1-based and
    /// only used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if the line has fewer than three fields or the
    /// path contains a comma.
    pub fn parse(text: &'a str, line: usize) -> Result<Self, RecordError> {
        let mut fields = text.rsplitn(3, ',');
        let (Some(size), Some(hash), Some(path)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(RecordError::MissingFields {
                line,
                text: text.to_string(),
            });
        };

        if path.contains(',') {
            return Err(RecordError::CommaInPath {
                line,
                text: text.to_string(),
            });
        }

        Ok(Self { path, hash, size })
    }

    /// Whether this line carries no hash or size (the manifest's own line).
    pub fn is_unhashed(&self) -> bool {
        self.hash.is_empty() && self.size.is_empty()
    }

    /// Whether the recorded hash and size equal `fingerprint`.
    pub fn matches(&self, fingerprint: &Fingerprint) -> bool {
        self.hash == fingerprint.digest() && self.size == fingerprint.size().to_string()
    }
}

/// Render a fresh line for `path` (without terminator).
pub fn render_line(path: &str, fingerprint: &Fingerprint) -> String {
    format!("{path},{fingerprint}")
}

/// Parse every line of a manifest.
///
/// # Errors
///
/// Returns the first [`RecordError`] encountered.
pub fn parse_manifest(text: &str) -> Result<Vec<RecordLine<'_>>, RecordError> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| RecordLine::parse(line, idx + 1))
        .collect()
}

/// Join lines into manifest text, each followed by CRLF.
pub fn render_manifest<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for line in lines {
        out.push_str(line.as_ref());
        out.push_str(LINE_TERMINATOR);
    }
    out
}
