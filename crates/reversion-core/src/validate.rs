//! Independent unpack and integrity check of a freshly built archive.
//!
//! This reads the output with its own routine (not [`crate::archive::extract`])
//! and checks the manifest against the bytes actually stored. Every failure
//! is reported as [`ErrorKind::CorruptOutput`].

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use reversion_schema::Fingerprint;
use reversion_schema::record::RecordLine;
use zip::ZipArchive;

use crate::archive::entry_path;
use crate::error::ErrorKind;

/// Summary of a passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    /// Non-directory entries unpacked.
    pub files: usize,
    /// Manifest lines checked against stored bytes.
    pub verified: usize,
}

fn corrupt(entry: impl Into<String>, reason: impl ToString) -> ErrorKind {
    ErrorKind::CorruptOutput {
        entry: entry.into(),
        reason: reason.to_string(),
    }
}

/// Unpack `archive` into `check_dir` and verify it against `manifest`.
///
/// Passes when every non-directory entry other than the manifest has exactly
/// one manifest line whose hash and size match its stored bytes, the
/// manifest's own line (if present) is unhashed, and no line names an entry
/// missing from the archive.
///
/// # Errors
///
/// Returns [`ErrorKind::CorruptOutput`] naming the first offending entry.
pub fn validate(
    archive: &Path,
    check_dir: &Path,
    manifest: &str,
) -> Result<ValidationReport, ErrorKind> {
    let label = archive
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let file = File::open(archive).map_err(|e| corrupt(&label, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| corrupt(&label, e))?;

    let mut stored: HashMap<String, Fingerprint> = HashMap::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| corrupt(&label, e))?;
        let name = entry.name().to_string();
        if entry.enclosed_name().is_none() {
            return Err(corrupt(name, "entry path escapes the archive root"));
        }
        if entry.is_dir() {
            continue;
        }

        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(|e| corrupt(&name, e))?;
        let target = entry_path(check_dir, &name);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| corrupt(&name, e))?;
        }
        fs::write(&target, &data).map_err(|e| corrupt(&name, e))?;

        if stored.insert(name.clone(), Fingerprint::compute(&data)).is_some() {
            return Err(corrupt(name, "duplicate entry"));
        }
    }

    let manifest_path = entry_path(check_dir, manifest);
    if !stored.contains_key(manifest) {
        return Err(corrupt(manifest, "manifest missing from archive"));
    }
    let text = fs::read_to_string(&manifest_path).map_err(|e| corrupt(manifest, e))?;

    let mut recorded = HashSet::new();
    let mut verified = 0;
    for (idx, raw) in text.lines().enumerate() {
        let line = RecordLine::parse(raw, idx + 1).map_err(|e| corrupt(manifest, e))?;
        if !recorded.insert(line.path) {
            return Err(corrupt(line.path, "listed more than once in the manifest"));
        }
        if line.path == manifest {
            if !line.is_unhashed() {
                return Err(corrupt(manifest, "manifest lists itself with a hash"));
            }
            continue;
        }

        let Some(fingerprint) = stored.get(line.path) else {
            return Err(corrupt(line.path, "listed in the manifest but not in the archive"));
        };
        if !line.matches(fingerprint) {
            return Err(corrupt(
                line.path,
                format!(
                    "manifest says {},{} but archive holds {fingerprint}",
                    line.hash, line.size
                ),
            ));
        }
        verified += 1;
    }

    let mut unlisted: Vec<&String> = stored
        .keys()
        .filter(|name| name.as_str() != manifest && !recorded.contains(name.as_str()))
        .collect();
    unlisted.sort();
    if let Some(first) = unlisted.first() {
        return Err(corrupt(first.as_str(), "no manifest line for entry"));
    }

    tracing::debug!(archive = %label, files = stored.len(), verified, "validated output");
    Ok(ValidationReport {
        files: stored.len(),
        verified,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;

    const MANIFEST: &str = "pkg-1.0.dist-info/RECORD";

    fn build(path: &Path, files: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn record_for(files: &[(&str, &[u8])]) -> String {
        let mut out = String::new();
        for (name, data) in files {
            out.push_str(&format!("{name},{}\r\n", Fingerprint::compute(data)));
        }
        out.push_str(&format!("{MANIFEST},,\r\n"));
        out
    }

    #[test]
    fn consistent_archive_passes() {
        let dir = tempfile::tempdir().unwrap();
        let payload: &[(&str, &[u8])] = &[
            ("pkg/a.py", b"a"),
            ("pkg-1.0.dist-info/METADATA", b"Version: 1.0\n"),
        ];
        let record = record_for(payload);
        let mut files = payload.to_vec();
        files.push((MANIFEST, record.as_bytes()));
        let archive = dir.path().join("out.whl");
        build(&archive, &files);

        let report = validate(&archive, &dir.path().join("check"), MANIFEST).unwrap();
        assert_eq!(report, ValidationReport { files: 3, verified: 2 });
    }

    #[test]
    fn stale_hash_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_for(&[("pkg/a.py", b"old")]);
        let archive = dir.path().join("out.whl");
        build(&archive, &[("pkg/a.py", b"new"), (MANIFEST, record.as_bytes())]);

        let err = validate(&archive, &dir.path().join("check"), MANIFEST).unwrap_err();
        assert!(matches!(err, ErrorKind::CorruptOutput { ref entry, .. } if entry == "pkg/a.py"));
        assert_eq!(err.exit_code(), 14);
    }

    #[test]
    fn unlisted_entry_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_for(&[("pkg/a.py", b"a")]);
        let archive = dir.path().join("out.whl");
        build(
            &archive,
            &[("pkg/a.py", b"a"), ("pkg/extra.py", b"b"), (MANIFEST, record.as_bytes())],
        );

        let err = validate(&archive, &dir.path().join("check"), MANIFEST).unwrap_err();
        assert!(matches!(
            err,
            ErrorKind::CorruptOutput { ref entry, .. } if entry == "pkg/extra.py"
        ));
    }

    #[test]
    fn phantom_line_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_for(&[("pkg/a.py", b"a"), ("pkg/gone.py", b"g")]);
        let archive = dir.path().join("out.whl");
        build(&archive, &[("pkg/a.py", b"a"), (MANIFEST, record.as_bytes())]);

        let err = validate(&archive, &dir.path().join("check"), MANIFEST).unwrap_err();
        assert!(matches!(
            err,
            ErrorKind::CorruptOutput { ref entry, .. } if entry == "pkg/gone.py"
        ));
    }

    #[test]
    fn truncated_container_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("out.whl");
        fs::write(&archive, b"PK\x03\x04truncated").unwrap();
        let err = validate(&archive, &dir.path().join("check"), MANIFEST).unwrap_err();
        assert!(matches!(err, ErrorKind::CorruptOutput { ref entry, .. } if entry == "out.whl"));
    }
}
