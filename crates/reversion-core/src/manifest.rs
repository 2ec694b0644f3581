//! RECORD manifest maintenance after a rewrite pass.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use reversion_schema::Fingerprint;
use reversion_schema::record::{RecordLine, render_line, render_manifest};

use crate::archive::entry_path;
use crate::error::ErrorKind;
use crate::rewrite::RewritePlan;

/// Re-fingerprint every rewritten entry listed in the manifest.
///
/// `manifest` is the manifest's path in the source archive. The rewrite pass
/// must have touched it (its paths carry the version); its content is then
/// already expressed in post-rename paths. Lines naming a rewritten entry get
/// a fresh hash and size computed from the workspace; the manifest's own
/// line and every other line are kept byte-for-byte. Nothing is written
/// unless every line parses.
///
/// # Errors
///
/// Returns [`ErrorKind::MalformedArchive`] if the manifest was not rewritten,
/// is not UTF-8, or has a bad line; [`ErrorKind::Io`] on filesystem failures.
pub fn rewrite_manifest(
    workspace: &Path,
    manifest: &str,
    plan: &RewritePlan,
) -> Result<(), ErrorKind> {
    let Some(target) = plan.target_of(manifest) else {
        return Err(ErrorKind::MalformedArchive {
            entry: manifest.to_string(),
            reason: "manifest was not rewritten; the wheel is malformed or the globs miss it"
                .to_string(),
        });
    };

    let stale: HashSet<&str> = plan
        .iter()
        .filter(|r| r.original != manifest)
        .map(|r| r.rewritten.as_str())
        .collect();

    let path = entry_path(workspace, target);
    let bytes = fs::read(&path).map_err(ErrorKind::io(&path))?;
    let text = String::from_utf8(bytes).map_err(|_| ErrorKind::MalformedArchive {
        entry: target.to_string(),
        reason: "manifest is not valid UTF-8".to_string(),
    })?;

    let mut refreshed = HashSet::new();
    let mut lines = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let record = RecordLine::parse(raw, idx + 1).map_err(|e| ErrorKind::MalformedArchive {
            entry: target.to_string(),
            reason: e.to_string(),
        })?;

        if stale.contains(record.path) {
            let file = entry_path(workspace, record.path);
            let fingerprint = Fingerprint::compute_file(&file).map_err(ErrorKind::io(&file))?;
            lines.push(render_line(record.path, &fingerprint));
            refreshed.insert(record.path);
        } else {
            lines.push(raw.to_string());
        }
    }

    for missing in stale.difference(&refreshed) {
        tracing::warn!(
            entry = %missing,
            manifest = %target,
            "rewritten entry has no manifest line"
        );
    }

    fs::write(&path, render_manifest(lines)).map_err(ErrorKind::io(&path))?;
    tracing::debug!(manifest = %target, refreshed = refreshed.len(), "rewrote manifest");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(root: &Path, files: &[(&str, &str)]) {
        for (name, content) in files {
            let path = entry_path(root, name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    #[test]
    fn refreshes_renamed_and_mutated_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let untouched = Fingerprint::compute(b"x = 1\n");
        let record = format!(
            "pkg/__init__.py,{untouched}\r\n\
             pkg-1.2.4.dist-info/METADATA,sha256=stale,15\r\n\
             pkg-1.2.4.dist-info/RECORD,,\r\n"
        );
        seed(
            root,
            &[
                ("pkg/__init__.py", "x = 1\n"),
                ("pkg-1.2.4.dist-info/METADATA", "Version: 1.2.4\n"),
                ("pkg-1.2.4.dist-info/RECORD", &record),
            ],
        );
        let mut plan = RewritePlan::new();
        plan.record("pkg-1.2.3.dist-info/METADATA", "pkg-1.2.4.dist-info/METADATA");
        plan.record("pkg-1.2.3.dist-info/RECORD", "pkg-1.2.4.dist-info/RECORD");

        rewrite_manifest(root, "pkg-1.2.3.dist-info/RECORD", &plan).unwrap();

        let text = fs::read_to_string(root.join("pkg-1.2.4.dist-info/RECORD")).unwrap();
        let meta = Fingerprint::compute(b"Version: 1.2.4\n");
        assert_eq!(
            text,
            format!(
                "pkg/__init__.py,{untouched}\r\n\
                 pkg-1.2.4.dist-info/METADATA,{meta}\r\n\
                 pkg-1.2.4.dist-info/RECORD,,\r\n"
            )
        );
    }

    #[test]
    fn untouched_manifest_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let plan = RewritePlan::new();
        let err = rewrite_manifest(dir.path(), "pkg-1.0.dist-info/RECORD", &plan).unwrap_err();
        assert!(matches!(
            err,
            ErrorKind::MalformedArchive { ref entry, .. } if entry == "pkg-1.0.dist-info/RECORD"
        ));
    }

    #[test]
    fn bad_line_leaves_manifest_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let original = "pkg-2.dist-info/METADATA,sha256=x,1\r\ngarbage\r\n";
        seed(
            root,
            &[
                ("pkg-2.dist-info/METADATA", "Version: 2\n"),
                ("pkg-2.dist-info/RECORD", original),
            ],
        );
        let mut plan = RewritePlan::new();
        plan.record("pkg-1.dist-info/METADATA", "pkg-2.dist-info/METADATA");
        plan.record("pkg-1.dist-info/RECORD", "pkg-2.dist-info/RECORD");

        let err = rewrite_manifest(root, "pkg-1.dist-info/RECORD", &plan).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert_eq!(fs::read_to_string(root.join("pkg-2.dist-info/RECORD")).unwrap(), original);
    }
}
