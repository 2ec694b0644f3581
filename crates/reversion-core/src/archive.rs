//! Zip container I/O.
//!
//! Extraction records the archive listing (directories included) so the
//! output can be rebuilt in the original order. Repackaging is reproducible:
//! Deflate, a fixed timestamp, and the source entry's unix mode.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::ErrorKind;
use crate::rewrite::RewritePlan;

/// Entries at or above this size are written as zip64.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// One entry of the source archive, as listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    /// Name as stored in the archive (directories end in `/`).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Unix permission bits, if the archive recorded them.
    pub unix_mode: Option<u32>,
}

/// The source archive's entries in their original order.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    entries: Vec<ListedEntry>,
}

impl Listing {
    /// All entries, directories included.
    pub fn entries(&self) -> &[ListedEntry] {
        &self.entries
    }

    /// Non-directory entries in listing order.
    pub fn files(&self) -> impl Iterator<Item = &ListedEntry> {
        self.entries.iter().filter(|e| !e.is_dir)
    }

    /// Names of the non-directory entries in listing order.
    pub fn file_names(&self) -> Vec<String> {
        self.files().map(|e| e.name.clone()).collect()
    }

    /// Distinct first path components of entries that live under a directory.
    pub fn top_level_dirs(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter_map(|e| e.name.split_once('/').map(|(top, _)| top))
            .filter(|top| seen.insert(*top))
            .map(str::to_string)
            .collect()
    }

    /// Whether a non-directory entry named `name` exists.
    pub fn contains_file(&self, name: &str) -> bool {
        self.files().any(|e| e.name == name)
    }
}

/// Resolve an archive-relative, `/`-separated path under `root`.
pub fn entry_path(root: &Path, name: &str) -> PathBuf {
    name.split('/')
        .filter(|c| !c.is_empty())
        .fold(root.to_path_buf(), |acc, c| acc.join(c))
}

fn malformed(entry: impl Into<String>, reason: impl ToString) -> ErrorKind {
    ErrorKind::MalformedArchive {
        entry: entry.into(),
        reason: reason.to_string(),
    }
}

fn display_name(archive: &Path) -> String {
    archive
        .file_name()
        .map_or_else(|| archive.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Extract `archive` into `workspace` and return its listing.
///
/// # Errors
///
/// Returns [`ErrorKind::MalformedArchive`] if the container cannot be read,
/// an entry name escapes the workspace, or a name repeats; [`ErrorKind::Io`]
/// on filesystem failures.
pub fn extract(archive: &Path, workspace: &Path) -> Result<Listing, ErrorKind> {
    let file = File::open(archive).map_err(ErrorKind::io(archive))?;
    let mut zip = ZipArchive::new(file).map_err(|e| malformed(display_name(archive), e))?;

    fs::create_dir_all(workspace).map_err(ErrorKind::io(workspace))?;
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(zip.len());

    for i in 0..zip.len() {
        let mut file = zip
            .by_index(i)
            .map_err(|e| malformed(display_name(archive), e))?;
        let name = file.name().to_string();

        if file.enclosed_name().is_none() {
            return Err(malformed(name, "entry path escapes the archive root"));
        }
        if !seen.insert(name.clone()) {
            return Err(malformed(name, "duplicate entry"));
        }

        let target = entry_path(workspace, &name);
        if file.is_dir() {
            fs::create_dir_all(&target).map_err(ErrorKind::io(&target))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(ErrorKind::io(parent))?;
            }
            let mut out = File::create(&target).map_err(ErrorKind::io(&target))?;
            io::copy(&mut file, &mut out).map_err(ErrorKind::io(&target))?;
        }

        entries.push(ListedEntry {
            is_dir: file.is_dir(),
            unix_mode: file.unix_mode(),
            name,
        });
    }

    Ok(Listing { entries })
}

/// Build a new archive at `dest` from the workspace.
///
/// Files are written in listing order under their rewritten names;
/// directory entries are omitted. `compression_level` is passed to the
/// Deflate encoder (`None` for its default). Returns the names written.
///
/// # Errors
///
/// Returns [`ErrorKind::Io`] if a workspace file cannot be read or the
/// destination cannot be written, and [`ErrorKind::Zip`] on encoder failures.
pub fn repackage(
    workspace: &Path,
    listing: &Listing,
    plan: &RewritePlan,
    dest: &Path,
    compression_level: Option<i64>,
) -> Result<Vec<String>, ErrorKind> {
    let out = File::create(dest).map_err(ErrorKind::io(dest))?;
    let mut writer = ZipWriter::new(out);
    let mut written = Vec::new();

    for entry in listing.files() {
        let name = plan.resolve(&entry.name);
        let source = entry_path(workspace, name);
        let data = fs::read(&source).map_err(ErrorKind::io(&source))?;

        let mut options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(compression_level)
            .last_modified_time(DateTime::default())
            .large_file(data.len() as u64 >= ZIP64_THRESHOLD);
        if let Some(mode) = entry.unix_mode {
            options = options.unix_permissions(mode);
        }

        writer.start_file(name, options)?;
        writer.write_all(&data).map_err(ErrorKind::io(dest))?;
        written.push(name.to_string());
    }

    writer.finish()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, Option<&[u8]>)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            match content {
                Some(bytes) => {
                    zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                    zip.write_all(bytes).unwrap();
                }
                None => zip.add_directory(*name, SimpleFileOptions::default()).unwrap(),
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn entry_path_splits_on_slash() {
        let root = Path::new("/ws");
        assert_eq!(entry_path(root, "a/b/c.txt"), Path::new("/ws/a/b/c.txt"));
        assert_eq!(entry_path(root, "dir/"), Path::new("/ws/dir"));
    }

    #[test]
    fn extract_records_directories_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("in.zip");
        write_zip(
            &archive,
            &[
                ("pkg/", None),
                ("pkg/__init__.py", Some(b"x = 1\n")),
                ("pkg-1.0.dist-info/METADATA", Some(b"Version: 1.0\n")),
            ],
        );

        let ws = dir.path().join("ws");
        let listing = extract(&archive, &ws).unwrap();

        let names: Vec<_> = listing.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["pkg/", "pkg/__init__.py", "pkg-1.0.dist-info/METADATA"]);
        assert!(listing.entries()[0].is_dir);
        assert_eq!(listing.file_names().len(), 2);
        assert_eq!(listing.top_level_dirs(), ["pkg", "pkg-1.0.dist-info"]);
        assert_eq!(fs::read(ws.join("pkg/__init__.py")).unwrap(), b"x = 1\n");
    }

    #[test]
    fn extract_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bad.whl");
        fs::write(&archive, b"not a zip").unwrap();
        let err = extract(&archive, &dir.path().join("ws")).unwrap_err();
        assert!(matches!(err, ErrorKind::MalformedArchive { ref entry, .. } if entry == "bad.whl"));
    }

    #[test]
    fn repackage_skips_directories_and_applies_renames() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("in.zip");
        write_zip(
            &archive,
            &[
                ("pkg/", None),
                ("pkg/a.py", Some(b"a")),
                ("pkg-1.0.dist-info/METADATA", Some(b"Version: 1.0\n")),
            ],
        );
        let ws = dir.path().join("ws");
        let listing = extract(&archive, &ws).unwrap();

        fs::create_dir_all(ws.join("pkg-2.0.dist-info")).unwrap();
        fs::write(ws.join("pkg-2.0.dist-info/METADATA"), b"Version: 2.0\n").unwrap();
        let mut plan = RewritePlan::new();
        plan.record("pkg-1.0.dist-info/METADATA", "pkg-2.0.dist-info/METADATA");

        let out = dir.path().join("out.zip");
        let written = repackage(&ws, &listing, &plan, &out, None).unwrap();
        assert_eq!(written, ["pkg/a.py", "pkg-2.0.dist-info/METADATA"]);

        let mut zip = ZipArchive::new(File::open(&out).unwrap()).unwrap();
        assert_eq!(zip.len(), 2);
        let mut meta = String::new();
        io::Read::read_to_string(&mut zip.by_name("pkg-2.0.dist-info/METADATA").unwrap(), &mut meta)
            .unwrap();
        assert_eq!(meta, "Version: 2.0\n");
    }

    #[test]
    fn repackage_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("in.zip");
        write_zip(&archive, &[("a.txt", Some(b"alpha")), ("b/c.txt", Some(b"gamma"))]);
        let ws = dir.path().join("ws");
        let listing = extract(&archive, &ws).unwrap();
        let plan = RewritePlan::new();

        let first = dir.path().join("first.zip");
        let second = dir.path().join("second.zip");
        repackage(&ws, &listing, &plan, &first, Some(6)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        repackage(&ws, &listing, &plan, &second, Some(6)).unwrap();

        assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
    }
}
