//! Version substitution over selected archive entries.
//!
//! Only entries selected by a [`PatternSet`] are inspected. A selected entry
//! is rewritten when its content or its path contains the old version; every
//! such entry is recorded in the [`RewritePlan`] under its original path,
//! whether it was renamed, mutated, or both.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use regex::bytes::{NoExpand, Regex};

use crate::archive::entry_path;
use crate::error::ErrorKind;
use crate::pattern::PatternSet;

/// A literal old-version to new-version byte substitution.
///
/// The old version is compiled once into an escaped byte pattern, so it
/// matches literally inside any content, text or binary.
#[derive(Debug, Clone)]
pub struct VersionSubstitution {
    from: String,
    to: String,
    pattern: Regex,
}

impl VersionSubstitution {
    /// Validate both versions as non-empty ASCII.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Encoding`] naming the first rejected version.
    pub fn new(from: &str, to: &str) -> Result<Self, ErrorKind> {
        for value in [from, to] {
            if value.is_empty() || !value.is_ascii() {
                return Err(ErrorKind::Encoding {
                    value: value.to_string(),
                });
            }
        }
        let pattern = Regex::new(&regex::escape(from)).map_err(|_| ErrorKind::Encoding {
            value: from.to_string(),
        })?;
        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            pattern,
        })
    }

    /// Replace every occurrence in `data`, or `None` if there is none.
    pub fn apply_bytes(&self, data: &[u8]) -> Option<Vec<u8>> {
        match self.pattern.replace_all(data, NoExpand(self.to.as_bytes())) {
            Cow::Borrowed(_) => None,
            Cow::Owned(out) => Some(out),
        }
    }

    /// Replace every occurrence in `path`, or `None` if there is none.
    pub fn apply_path(&self, path: &str) -> Option<String> {
        path.contains(self.from.as_str())
            .then(|| path.replace(self.from.as_str(), &self.to))
    }

    /// Rewrite one entry. `None` means neither path nor content mentions the
    /// old version and the entry must be left alone.
    pub fn apply(&self, path: &str, content: &[u8]) -> Option<(String, Option<Vec<u8>>)> {
        let new_content = self.apply_bytes(content);
        let new_path = self.apply_path(path);
        if new_content.is_none() && new_path.is_none() {
            return None;
        }
        Some((new_path.unwrap_or_else(|| path.to_string()), new_content))
    }
}

/// One rewritten entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Path in the source archive.
    pub original: String,
    /// Path in the output archive (equal to `original` if only the content changed).
    pub rewritten: String,
}

impl Rewrite {
    /// Whether the path changed.
    pub fn is_rename(&self) -> bool {
        self.original != self.rewritten
    }
}

/// Every entry touched by one pass, keyed by original path, in visit order.
#[derive(Debug, Clone, Default)]
pub struct RewritePlan {
    rewrites: Vec<Rewrite>,
    index: HashMap<String, usize>,
}

impl RewritePlan {
    /// An empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `original` now lives at `rewritten`. Recording the same
    /// original twice keeps a single entry with the latest target.
    pub fn record(&mut self, original: impl Into<String>, rewritten: impl Into<String>) {
        let original = original.into();
        let rewritten = rewritten.into();
        if let Some(&idx) = self.index.get(&original) {
            self.rewrites[idx].rewritten = rewritten;
            return;
        }
        self.index.insert(original.clone(), self.rewrites.len());
        self.rewrites.push(Rewrite {
            original,
            rewritten,
        });
    }

    /// Where `original` went, if it was rewritten.
    pub fn target_of(&self, original: &str) -> Option<&str> {
        self.index
            .get(original)
            .map(|&idx| self.rewrites[idx].rewritten.as_str())
    }

    /// The output path of `original`: its target if rewritten, else itself.
    pub fn resolve<'a>(&'a self, original: &'a str) -> &'a str {
        self.target_of(original).unwrap_or(original)
    }

    /// Whether `original` was rewritten.
    pub fn contains(&self, original: &str) -> bool {
        self.index.contains_key(original)
    }

    /// All rewrites in visit order.
    pub fn iter(&self) -> impl Iterator<Item = &Rewrite> {
        self.rewrites.iter()
    }

    /// Rewrites whose path changed.
    pub fn renamed(&self) -> impl Iterator<Item = &Rewrite> {
        self.rewrites.iter().filter(|r| r.is_rename())
    }

    /// Rewrites whose path stayed the same.
    pub fn mutated_only(&self) -> impl Iterator<Item = &Rewrite> {
        self.rewrites.iter().filter(|r| !r.is_rename())
    }

    /// Number of rewritten entries.
    pub fn len(&self) -> usize {
        self.rewrites.len()
    }

    /// Whether nothing was rewritten.
    pub fn is_empty(&self) -> bool {
        self.rewrites.is_empty()
    }
}

/// An in-memory archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Archive-relative path.
    pub path: String,
    /// Entry bytes.
    pub content: Vec<u8>,
}

impl Entry {
    /// Build an entry.
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Rewrite in-memory entries, keeping their order.
///
/// # Errors
///
/// Returns [`ErrorKind::MalformedArchive`] if a renamed entry would collide
/// with another entry's path.
pub fn rewrite_entries(
    entries: Vec<Entry>,
    substitution: &VersionSubstitution,
    patterns: &PatternSet,
) -> Result<(Vec<Entry>, RewritePlan), ErrorKind> {
    let originals: HashSet<String> = entries.iter().map(|e| e.path.clone()).collect();
    let mut plan = RewritePlan::new();
    let mut out = Vec::with_capacity(entries.len());

    for entry in entries {
        if !patterns.matches(&entry.path) {
            out.push(entry);
            continue;
        }
        let Some((path, content)) = substitution.apply(&entry.path, &entry.content) else {
            out.push(entry);
            continue;
        };
        check_collision(&entry.path, &path, &originals)?;

        plan.record(entry.path.as_str(), path.as_str());
        out.push(Entry {
            path,
            content: content.unwrap_or(entry.content),
        });
    }

    Ok((out, plan))
}

/// Rewrite the selected files of an extracted workspace in place.
///
/// `files` are the archive's non-directory entry paths in listing order.
/// Renamed files are written under their new path (creating parent
/// directories) and the old file is removed.
///
/// # Errors
///
/// Returns [`ErrorKind::Io`] on filesystem failures and
/// [`ErrorKind::MalformedArchive`] on a rename collision.
pub fn rewrite_workspace(
    workspace: &Path,
    files: &[String],
    substitution: &VersionSubstitution,
    patterns: &PatternSet,
) -> Result<RewritePlan, ErrorKind> {
    let originals: HashSet<String> = files.iter().cloned().collect();
    let mut plan = RewritePlan::new();

    for src in files.iter().filter(|f| patterns.matches(f)) {
        let src_abs = entry_path(workspace, src);
        let data = fs::read(&src_abs).map_err(ErrorKind::io(&src_abs))?;

        let Some((dst, content)) = substitution.apply(src, &data) else {
            continue;
        };
        check_collision(src, &dst, &originals)?;

        let dst_abs = entry_path(workspace, &dst);
        if let Some(parent) = dst_abs.parent() {
            fs::create_dir_all(parent).map_err(ErrorKind::io(parent))?;
        }
        fs::write(&dst_abs, content.as_deref().unwrap_or(&data))
            .map_err(ErrorKind::io(&dst_abs))?;
        if dst != *src {
            fs::remove_file(&src_abs).map_err(ErrorKind::io(&src_abs))?;
        }

        tracing::debug!(entry = %src, target = %dst, "rewrote entry");
        plan.record(src.as_str(), dst);
    }

    Ok(plan)
}

fn check_collision(src: &str, dst: &str, originals: &HashSet<String>) -> Result<(), ErrorKind> {
    if dst != src && originals.contains(dst) {
        return Err(ErrorKind::MalformedArchive {
            entry: src.to_string(),
            reason: format!("renaming would overwrite existing entry {dst}"),
        });
    }
    Ok(())
}
