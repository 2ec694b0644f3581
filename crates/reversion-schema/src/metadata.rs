//! The `*.dist-info` metadata directory and its METADATA file.

use std::sync::LazyLock;

use regex::Regex;

/// Suffix that marks the metadata directory of a wheel.
pub const DIST_INFO_SUFFIX: &str = ".dist-info";

/// File inside the metadata directory that declares the version.
pub const METADATA_FILE: &str = "METADATA";

static VERSION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Version: (?P<version>\S+)").unwrap());

/// Whether a top-level directory name is a metadata directory.
pub fn is_dist_info_dir(name: &str) -> bool {
    name.len() > DIST_INFO_SUFFIX.len() && name.ends_with(DIST_INFO_SUFFIX)
}

/// The value of the first `Version: <value>` line, if any.
///
/// Only lines that start with the declaration count; the first match wins.
pub fn parse_version(metadata: &str) -> Option<&str> {
    metadata.lines().find_map(|line| {
        VERSION_LINE
            .captures(line)
            .and_then(|caps| caps.name("version"))
            .map(|m| m.as_str())
    })
}
