//! Wheel filename conventions.
//!
//! `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl`

use std::sync::LazyLock;

use regex::Regex;

/// Extension of a wheel archive.
pub const WHEEL_EXTENSION: &str = ".whl";

static LOCAL_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\+.*?-").unwrap());

/// The components of a wheel filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelFilename {
    /// Distribution name.
    pub name: String,
    /// Version, possibly with a `+local` segment.
    pub version: String,
    /// Optional build tag.
    pub build: Option<String>,
    /// Python tag, e.g. `cp39`.
    pub python: String,
    /// ABI tag.
    pub abi: String,
    /// Platform tag, e.g. `manylinux2014_x86_64`.
    pub platform: String,
}

impl WheelFilename {
    /// Parse a wheel filename. Returns `None` if it does not have the
    /// `.whl` extension or the expected five or six dash-separated parts.
    pub fn parse(filename: &str) -> Option<Self> {
        let stem = filename.strip_suffix(WHEEL_EXTENSION)?;
        let parts: Vec<&str> = stem.split('-').collect();
        let (name, version, build, tags) = match parts.as_slice() {
            [name, version, tags @ ..] if tags.len() == 3 => (*name, *version, None, tags),
            [name, version, build, tags @ ..] if tags.len() == 3 => {
                (*name, *version, Some((*build).to_string()), tags)
            }
            _ => return None,
        };
        if name.is_empty() || version.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            version: version.to_string(),
            build,
            python: tags[0].to_string(),
            abi: tags[1].to_string(),
            platform: tags[2].to_string(),
        })
    }
}

/// Map a build-index wheel name onto the name the package index publishes
/// the same build under: the `+local` version segment is dropped and a
/// bare `linux_` platform tag becomes `manylinux2014_`.
///
/// ```
/// use reversion_schema::wheel::strip_local_version;
///
/// assert_eq!(
///     strip_local_version("pkg-2.0.0+git1a2b3c-cp39-cp39-linux_x86_64.whl"),
///     "pkg-2.0.0-cp39-cp39-manylinux2014_x86_64.whl"
/// );
/// ```
pub fn strip_local_version(filename: &str) -> String {
    LOCAL_VERSION
        .replace_all(filename, "-")
        .replace("-linux_", "-manylinux2014_")
}

/// Platform tag handed to the package builder for a wheel: the wheel's
/// own platform tag with `manylinux2014` spelled `linux`.
pub fn builder_platform(filename: &str) -> Option<String> {
    WheelFilename::parse(filename).map(|w| w.platform.replace("manylinux2014", "linux"))
}
