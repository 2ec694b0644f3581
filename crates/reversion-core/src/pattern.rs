//! Rewrite selection by shell-style glob.
//!
//! Patterns are compiled once per run. Plain paths and `*literal` suffixes
//! are matched with string comparisons; anything else goes through
//! [`glob::Pattern`] with `*` confined to a single path segment.

use glob::{MatchOptions, Pattern};

use crate::error::ErrorKind;

/// Globs every run rewrites: the metadata directory (including nested
/// entries such as `licenses/`) and namespace-package `.pth` markers.
pub const DEFAULT_GLOBS: &[&str] = &["*.dist-info/*", "*.dist-info/**/*", "*-nspkg.pth"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One compiled pattern.
#[derive(Debug, Clone)]
enum Matcher {
    /// No metacharacters: the whole path must be equal.
    Exact(String),
    /// `*` followed by a literal within one segment.
    Suffix(String),
    /// Everything else.
    Glob(Pattern),
}

impl Matcher {
    fn compile(pattern: &str) -> Result<Self, ErrorKind> {
        let is_meta = |c: char| matches!(c, '*' | '?' | '[' | ']');

        if !pattern.contains(is_meta) {
            return Ok(Self::Exact(pattern.to_string()));
        }
        if let Some(rest) = pattern.strip_prefix('*')
            && !rest.is_empty()
            && !rest.contains(is_meta)
            && !rest.contains('/')
        {
            return Ok(Self::Suffix(rest.to_string()));
        }

        Pattern::new(pattern)
            .map(Self::Glob)
            .map_err(|source| ErrorKind::Pattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::Suffix(s) => {
                path.ends_with(s.as_str()) && !path[..path.len() - s.len()].contains('/')
            }
            Self::Glob(p) => p.matches_with(path, MATCH_OPTIONS),
        }
    }
}

/// A compiled set of rewrite globs; a path is selected if any matches.
#[derive(Debug, Clone)]
pub struct PatternSet {
    matchers: Vec<Matcher>,
}

impl PatternSet {
    /// Compile `globs`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Pattern`] for the first glob that fails to parse.
    pub fn compile<I, S>(globs: I) -> Result<Self, ErrorKind>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matchers = globs
            .into_iter()
            .map(|g| Matcher::compile(g.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    /// [`DEFAULT_GLOBS`] followed by caller-supplied extras.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Pattern`] if an extra glob fails to parse.
    pub fn with_defaults<S: AsRef<str>>(extra: &[S]) -> Result<Self, ErrorKind> {
        Self::compile(
            DEFAULT_GLOBS
                .iter()
                .copied()
                .chain(extra.iter().map(|s| s.as_ref())),
        )
    }

    /// Whether `path` (archive-relative, `/`-separated) is selected.
    pub fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Whether the set selects nothing.
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> PatternSet {
        PatternSet::with_defaults::<&str>(&[]).unwrap()
    }

    #[test]
    fn compiles_into_cheapest_matcher() {
        assert!(matches!(Matcher::compile("pkg/VERSION").unwrap(), Matcher::Exact(_)));
        assert!(matches!(Matcher::compile("*-nspkg.pth").unwrap(), Matcher::Suffix(_)));
        assert!(matches!(Matcher::compile("*.dist-info/*").unwrap(), Matcher::Glob(_)));
    }

    #[test]
    fn defaults_select_metadata_directory() {
        let set = defaults();
        assert!(set.matches("pkg-1.2.3.dist-info/METADATA"));
        assert!(set.matches("pkg-1.2.3.dist-info/RECORD"));
        assert!(set.matches("pkg-1.2.3.dist-info/licenses/LICENSE"));
        assert!(set.matches("pkg-1.2.3-py3.9-nspkg.pth"));
    }

    #[test]
    fn defaults_skip_package_payload() {
        let set = defaults();
        assert!(!set.matches("pkg/__init__.py"));
        assert!(!set.matches("pkg/native.so"));
        assert!(!set.matches("vendored/x.dist-info/METADATA/extra"));
        assert!(!set.matches("nested/pkg-nspkg.pth"));
    }

    #[test]
    fn star_does_not_cross_separator() {
        let set = PatternSet::compile(["pkg/*.txt"]).unwrap();
        assert!(set.matches("pkg/VERSION.txt"));
        assert!(!set.matches("pkg/sub/VERSION.txt"));
    }

    #[test]
    fn extras_are_appended() {
        let set = PatternSet::with_defaults(&["pkg/_version/VERSION", "pkg/VERSION"]).unwrap();
        assert_eq!(set.len(), DEFAULT_GLOBS.len() + 2);
        assert!(set.matches("pkg/_version/VERSION"));
        assert!(!set.matches("pkg/_version/VERSION.bak"));
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = PatternSet::compile(["pkg/[abc"]).unwrap_err();
        assert!(matches!(err, ErrorKind::Pattern { ref pattern, .. } if pattern == "pkg/[abc"));
        assert_eq!(err.exit_code(), 16);
    }
}
