//! Disposable working directories.

use std::path::Path;

use crate::error::ErrorKind;

/// A temporary directory removed on [`Scratch::release`] or, failing that,
/// on drop.
#[derive(Debug)]
pub struct Scratch {
    temp_dir: tempfile::TempDir,
}

impl Scratch {
    /// Create a directory under the system temp path.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Io`] if the directory cannot be created.
    pub fn new(prefix: &str) -> Result<Self, ErrorKind> {
        Self::new_in(prefix, &std::env::temp_dir())
    }

    /// Create a directory under `parent`, so that files built inside it can
    /// be renamed onto `parent` without crossing filesystems.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Io`] if the directory cannot be created.
    pub fn new_in(prefix: &str, parent: &Path) -> Result<Self, ErrorKind> {
        let temp_dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(parent)
            .map_err(ErrorKind::io(parent))?;
        Ok(Self { temp_dir })
    }

    /// Access the root path
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Remove the directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Io`] if removal fails.
    pub fn release(self) -> Result<(), ErrorKind> {
        let path = self.temp_dir.path().to_path_buf();
        self.temp_dir.close().map_err(ErrorKind::io(&path))
    }
}
