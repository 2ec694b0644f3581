//! Content fingerprints in the encoding RECORD manifests use.
//!
//! A fingerprint is `sha256=<digest>` where the digest is URL-safe base64
//! with the `=` padding stripped, plus the content length in bytes.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Algorithm tag prefixed to every digest.
pub const FINGERPRINT_ALGORITHM: &str = "sha256";

/// Digest and size of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    digest: String,
    size: u64,
}

impl Fingerprint {
    /// Fingerprint an in-memory byte slice.
    pub fn compute(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self {
            digest: format!("{FINGERPRINT_ALGORITHM}={}", URL_SAFE_NO_PAD.encode(hash)),
            size: data.len() as u64,
        }
    }

    /// Fingerprint a file by reading it entirely into memory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn compute_file(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::compute(&data))
    }

    /// The tagged digest, e.g. `sha256=47DEQpj8...`.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Content length in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Split into the `(digest, decimal size)` pair written to a RECORD line.
    pub fn into_parts(self) -> (String, String) {
        (self.digest, self.size.to_string())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.digest, self.size)
    }
}

/// Compute the `(digest, size)` strings for `data`.
pub fn fingerprint(data: &[u8]) -> (String, String) {
    Fingerprint::compute(data).into_parts()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_has_known_digest() {
        let (digest, size) = fingerprint(b"");
        assert_eq!(digest, "sha256=47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU");
        assert_eq!(size, "0");
    }

    #[test]
    fn digest_is_url_safe_and_unpadded() {
        let fp = Fingerprint::compute(b"hello world");
        assert_eq!(fp.digest(), "sha256=uU0nuZNNPgilLlLX2n2r-sSE7-N6U4DukIj3rOLvzek");
        assert_eq!(fp.size(), 11);
        let encoded = fp.digest().trim_start_matches("sha256=");
        assert!(!encoded.contains(['=', '+', '/']));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let first = Fingerprint::compute(b"Version: 1.2.4\n");
        for _ in 0..8 {
            assert_eq!(Fingerprint::compute(b"Version: 1.2.4\n"), first);
        }
        assert_eq!(
            first.to_string(),
            "sha256=CEVKbkRl7rg4CYnxENOXhBTLOfwqRtk9wu0E7TbVeIQ,15"
        );
    }

    #[test]
    fn different_content_different_digest() {
        assert_ne!(
            Fingerprint::compute(b"Version: 1.2.3"),
            Fingerprint::compute(b"Version: 1.2.4")
        );
    }

    #[test]
    fn compute_file_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0u8, 1, 2, 255]).unwrap();
        assert_eq!(
            Fingerprint::compute_file(&path).unwrap(),
            Fingerprint::compute(&[0u8, 1, 2, 255])
        );
    }
}
