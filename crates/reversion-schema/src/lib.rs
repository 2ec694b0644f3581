//! Wire formats shared by the reversioning engine: content fingerprints,
//! RECORD manifest lines, the METADATA version declaration and wheel
//! filenames.

pub mod fingerprint;
pub mod metadata;
pub mod record;
pub mod wheel;

// Re-exports
pub use fingerprint::{Fingerprint, fingerprint};
pub use metadata::{DIST_INFO_SUFFIX, METADATA_FILE};
pub use record::{RECORD_FILE, RecordError, RecordLine};
pub use wheel::WheelFilename;
