//! Errors for manifest parsing, validation, and release packing.

use thiserror::Error;
use uppir_datastore::DatastoreError;

/// Errors raised while building, parsing, or validating a [`crate::Manifest`],
/// or while packing/unpacking files against one.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A local API received a malformed argument (bad geometry, unknown hash
    /// algorithm, negative/overlapping offsets, ...).
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// The manifest itself failed structural or semantic validation: a
    /// missing key equivalent, `len(block_hashes) != block_count`,
    /// overlapping file intervals, an escaping file name, or an
    /// unrecognized hash algorithm.
    #[error("corrupt manifest: {0}")]
    CorruptManifest(String),

    /// A file listed in the manifest could not be found under the mirror
    /// root.
    #[error("file not found in mirror root: {0}")]
    FileNotFound(String),

    /// A file was found but its length or hash did not match the manifest.
    #[error("incorrect file contents: {0}")]
    IncorrectFileContents(String),

    /// Malformed JSON, or JSON that doesn't match the manifest schema.
    #[error("invalid manifest JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Underlying datastore operation failed (geometry or range error).
    #[error(transparent)]
    Datastore(#[from] DatastoreError),

    /// Filesystem I/O failure while reading a release file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
