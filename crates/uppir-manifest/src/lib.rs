//! The upPIR release manifest: the signed description of a release's block
//! geometry and file layout that clients verify mirror responses against.

mod create;
mod error;
mod extract;
mod hash;
mod model;

pub use create::{create_manifest, populate_xordatastore};
pub use error::ManifestError;
pub use extract::{extract_file_from_blockdict, get_blocklist_for_file, get_filenames_in_release};
pub use hash::{HashAlgorithm, HashAlgorithmName, HashEncoding, HashValue};
pub use model::{FileInfo, Manifest};
