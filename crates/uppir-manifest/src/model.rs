//! The manifest data model: what a vendor publishes and what clients verify
//! mirror responses against.

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::hash::{HashAlgorithm, HashValue};

/// One file packed into the release's datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub hash: HashValue,
    pub offset: usize,
    pub length: usize,
}

/// A signed description of a release: its block geometry, the hash of every
/// block, and where each file lives within it.
///
/// Field names mirror the wire format; `#[serde(rename)]` keeps the Rust
/// names idiomatic while the JSON stays compatible with existing manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "manifestversion")]
    pub manifest_version: String,

    #[serde(rename = "hashalgorithm")]
    pub hash_algorithm: String,

    #[serde(rename = "blocksize")]
    pub block_size: usize,

    #[serde(rename = "blockcount")]
    pub block_count: usize,

    #[serde(rename = "blockhashlist")]
    pub block_hashes: Vec<HashValue>,

    #[serde(rename = "vendorhostname")]
    pub vendor_hostname: String,

    #[serde(rename = "vendorport")]
    pub vendor_port: u16,

    #[serde(rename = "manifesthash")]
    pub manifest_hash: HashValue,

    #[serde(rename = "fileinfolist")]
    pub files: Vec<FileInfo>,
}

/// Shadow of [`Manifest`] missing `manifest_hash`, used only to compute the
/// canonical bytes that `manifest_hash` itself is a digest of. The hash
/// covers every other field and nothing else.
#[derive(Serialize)]
struct ManifestForHashing<'a> {
    #[serde(rename = "manifestversion")]
    manifest_version: &'a str,
    #[serde(rename = "hashalgorithm")]
    hash_algorithm: &'a str,
    #[serde(rename = "blocksize")]
    block_size: usize,
    #[serde(rename = "blockcount")]
    block_count: usize,
    #[serde(rename = "blockhashlist")]
    block_hashes: &'a [HashValue],
    #[serde(rename = "vendorhostname")]
    vendor_hostname: &'a str,
    #[serde(rename = "vendorport")]
    vendor_port: u16,
    #[serde(rename = "fileinfolist")]
    files: &'a [FileInfo],
}

impl Manifest {
    /// Computes the digest a correctly-formed manifest's `manifest_hash`
    /// field must equal: the chosen algorithm's digest of this manifest's
    /// JSON serialization with the `manifest_hash` field itself omitted.
    pub fn compute_manifest_hash(&self) -> Result<HashValue, ManifestError> {
        let algorithm = HashAlgorithm::parse(&self.hash_algorithm)?;
        let shadow = ManifestForHashing {
            manifest_version: &self.manifest_version,
            hash_algorithm: &self.hash_algorithm,
            block_size: self.block_size,
            block_count: self.block_count,
            block_hashes: &self.block_hashes,
            vendor_hostname: &self.vendor_hostname,
            vendor_port: self.vendor_port,
            files: &self.files,
        };
        let raw = serde_json::to_vec(&shadow)?;
        Ok(algorithm.digest(&raw))
    }

    /// Structural and semantic validation: every block has a hash, the hash
    /// algorithm is recognized, the manifest's self-hash matches, file
    /// intervals don't overlap, and no file name escapes the mirror root.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.block_hashes.len() != self.block_count {
            return Err(ManifestError::CorruptManifest(format!(
                "block_count is {} but {} block hashes were listed",
                self.block_count,
                self.block_hashes.len()
            )));
        }

        HashAlgorithm::parse(&self.hash_algorithm)?;

        let computed = self.compute_manifest_hash()?;
        if computed != self.manifest_hash {
            return Err(ManifestError::CorruptManifest(
                "manifest_hash does not match manifest contents".to_string(),
            ));
        }

        let mut intervals: Vec<(usize, usize)> = Vec::with_capacity(self.files.len());
        for file in &self.files {
            if is_escaping_path(&file.filename) {
                return Err(ManifestError::CorruptManifest(format!(
                    "file name '{}' escapes the mirror root",
                    file.filename
                )));
            }
            intervals.push((file.offset, file.length));
        }
        intervals.sort_unstable();

        let mut next_free_offset = 0usize;
        for (offset, length) in intervals {
            if offset < next_free_offset {
                return Err(ManifestError::CorruptManifest(
                    "file intervals overlap".to_string(),
                ));
            }
            next_free_offset = offset
                .checked_add(length)
                .ok_or_else(|| ManifestError::CorruptManifest("file interval overflows".to_string()))?;
        }

        Ok(())
    }
}

/// Rejects absolute paths and any path containing a `..` component.
fn is_escaping_path(filename: &str) -> bool {
    use std::path::{Component, Path};

    let path = Path::new(filename);
    if path.is_absolute() {
        return true;
    }
    path.components()
        .any(|component| matches!(component, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> Manifest {
        let algo = HashAlgorithm::parse("sha256-hex").unwrap();
        let files = vec![FileInfo {
            filename: "readme.txt".to_string(),
            hash: algo.digest(b"hello"),
            offset: 0,
            length: 5,
        }];
        let block_hashes = vec![algo.digest(&[0u8; 64])];
        let mut manifest = Manifest {
            manifest_version: "1.0".to_string(),
            hash_algorithm: "sha256-hex".to_string(),
            block_size: 64,
            block_count: 1,
            block_hashes,
            vendor_hostname: "vendor.example".to_string(),
            vendor_port: 62293,
            manifest_hash: HashValue::default(),
            files,
        };
        manifest.manifest_hash = manifest.compute_manifest_hash().unwrap();
        manifest
    }

    #[test]
    fn valid_manifest_passes() {
        sample_manifest().validate().unwrap();
    }

    #[test]
    fn tampered_hash_is_rejected() {
        let mut manifest = sample_manifest();
        manifest.block_size = 128;
        assert!(matches!(manifest.validate(), Err(ManifestError::CorruptManifest(_))));
    }

    #[test]
    fn mismatched_block_hash_count_is_rejected() {
        let mut manifest = sample_manifest();
        manifest.block_count = 2;
        manifest.manifest_hash = manifest.compute_manifest_hash().unwrap_or_default();
        assert!(matches!(manifest.validate(), Err(ManifestError::CorruptManifest(_))));
    }

    #[test]
    fn escaping_filename_is_rejected() {
        let mut manifest = sample_manifest();
        manifest.files[0].filename = "../outside.txt".to_string();
        manifest.manifest_hash = manifest.compute_manifest_hash().unwrap();
        assert!(matches!(manifest.validate(), Err(ManifestError::CorruptManifest(_))));
    }

    #[test]
    fn overlapping_files_are_rejected() {
        let mut manifest = sample_manifest();
        manifest.files.push(FileInfo {
            filename: "other.txt".to_string(),
            hash: HashAlgorithm::parse("sha256-hex").unwrap().digest(b"x"),
            offset: 2,
            length: 3,
        });
        manifest.manifest_hash = manifest.compute_manifest_hash().unwrap();
        assert!(matches!(manifest.validate(), Err(ManifestError::CorruptManifest(_))));
    }

    #[test]
    fn json_round_trips() {
        let manifest = sample_manifest();
        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest, back);
        back.validate().unwrap();
    }
}
