//! Hash algorithm naming and digest computation.
//!
//! A manifest names its hash algorithm with a single string such as
//! `"sha256-hex"` or `"md5-raw"`: an algorithm name and an encoding joined by
//! a hyphen. The encoding historically distinguished hex-string digests from
//! raw-byte digests embedded directly in JSON; we always carry digests as
//! bytes internally and always serialize them as hex (see [`HashValue`]), so
//! the encoding only affects which strings `parse` accepts and `as_str`
//! reproduces. `"noop"` is a third, encoding-less form reserved for tests: it
//! always hashes to the empty digest.

use digest::Digest;
use md5::Md5;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::error::ManifestError;

/// The supported digest functions, named the way the manifest names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithmName {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithmName {
    fn as_str(self) -> &'static str {
        match self {
            HashAlgorithmName::Md5 => "md5",
            HashAlgorithmName::Sha1 => "sha1",
            HashAlgorithmName::Sha224 => "sha224",
            HashAlgorithmName::Sha256 => "sha256",
            HashAlgorithmName::Sha384 => "sha384",
            HashAlgorithmName::Sha512 => "sha512",
        }
    }
}

/// The suffix on a hash algorithm name. Only affects acceptance/round-trip
/// formatting: both encodings digest to the same bytes, and we always keep
/// those bytes as bytes ([`HashValue`] always JSON-encodes as hex regardless
/// of this field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashEncoding {
    Hex,
    Raw,
}

/// A parsed `"<algorithm>-<encoding>"` hash algorithm spec, or the `noop`
/// test-only spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Named(HashAlgorithmName, HashEncoding),
    /// Always hashes to the empty digest. For testing only.
    Noop,
}

impl HashAlgorithm {
    /// Parses strings like `"sha256-hex"`, `"md5-raw"`, or `"noop"`.
    pub fn parse(spec: &str) -> Result<Self, ManifestError> {
        if spec == "noop" {
            return Ok(HashAlgorithm::Noop);
        }

        let (name, encoding) = spec
            .split_once('-')
            .ok_or_else(|| ManifestError::BadArgument(format!("malformed hash algorithm: '{spec}'")))?;

        let name = match name {
            "md5" => HashAlgorithmName::Md5,
            "sha1" => HashAlgorithmName::Sha1,
            "sha224" => HashAlgorithmName::Sha224,
            "sha256" => HashAlgorithmName::Sha256,
            "sha384" => HashAlgorithmName::Sha384,
            "sha512" => HashAlgorithmName::Sha512,
            other => {
                return Err(ManifestError::BadArgument(format!(
                    "unknown hash algorithm: '{other}'"
                )))
            }
        };

        let encoding = match encoding {
            "hex" => HashEncoding::Hex,
            "raw" => HashEncoding::Raw,
            other => {
                return Err(ManifestError::BadArgument(format!(
                    "unknown hash encoding: '{other}'"
                )))
            }
        };

        Ok(HashAlgorithm::Named(name, encoding))
    }

    /// Reproduces the manifest-facing spec string for this algorithm.
    pub fn as_str(&self) -> String {
        match self {
            HashAlgorithm::Noop => "noop".to_string(),
            HashAlgorithm::Named(name, HashEncoding::Hex) => format!("{}-hex", name.as_str()),
            HashAlgorithm::Named(name, HashEncoding::Raw) => format!("{}-raw", name.as_str()),
        }
    }

    /// Computes the digest of `data` under this algorithm.
    pub fn digest(&self, data: &[u8]) -> HashValue {
        let bytes = match self {
            HashAlgorithm::Noop => Vec::new(),
            HashAlgorithm::Named(HashAlgorithmName::Md5, _) => Md5::digest(data).to_vec(),
            HashAlgorithm::Named(HashAlgorithmName::Sha1, _) => Sha1::digest(data).to_vec(),
            HashAlgorithm::Named(HashAlgorithmName::Sha224, _) => Sha224::digest(data).to_vec(),
            HashAlgorithm::Named(HashAlgorithmName::Sha256, _) => Sha256::digest(data).to_vec(),
            HashAlgorithm::Named(HashAlgorithmName::Sha384, _) => Sha384::digest(data).to_vec(),
            HashAlgorithm::Named(HashAlgorithmName::Sha512, _) => Sha512::digest(data).to_vec(),
        };
        HashValue(bytes)
    }
}

/// A digest, always carried as raw bytes and always JSON-encoded as a hex
/// string. Earlier tooling embedded raw digest bytes directly as JSON string
/// values for `-raw` algorithm specs, which is not valid JSON when a digest
/// contains non-UTF8 bytes; we sidestep that by always encoding as hex on
/// the wire, independent of the algorithm's declared encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct HashValue(Vec<u8>);

impl HashValue {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        HashValue(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl Serialize for HashValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for HashValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        Ok(HashValue(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_algorithms() {
        assert!(matches!(
            HashAlgorithm::parse("sha256-hex").unwrap(),
            HashAlgorithm::Named(HashAlgorithmName::Sha256, HashEncoding::Hex)
        ));
        assert!(matches!(
            HashAlgorithm::parse("md5-raw").unwrap(),
            HashAlgorithm::Named(HashAlgorithmName::Md5, HashEncoding::Raw)
        ));
        assert!(matches!(HashAlgorithm::parse("noop").unwrap(), HashAlgorithm::Noop));
    }

    #[test]
    fn rejects_unknown_algorithm() {
        assert!(HashAlgorithm::parse("sha999-hex").is_err());
        assert!(HashAlgorithm::parse("sha256").is_err());
        assert!(HashAlgorithm::parse("sha256-base64").is_err());
    }

    #[test]
    fn as_str_round_trips() {
        for spec in ["sha256-hex", "sha1-raw", "md5-hex", "noop"] {
            let algo = HashAlgorithm::parse(spec).unwrap();
            assert_eq!(algo.as_str(), spec);
        }
    }

    #[test]
    fn noop_always_empty() {
        let algo = HashAlgorithm::Noop;
        assert_eq!(algo.digest(b"anything").as_bytes(), b"");
        assert_eq!(algo.digest(b"").as_bytes(), b"");
    }

    #[test]
    fn hex_and_raw_encodings_digest_identically() {
        let hex_algo = HashAlgorithm::parse("sha256-hex").unwrap();
        let raw_algo = HashAlgorithm::parse("sha256-raw").unwrap();
        assert_eq!(hex_algo.digest(b"hello"), raw_algo.digest(b"hello"));
    }

    #[test]
    fn hash_value_json_round_trips_as_hex() {
        let value = HashValue::from_bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: HashValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
