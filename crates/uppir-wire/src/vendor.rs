//! Request/response encoding for the vendor protocol.
//!
//! Four verbs: `HELLO`, `GET MANIFEST`, `GET MIRRORLIST`, and
//! `MIRRORADVERTISE<json>`.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

const HELLO: &[u8] = b"HELLO";
const VENDOR_HI: &[u8] = b"VENDORHI!";
const GET_MANIFEST: &[u8] = b"GET MANIFEST";
const GET_MIRRORLIST: &[u8] = b"GET MIRRORLIST";
const MIRRORADVERTISE_PREFIX: &[u8] = b"MIRRORADVERTISE";
const OK: &[u8] = b"OK";
const ERROR_PREFIX: &str = "Error";

/// What a mirror advertises about itself to the vendor. `ip` and `port` are
/// load-bearing (the vendor checks `ip` against the observed peer address);
/// anything else a mirror includes (e.g. an `http_port` for legacy HTTP
/// serving) rides along opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorDescriptor {
    pub ip: String,
    pub port: u16,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A request a client or mirror sends to the vendor.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorRequest {
    Hello,
    GetManifest,
    GetMirrorList,
    MirrorAdvertise(MirrorDescriptor),
}

impl VendorRequest {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(match self {
            VendorRequest::Hello => HELLO.to_vec(),
            VendorRequest::GetManifest => GET_MANIFEST.to_vec(),
            VendorRequest::GetMirrorList => GET_MIRRORLIST.to_vec(),
            VendorRequest::MirrorAdvertise(descriptor) => {
                let mut out = MIRRORADVERTISE_PREFIX.to_vec();
                out.extend_from_slice(&serde_json::to_vec(descriptor)?);
                out
            }
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes == HELLO {
            return Ok(VendorRequest::Hello);
        }
        if bytes == GET_MANIFEST {
            return Ok(VendorRequest::GetManifest);
        }
        if bytes == GET_MIRRORLIST {
            return Ok(VendorRequest::GetMirrorList);
        }
        if let Some(rest) = bytes.strip_prefix(MIRRORADVERTISE_PREFIX) {
            let descriptor: MirrorDescriptor = serde_json::from_slice(rest)?;
            return Ok(VendorRequest::MirrorAdvertise(descriptor));
        }
        Err(ProtocolError::UnknownVerb)
    }
}

/// The vendor's reply to [`VendorRequest::Hello`].
pub struct HelloAck;

impl HelloAck {
    pub fn encode() -> Vec<u8> {
        VENDOR_HI.to_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes == VENDOR_HI {
            Ok(HelloAck)
        } else {
            Err(ProtocolError::UnexpectedResponse)
        }
    }
}

/// The vendor's reply to [`VendorRequest::MirrorAdvertise`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvertiseResponse {
    Ok,
    Error(String),
}

impl AdvertiseResponse {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AdvertiseResponse::Ok => OK.to_vec(),
            AdvertiseResponse::Error(message) => format!("{ERROR_PREFIX}: {message}").into_bytes(),
        }
    }

    pub fn decode(bytes: &[u8]) -> Self {
        if bytes == OK {
            return AdvertiseResponse::Ok;
        }
        let text = String::from_utf8_lossy(bytes).into_owned();
        AdvertiseResponse::Error(text)
    }

    pub fn is_error(bytes: &[u8]) -> bool {
        bytes.starts_with(ERROR_PREFIX.as_bytes())
    }
}
