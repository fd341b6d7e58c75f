//! Request/response encoding for the mirror protocol.
//!
//! Two verbs: `HELLO` (liveness check) and `XORBLOCK<bitstring>` (the PIR
//! query itself).

use uppir_bitstring::Bitstring;

use crate::error::ProtocolError;

const HELLO: &[u8] = b"HELLO";
const HI: &[u8] = b"HI!";
const XORBLOCK_PREFIX: &[u8] = b"XORBLOCK";
const INVALID_REQUEST_LENGTH: &[u8] = b"Invalid request length";
const INVALID_REQUEST_TYPE: &[u8] = b"Invalid request type";

/// A request a client sends to a mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorRequest {
    Hello,
    XorBlock(Bitstring),
}

impl MirrorRequest {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            MirrorRequest::Hello => HELLO.to_vec(),
            MirrorRequest::XorBlock(bitstring) => {
                let mut out = Vec::with_capacity(XORBLOCK_PREFIX.len() + bitstring.len());
                out.extend_from_slice(XORBLOCK_PREFIX);
                out.extend_from_slice(bitstring.as_bytes());
                out
            }
        }
    }

    /// Parses raw request bytes as received by a mirror server.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes == HELLO {
            return Ok(MirrorRequest::Hello);
        }
        if let Some(rest) = bytes.strip_prefix(XORBLOCK_PREFIX) {
            return Ok(MirrorRequest::XorBlock(Bitstring::from_bytes(rest.to_vec())));
        }
        Err(ProtocolError::UnknownVerb)
    }
}

/// A mirror's reply to a [`MirrorRequest::Hello`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloAck;

impl HelloAck {
    pub fn encode() -> Vec<u8> {
        HI.to_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes == HI {
            Ok(HelloAck)
        } else {
            Err(ProtocolError::UnexpectedResponse)
        }
    }
}

/// A mirror's reply to a [`MirrorRequest::XorBlock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XorBlockResponse {
    Block(Vec<u8>),
    InvalidRequestLength,
    InvalidRequestType,
}

impl XorBlockResponse {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            XorBlockResponse::Block(bytes) => bytes.clone(),
            XorBlockResponse::InvalidRequestLength => INVALID_REQUEST_LENGTH.to_vec(),
            XorBlockResponse::InvalidRequestType => INVALID_REQUEST_TYPE.to_vec(),
        }
    }

    /// Parses a mirror's reply, given the `block_size` the client expects a
    /// successful reply to be.
    pub fn decode(bytes: &[u8], block_size: usize) -> Self {
        if bytes == INVALID_REQUEST_LENGTH {
            XorBlockResponse::InvalidRequestLength
        } else if bytes == INVALID_REQUEST_TYPE {
            XorBlockResponse::InvalidRequestType
        } else if bytes.len() == block_size {
            XorBlockResponse::Block(bytes.to_vec())
        } else {
            // Closest fit among the known shapes; a block of exactly the
            // expected size is unambiguous in practice.
            XorBlockResponse::InvalidRequestLength
        }
    }
}
