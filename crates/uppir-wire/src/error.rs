use thiserror::Error;

/// Errors raised while framing or parsing mirror/vendor protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message of {len} bytes exceeds the {max}-byte cap")]
    MessageTooLarge { len: u64, max: u64 },

    #[error("unrecognized request verb")]
    UnknownVerb,

    #[error("unexpected response from peer")]
    UnexpectedResponse,

    #[error("malformed JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed before a complete message arrived")]
    Truncated,
}
