use thiserror::Error;

/// Errors raised by [`crate::RequestorState`].
#[derive(Debug, Error)]
pub enum RequestorError {
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// Fewer mirrors were offered than the requested privacy threshold, or
    /// the backup pool was exhausted while recovering from a failure.
    #[error("insufficient mirrors: {0}")]
    InsufficientMirrors(String),

    /// A reconstructed block's hash did not match the manifest despite every
    /// contributing mirror having replied.
    #[error("corrupt data: block {block_num} failed hash verification")]
    CorruptData { block_num: usize },

    /// A caller passed back a request tuple that does not correspond to an
    /// outstanding request this state machine handed out.
    #[error("internal error: {0}")]
    InternalError(String),
}
