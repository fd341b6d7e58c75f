//! Errors for bitstring operations.

use thiserror::Error;

/// Errors raised by bit-level operations on a [`crate::Bitstring`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BitstringError {
    /// A bit index fell outside `0..8*len(bitstring)`.
    #[error("bit index {index} out of range for a {len}-byte bitstring")]
    BadArgument {
        /// The offending index.
        index: usize,
        /// The bitstring's length in bytes.
        len: usize,
    },

    /// Two bitstrings of different lengths were combined (e.g. XORed).
    #[error("bitstring length mismatch: {left} vs {right}")]
    LengthMismatch {
        /// Length of the left-hand operand.
        left: usize,
        /// Length of the right-hand operand.
        right: usize,
    },
}
