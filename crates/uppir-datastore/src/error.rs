//! Errors for the XOR datastore.

use thiserror::Error;

/// Errors raised by [`crate::XorDatastore`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatastoreError {
    /// `block_size` or `block_count` was non-positive, or `block_size` was
    /// not a multiple of 64.
    #[error("invalid datastore geometry: block_size={block_size}, block_count={block_count}")]
    BadArgument {
        /// The rejected block size.
        block_size: usize,
        /// The rejected block count.
        block_count: usize,
    },

    /// A `set_data`/`get_data` range fell outside `[0, block_size*block_count)`.
    #[error("range [{offset}, {offset}+{length}) is out of bounds for a {capacity}-byte datastore")]
    OutOfBounds {
        /// Requested start offset.
        offset: usize,
        /// Requested length.
        length: usize,
        /// Total datastore capacity.
        capacity: usize,
    },

    /// `xor_of_selected_blocks` was given a bitstring of the wrong length.
    #[error("bitstring is {actual} bytes, expected {expected} for this datastore's block count")]
    BadRequestLength {
        /// Expected bitstring length in bytes.
        expected: usize,
        /// Actual bitstring length supplied.
        actual: usize,
    },
}
