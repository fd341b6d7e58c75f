//! The fixed-geometry XOR block datastore.
//!
//! Owns a contiguous, zero-initialized byte buffer of `block_size *
//! block_count` bytes. Block `i` occupies
//! `buf[i*block_size .. (i+1)*block_size)`. The datastore is populated once
//! via [`XorDatastore::set_data`] and thereafter served read-only via
//! [`XorDatastore::xor_of_selected_blocks`], the PIR primitive and the
//! CPU-critical hot path of the whole system.

mod error;
mod kernel;

pub use error::DatastoreError;

use kernel::{xor_block_masked_into, xor_bytes_into};
use rayon::prelude::*;
use uppir_bitstring::Bitstring;

/// A fixed-size byte store supporting random-access reads/writes and the
/// `xor_of_selected_blocks` PIR query.
pub struct XorDatastore {
    block_size: usize,
    block_count: usize,
    buf: Vec<u8>,
}

impl XorDatastore {
    /// Allocates a zeroed datastore of `block_count` blocks of `block_size`
    /// bytes each. `block_size` must be a positive multiple of 64 so the XOR
    /// kernel never needs a tail loop within a block; `block_count` must be
    /// positive.
    pub fn new(block_size: usize, block_count: usize) -> Result<Self, DatastoreError> {
        if block_size == 0 || block_count == 0 || block_size % 64 != 0 {
            return Err(DatastoreError::BadArgument {
                block_size,
                block_count,
            });
        }
        Ok(Self {
            block_size,
            block_count,
            buf: vec![0u8; block_size * block_count],
        })
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Total capacity in bytes (`block_size * block_count`).
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn check_range(&self, offset: usize, length: usize) -> Result<(), DatastoreError> {
        let end = offset.checked_add(length);
        match end {
            Some(end) if end <= self.buf.len() => Ok(()),
            _ => Err(DatastoreError::OutOfBounds {
                offset,
                length,
                capacity: self.buf.len(),
            }),
        }
    }

    /// Writes `bytes` at `offset`. Only intended for use while populating the
    /// datastore before any query is served; behavior during concurrent
    /// queries is undefined (the datastore does not itself serialize writers
    /// against readers).
    pub fn set_data(&mut self, offset: usize, bytes: &[u8]) -> Result<(), DatastoreError> {
        self.check_range(offset, bytes.len())?;
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Returns a copy of `buf[offset..offset+length)`.
    pub fn get_data(&self, offset: usize, length: usize) -> Result<Vec<u8>, DatastoreError> {
        self.check_range(offset, length)?;
        Ok(self.buf[offset..offset + length].to_vec())
    }

    /// Returns the XOR of every block `i` for which bit `i` of `bitstring` is
    /// set. An all-zero bitstring yields an all-zero block; an all-ones
    /// bitstring (padding bits zero) yields the XOR of every block.
    ///
    /// Every block is visited exactly once, masked by its selection bit
    /// rather than skipped with a branch (see `kernel`), so the kernel's
    /// cost is a single linear scan of the buffer regardless of selection
    /// density. Blocks are folded in parallel chunks to approach
    /// memory-bandwidth throughput.
    pub fn xor_of_selected_blocks(&self, bitstring: &Bitstring) -> Result<Vec<u8>, DatastoreError> {
        let expected_len = Bitstring::length_for(self.block_count);
        if bitstring.len() != expected_len {
            return Err(DatastoreError::BadRequestLength {
                expected: expected_len,
                actual: bitstring.len(),
            });
        }

        let block_size = self.block_size;
        let result = self
            .buf
            .par_chunks(block_size)
            .enumerate()
            .fold(
                || vec![0u8; block_size],
                |mut acc, (index, block)| {
                    // block_count <= number of chunks, and every index here
                    // is < block_count by construction of `buf`.
                    let bit = bitstring.get(index).expect("index within block_count");
                    xor_block_masked_into(&mut acc, block, bit);
                    acc
                },
            )
            .reduce(
                || vec![0u8; block_size],
                |mut a, b| {
                    xor_bytes_into(&mut a, &b);
                    a
                },
            );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn naive_xor(buf: &[u8], block_size: usize, block_count: usize, bs: &Bitstring) -> Vec<u8> {
        let mut acc = vec![0u8; block_size];
        for i in 0..block_count {
            if bs.get(i).unwrap() == 1 {
                let block = &buf[i * block_size..(i + 1) * block_size];
                for (a, b) in acc.iter_mut().zip(block) {
                    *a ^= b;
                }
            }
        }
        acc
    }

    #[test]
    fn rejects_non_multiple_of_64_block_size() {
        assert!(matches!(
            XorDatastore::new(63, 4),
            Err(DatastoreError::BadArgument { .. })
        ));
        assert!(matches!(
            XorDatastore::new(0, 4),
            Err(DatastoreError::BadArgument { .. })
        ));
        assert!(matches!(
            XorDatastore::new(64, 0),
            Err(DatastoreError::BadArgument { .. })
        ));
    }

    #[test]
    fn all_zero_bitstring_yields_zero_block() {
        let mut ds = XorDatastore::new(64, 3).unwrap();
        ds.set_data(0, &[0xFFu8; 64 * 3]).unwrap();
        let bs = Bitstring::zeroed(3);
        let out = ds.xor_of_selected_blocks(&bs).unwrap();
        assert_eq!(out, vec![0u8; 64]);
    }

    #[test]
    fn all_ones_bitstring_yields_full_xor() {
        let mut ds = XorDatastore::new(64, 3).unwrap();
        ds.set_data(0, &[1u8; 64]).unwrap();
        ds.set_data(64, &[2u8; 64]).unwrap();
        ds.set_data(128, &[4u8; 64]).unwrap();
        let bs = Bitstring::zeroed(3).set(0, 1).unwrap().set(1, 1).unwrap().set(2, 1).unwrap();
        let out = ds.xor_of_selected_blocks(&bs).unwrap();
        assert_eq!(out, vec![7u8; 64]);
    }

    #[test]
    fn wrong_length_bitstring_is_rejected() {
        let ds = XorDatastore::new(64, 3).unwrap();
        let bs = Bitstring::zeroed(100);
        assert!(matches!(
            ds.xor_of_selected_blocks(&bs),
            Err(DatastoreError::BadRequestLength { .. })
        ));
    }

    #[test]
    fn scenario_s1_from_spec() {
        // block_size=4 is rejected by new() (must be a multiple of 64); this
        // exercises the same semantics at block_size=64 with repeated bytes
        // standing in for the spec's 4-byte "AAAA"/"BBBB"/"CCCC" blocks.
        let mut ds = XorDatastore::new(64, 3).unwrap();
        ds.set_data(0, &[b'A'; 64]).unwrap();
        ds.set_data(64, &[b'B'; 64]).unwrap();
        ds.set_data(128, &[b'C'; 64]).unwrap();
        let bs = Bitstring::zeroed(3).set(0, 1).unwrap().set(1, 1).unwrap().set(2, 1).unwrap();
        let out = ds.xor_of_selected_blocks(&bs).unwrap();
        let expected = b'A' ^ b'B' ^ b'C';
        assert_eq!(out, vec![expected; 64]);
    }

    proptest! {
        #[test]
        fn matches_naive_xor(
            block_count in 1usize..20,
            seed in prop::collection::vec(any::<u8>(), 0..2048),
            select_seed in any::<u64>(),
        ) {
            let block_size = 64;
            let mut ds = XorDatastore::new(block_size, block_count).unwrap();
            let mut buf = vec![0u8; block_size * block_count];
            for (i, byte) in seed.iter().enumerate() {
                if i < buf.len() {
                    buf[i] = *byte;
                }
            }
            ds.set_data(0, &buf).unwrap();

            let mut bs = Bitstring::zeroed(block_count);
            for i in 0..block_count {
                let bit = ((select_seed >> (i % 64)) & 1) as u8;
                bs = bs.set(i, bit).unwrap();
            }

            let expected = naive_xor(&buf, block_size, block_count, &bs);
            let actual = ds.xor_of_selected_blocks(&bs).unwrap();
            prop_assert_eq!(actual, expected);
        }
    }
}
