//! The word-chunked, branch-free XOR kernel.
//!
//! Every block in the datastore is visited exactly once per query; whether a
//! block contributes is decided by a mask derived from its selection bit
//! rather than an `if`, so the kernel performs one uniform linear pass
//! regardless of how sparse or dense the selection is. `block_size` being a
//! multiple of 64 bytes (enforced in [`crate::XorDatastore::new`]) guarantees
//! every block divides evenly into 8-byte words, so there is never a tail
//! loop within a block.

/// XORs `block` into `acc`, masked by `bit` (0 or 1), without branching on
/// `bit` itself. `acc` and `block` must have equal length.
pub(crate) fn xor_block_masked_into(acc: &mut [u8], block: &[u8], bit: u8) {
    debug_assert_eq!(acc.len(), block.len());

    // 0 -> 0x00, 1 -> 0xFFFFFFFFFFFFFFFF. No data-dependent branch.
    let mask: u64 = 0u64.wrapping_sub(bit as u64);

    let mut acc_words = acc.chunks_exact_mut(8);
    let mut block_words = block.chunks_exact(8);
    for (a, b) in (&mut acc_words).zip(&mut block_words) {
        let av = u64::from_ne_bytes(a[..8].try_into().unwrap());
        let bv = u64::from_ne_bytes(b[..8].try_into().unwrap()) & mask;
        a.copy_from_slice(&(av ^ bv).to_ne_bytes());
    }

    // Defensive only: block_size is validated to be a multiple of 64 (hence
    // of 8) at construction, so this remainder is always empty.
    let byte_mask = mask as u8;
    for (a, b) in acc_words
        .into_remainder()
        .iter_mut()
        .zip(block_words.into_remainder())
    {
        *a ^= b & byte_mask;
    }
}

/// Byte-wise XOR of two equal-length buffers, used to combine partial
/// accumulators from parallel workers. Infrequent relative to
/// [`xor_block_masked_into`] (only `O(log(partitions))` calls per query).
pub(crate) fn xor_bytes_into(acc: &mut [u8], other: &[u8]) {
    debug_assert_eq!(acc.len(), other.len());
    for (a, b) in acc.iter_mut().zip(other.iter()) {
        *a ^= b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_zero_is_noop() {
        let mut acc = vec![0xAAu8; 64];
        let block = vec![0xFFu8; 64];
        xor_block_masked_into(&mut acc, &block, 0);
        assert_eq!(acc, vec![0xAAu8; 64]);
    }

    #[test]
    fn mask_one_xors_fully() {
        let mut acc = vec![0xAAu8; 64];
        let block = vec![0xFFu8; 64];
        xor_block_masked_into(&mut acc, &block, 1);
        assert_eq!(acc, vec![0x55u8; 64]);
    }
}
