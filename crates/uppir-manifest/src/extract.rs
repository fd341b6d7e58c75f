//! Mapping between files and the blocks that back them.

use std::collections::HashMap;

use crate::error::ManifestError;
use crate::model::Manifest;

fn find_file<'a>(manifest: &'a Manifest, filename: &str) -> Result<&'a crate::model::FileInfo, ManifestError> {
    manifest
        .files
        .iter()
        .find(|f| f.filename == filename)
        .ok_or_else(|| ManifestError::FileNotFound(filename.to_string()))
}

/// Returns the block numbers needed to reconstruct `filename`.
pub fn get_blocklist_for_file(manifest: &Manifest, filename: &str) -> Result<Vec<usize>, ManifestError> {
    let file = find_file(manifest, filename)?;
    if file.length == 0 {
        return Ok(Vec::new());
    }
    let start_block = file.offset / manifest.block_size;
    let end_block = (file.offset + file.length - 1) / manifest.block_size;
    Ok((start_block..=end_block).collect())
}

/// Reconstitutes a file's bytes from a map of block number to block
/// contents. `blockdict` must contain every block [`get_blocklist_for_file`]
/// names for this file.
pub fn extract_file_from_blockdict(
    manifest: &Manifest,
    filename: &str,
    blockdict: &HashMap<usize, Vec<u8>>,
) -> Result<Vec<u8>, ManifestError> {
    let file = find_file(manifest, filename)?;
    let block_size = manifest.block_size;

    let start_block = file.offset / block_size;
    let start_offset = file.offset % block_size;
    let end = file.offset + file.length;
    let end_block = end / block_size;
    let end_offset = end % block_size;

    let block_bytes = |num: usize| -> Result<&Vec<u8>, ManifestError> {
        blockdict
            .get(&num)
            .ok_or_else(|| ManifestError::BadArgument(format!("missing block {num} needed to extract '{filename}'")))
    };

    if start_block == end_block {
        let block = block_bytes(start_block)?;
        return Ok(block[start_offset..end_offset].to_vec());
    }

    let mut out = Vec::with_capacity(file.length);
    out.extend_from_slice(&block_bytes(start_block)?[start_offset..]);
    for block_num in start_block + 1..end_block {
        out.extend_from_slice(block_bytes(block_num)?);
    }
    if end_offset > 0 {
        out.extend_from_slice(&block_bytes(end_block)?[..end_offset]);
    }
    Ok(out)
}

/// Lists every file name packed into the release.
pub fn get_filenames_in_release(manifest: &Manifest) -> Vec<String> {
    manifest.files.iter().map(|f| f.filename.clone()).collect()
}
