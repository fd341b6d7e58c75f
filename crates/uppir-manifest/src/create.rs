//! Building a manifest (and the datastore behind it) from a directory tree.

use std::path::{Path, PathBuf};

use tracing::debug;
use uppir_datastore::XorDatastore;

use crate::error::ManifestError;
use crate::hash::HashAlgorithm;
use crate::model::{FileInfo, Manifest};

/// Walks `root_dir` recursively and lays out every regular file it contains
/// end-to-end in a fresh [`XorDatastore`], producing the [`Manifest`] that
/// describes the layout.
///
/// Unlike a directory walk that keeps only the bare file name, this records
/// each file's path relative to `root_dir` (including subdirectories), so
/// two files with the same base name in different subdirectories don't
/// collide and the manifest's file names reflect the actual tree shape.
pub fn create_manifest(
    root_dir: &Path,
    hash_algorithm_spec: &str,
    block_size: usize,
    vendor_hostname: &str,
    vendor_port: u16,
) -> Result<Manifest, ManifestError> {
    if vendor_hostname.contains(':') {
        return Err(ManifestError::BadArgument(
            "vendor hostname must not contain ':'".to_string(),
        ));
    }
    if block_size == 0 {
        return Err(ManifestError::BadArgument("block_size must be positive".to_string()));
    }

    let algorithm = HashAlgorithm::parse(hash_algorithm_spec)?;

    let mut files = generate_file_info_list(root_dir, &algorithm)?;
    nogaps_offset_assignment(&mut files);
    check_no_overlaps(&files)?;

    let total_len: usize = files.iter().map(|f| f.offset + f.length).max().unwrap_or(0);
    let block_count = total_len.div_ceil(block_size);

    let block_hashes = if block_count == 0 {
        Vec::new()
    } else {
        let mut datastore = XorDatastore::new(block_size, block_count)?;
        populate_xordatastore_from_files(&mut datastore, &files, root_dir, &algorithm)?;
        compute_block_hashlist(&datastore, block_count, block_size, &algorithm)
    };

    let mut manifest = Manifest {
        manifest_version: "1.0".to_string(),
        hash_algorithm: hash_algorithm_spec.to_string(),
        block_size,
        block_count,
        block_hashes,
        vendor_hostname: vendor_hostname.to_string(),
        vendor_port,
        manifest_hash: Default::default(),
        files,
    };
    manifest.manifest_hash = manifest.compute_manifest_hash()?;

    debug!(
        block_count,
        block_size,
        files = manifest.files.len(),
        "created manifest"
    );

    Ok(manifest)
}

/// This simple assignment just packs files back to back in the order they
/// were discovered; there is no padding or alignment between files.
fn nogaps_offset_assignment(files: &mut [FileInfo]) {
    let mut offset = 0usize;
    for file in files.iter_mut() {
        file.offset = offset;
        offset += file.length;
    }
}

fn check_no_overlaps(files: &[FileInfo]) -> Result<(), ManifestError> {
    let mut intervals: Vec<(usize, usize)> = files.iter().map(|f| (f.offset, f.length)).collect();
    intervals.sort_unstable();

    let mut next_free_offset = 0usize;
    for (offset, length) in intervals {
        if offset < next_free_offset {
            return Err(ManifestError::BadArgument(
                "offset assignment produced overlapping files".to_string(),
            ));
        }
        next_free_offset = offset
            .checked_add(length)
            .ok_or_else(|| ManifestError::BadArgument("file interval overflows".to_string()))?;
    }
    Ok(())
}

fn generate_file_info_list(root_dir: &Path, algorithm: &HashAlgorithm) -> Result<Vec<FileInfo>, ManifestError> {
    let mut files = Vec::new();
    walk_directory(root_dir, root_dir, algorithm, &mut files)?;
    files.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(files)
}

fn walk_directory(
    root_dir: &Path,
    current_dir: &Path,
    algorithm: &HashAlgorithm,
    files: &mut Vec<FileInfo>,
) -> Result<(), ManifestError> {
    let entries = std::fs::read_dir(current_dir)?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_directory(root_dir, &path, algorithm, files)?;
            continue;
        }
        if !file_type.is_file() {
            // Symlinks and other special files are not part of a release.
            continue;
        }

        let relative = path
            .strip_prefix(root_dir)
            .map_err(|_| ManifestError::BadArgument(format!("{} is not under root", path.display())))?;
        let filename = relative_path_to_manifest_string(relative);

        let contents = std::fs::read(&path)?;
        let hash = algorithm.digest(&contents);

        files.push(FileInfo {
            filename,
            hash,
            offset: 0,
            length: contents.len(),
        });
    }
    Ok(())
}

/// Manifest file names always use forward slashes, independent of the host
/// platform's path separator.
fn relative_path_to_manifest_string(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn populate_xordatastore_from_files(
    datastore: &mut XorDatastore,
    files: &[FileInfo],
    root_dir: &Path,
    algorithm: &HashAlgorithm,
) -> Result<(), ManifestError> {
    for file in files {
        let full_path = manifest_path_join(root_dir, &file.filename)?;
        if !full_path.exists() {
            return Err(ManifestError::FileNotFound(file.filename.clone()));
        }
        let contents = std::fs::read(&full_path)?;
        if contents.len() != file.length {
            return Err(ManifestError::IncorrectFileContents(format!(
                "'{}' has the wrong size",
                file.filename
            )));
        }
        if algorithm.digest(&contents) != file.hash {
            return Err(ManifestError::IncorrectFileContents(format!(
                "'{}' has the wrong hash",
                file.filename
            )));
        }
        datastore.set_data(file.offset, &contents)?;
    }
    Ok(())
}

/// Joins a manifest-relative file name onto a root directory, rejecting any
/// name that would escape it.
pub(crate) fn manifest_path_join(root_dir: &Path, filename: &str) -> Result<PathBuf, ManifestError> {
    use std::path::Component;

    let relative = Path::new(filename);
    if relative.is_absolute()
        || relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(ManifestError::CorruptManifest(format!(
            "file name '{filename}' escapes the mirror root"
        )));
    }
    Ok(root_dir.join(relative))
}

fn compute_block_hashlist(
    datastore: &XorDatastore,
    block_count: usize,
    block_size: usize,
    algorithm: &HashAlgorithm,
) -> Vec<crate::hash::HashValue> {
    (0..block_count)
        .map(|block_num| {
            let block = datastore
                .get_data(block_num * block_size, block_size)
                .expect("block within datastore capacity");
            algorithm.digest(&block)
        })
        .collect()
}

/// Populates an already-allocated datastore from the files listed in
/// `manifest`, re-verifying each file's size and hash as it is read. Used by
/// mirrors and vendors loading a pre-built release rather than creating one.
pub fn populate_xordatastore(
    manifest: &Manifest,
    datastore: &mut XorDatastore,
    root_dir: &Path,
) -> Result<(), ManifestError> {
    let algorithm = HashAlgorithm::parse(&manifest.hash_algorithm)?;
    populate_xordatastore_from_files(datastore, &manifest.files, root_dir, &algorithm)?;

    let hashlist = compute_block_hashlist(datastore, manifest.block_count, manifest.block_size, &algorithm);
    for (block_num, (computed, expected)) in hashlist.iter().zip(manifest.block_hashes.iter()).enumerate() {
        if computed != expected {
            return Err(ManifestError::CorruptManifest(format!(
                "block {block_num} hash does not match manifest despite matching file hashes"
            )));
        }
    }
    Ok(())
}
