//! `uppir-create-manifest`: builds a manifest (and validates the blocks
//! behind it) from a directory of files to publish.
//!
//! Mirrors `uppir_create_manifest.py`'s CLI surface: positional `rootdir
//! blocksize vendorhostname`, plus `--manifest-file`, `--vendor-port`,
//! `--hash-algorithm`, `--offset-algorithm`. Only the `nogaps` offset
//! algorithm exists today — `uppir-manifest` has no plugin point for
//! others yet, so `--offset-algorithm` is accepted and validated but not
//! otherwise consulted, matching the original's single built-in choice.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use uppir_manifest::create_manifest;

#[derive(Parser, Debug)]
#[command(
    name = "uppir-create-manifest",
    about = "Builds an upPIR manifest describing a directory of files"
)]
struct Args {
    /// The directory of files to publish.
    root_dir: PathBuf,

    /// Block size in bytes; must be a positive multiple of 64.
    block_size: usize,

    /// The vendor's host name, as embedded in the manifest.
    vendor_hostname: String,

    /// Where to write the generated manifest (default manifest.dat).
    #[arg(long, default_value = "manifest.dat")]
    manifest_file: PathBuf,

    /// The port the vendor listens on (default 62293).
    #[arg(long, default_value_t = 62293)]
    vendor_port: u16,

    /// The hash algorithm to secure blocks and files with (default
    /// sha256-hex).
    #[arg(long, default_value = "sha256-hex")]
    hash_algorithm: String,

    /// How to lay files out into blocks. Only `nogaps` exists today.
    #[arg(long, default_value = "nogaps")]
    offset_algorithm: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run(Args::parse()) {
        eprintln!("uppir-create-manifest: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    if args.offset_algorithm != "nogaps" {
        bail!(
            "unknown offset algorithm '{}': only 'nogaps' is supported",
            args.offset_algorithm
        );
    }
    if args.block_size == 0 || args.block_size % 64 != 0 {
        bail!("block size must be a positive multiple of 64");
    }
    if args.vendor_hostname.contains(':') {
        bail!("vendor hostname must not contain ':'");
    }

    let manifest = create_manifest(
        &args.root_dir,
        &args.hash_algorithm,
        args.block_size,
        &args.vendor_hostname,
        args.vendor_port,
    )
    .context("building manifest")?;

    let raw = serde_json::to_vec(&manifest).context("serializing manifest")?;
    std::fs::write(&args.manifest_file, &raw)
        .with_context(|| format!("writing {}", args.manifest_file.display()))?;

    info!(
        manifest_file = %args.manifest_file.display(),
        block_count = manifest.block_count,
        block_size = manifest.block_size,
        files = manifest.files.len(),
        "generated manifest"
    );
    println!(
        "Generated {} describing a {}-block, {}-byte-block datastore with {} files",
        args.manifest_file.display(),
        manifest.block_count,
        manifest.block_size,
        manifest.files.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rejects_block_size_not_a_multiple_of_64() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            root_dir: dir.path().to_path_buf(),
            block_size: 100,
            vendor_hostname: "vendor.example".to_string(),
            manifest_file: dir.path().join("manifest.dat"),
            vendor_port: 62293,
            hash_algorithm: "sha256-hex".to_string(),
            offset_algorithm: "nogaps".to_string(),
        };
        assert!(run(args).is_err());
    }

    #[test]
    fn rejects_unknown_offset_algorithm() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            root_dir: dir.path().to_path_buf(),
            block_size: 64,
            vendor_hostname: "vendor.example".to_string(),
            manifest_file: dir.path().join("manifest.dat"),
            vendor_port: 62293,
            hash_algorithm: "sha256-hex".to_string(),
            offset_algorithm: "weird".to_string(),
        };
        assert!(run(args).is_err());
    }

    #[test]
    fn writes_a_valid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello world").unwrap();
        let manifest_file = dir.path().join("out.dat");
        let args = Args {
            root_dir: dir.path().to_path_buf(),
            block_size: 64,
            vendor_hostname: "vendor.example".to_string(),
            manifest_file: manifest_file.clone(),
            vendor_port: 62293,
            hash_algorithm: "sha256-hex".to_string(),
            offset_algorithm: "nogaps".to_string(),
        };
        run(args).unwrap();

        let raw = fs::read(&manifest_file).unwrap();
        let manifest: uppir_manifest::Manifest = serde_json::from_slice(&raw).unwrap();
        manifest.validate().unwrap();
        assert_eq!(manifest.files.len(), 1);
    }
}
