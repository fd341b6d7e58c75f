//! `uppir-client`: privately retrieves files from upPIR mirrors.
//!
//! Mirrors `uppir_client.py`'s CLI surface: `--retrievemanifestfrom`,
//! `--manifestfile`, `-n`/`--numberofmirrors`, `--numberofthreads`, plus a
//! positional list of files to retrieve.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use uppir_client::{request_files_from_mirrors, retrieve_manifest_bytes, retrieve_mirror_list};
use uppir_manifest::{get_filenames_in_release, Manifest};

#[derive(Parser, Debug)]
#[command(name = "uppir-client", about = "upPIR client: privately retrieves files from mirrors")]
struct Args {
    /// Vendor to retrieve the manifest from, as `host:port` (default: read
    /// from `--manifest-file` instead).
    #[arg(long)]
    retrieve_manifest_from: Option<SocketAddr>,

    /// The manifest file to use (default manifest.dat).
    #[arg(long, default_value = "manifest.dat")]
    manifest_file: PathBuf,

    /// How many mirrors must collude to break privacy (default 3).
    #[arg(short = 'n', long, default_value_t = 3)]
    number_of_mirrors: usize,

    /// How many tasks should concurrently contact mirrors (default:
    /// `number_of_mirrors`).
    #[arg(long)]
    number_of_threads: Option<usize>,

    /// Files to retrieve, as listed in the manifest.
    #[arg(required = true)]
    files: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("uppir-client: {err:#}");
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<FileNotInManifest>().is_some() {
        2
    } else {
        1
    }
}

#[derive(Debug, thiserror::Error)]
#[error("file '{0}' is not listed in the manifest")]
struct FileNotInManifest(String);

async fn run() -> Result<()> {
    let args = Args::parse();

    if args.number_of_mirrors == 0 {
        bail!("number of mirrors must be positive");
    }
    let thread_count = args.number_of_threads.unwrap_or(args.number_of_mirrors);
    if thread_count == 0 {
        bail!("number of threads must be positive");
    }

    let raw_manifest = if let Some(vendor_addr) = args.retrieve_manifest_from {
        let raw = retrieve_manifest_bytes(&vendor_addr.to_string())
            .await
            .context("retrieving manifest from vendor")?;
        std::fs::write(&args.manifest_file, &raw)
            .with_context(|| format!("writing retrieved manifest to {}", args.manifest_file.display()))?;
        raw
    } else {
        std::fs::read(&args.manifest_file).with_context(|| format!("reading {}", args.manifest_file.display()))?
    };

    let manifest: Manifest = serde_json::from_slice(&raw_manifest).context("parsing manifest JSON")?;
    manifest.validate().context("validating manifest")?;

    let known_files = get_filenames_in_release(&manifest);
    for filename in &args.files {
        if !known_files.contains(filename) {
            return Err(FileNotInManifest(filename.clone()).into());
        }
    }

    let vendor_addr: SocketAddr = format!("{}:{}", manifest.vendor_hostname, manifest.vendor_port)
        .parse()
        .with_context(|| format!("manifest vendor address {}:{}", manifest.vendor_hostname, manifest.vendor_port))?;
    let mirrors = retrieve_mirror_list(&vendor_addr.to_string())
        .await
        .context("retrieving mirror list from vendor")?;
    info!(mirrors = mirrors.len(), "retrieved mirror list");

    let results = request_files_from_mirrors(&args.files, &manifest, mirrors, args.number_of_mirrors, thread_count)
        .await
        .context("retrieving files from mirrors")?;

    for (filename, contents) in results {
        let out_name = Path::new(&filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(filename.clone());
        std::fs::write(&out_name, &contents).with_context(|| format!("writing {out_name}"))?;
        info!(file = %out_name, bytes = contents.len(), "wrote file");
    }

    Ok(())
}
