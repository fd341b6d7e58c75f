//! `uppir-vendor`: serves the manifest and the live mirror directory.
//!
//! Mirrors of `uppir_vendor.py`'s CLI surface: `--manifestfile`,
//! `--foreground`, `--logfile`, `--maxmirrorinfo`, `--mirrorexpirytime`.
//! Unlike the original, the listen address/port are not configurable here
//! either (they never were — they come from the manifest's
//! `vendor_hostname`/`vendor_port`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use uppir_manifest::Manifest;
use uppir_vendor::{serve, VendorState};

#[derive(Parser, Debug)]
#[command(name = "uppir-vendor", about = "upPIR vendor: serves the manifest and mirror directory")]
struct Args {
    /// The manifest file to serve (default manifest.dat).
    #[arg(long, default_value = "manifest.dat")]
    manifest_file: PathBuf,

    /// Do not detach from the terminal and run in the background.
    #[arg(long)]
    foreground: bool,

    /// The file to write log data to (default vendor.log).
    #[arg(long, default_value = "vendor.log")]
    log_file: PathBuf,

    /// The maximum amount of serialized data a mirror can add to the mirror
    /// list (default 10 KiB).
    #[arg(long, default_value_t = 10 * 1024)]
    max_mirror_info: usize,

    /// The number of seconds of inactivity before expiring a mirror (default 300).
    #[arg(long, default_value_t = 300)]
    mirror_expiry_time: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log_file)
        .with_context(|| format!("opening log file {}", args.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run(args).await {
        eprintln!("uppir-vendor: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    if args.max_mirror_info == 0 {
        bail!("max mirror info size must be positive");
    }

    let manifest_bytes =
        std::fs::read(&args.manifest_file).with_context(|| format!("reading {}", args.manifest_file.display()))?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes).context("parsing manifest JSON")?;
    manifest.validate().context("validating manifest")?;

    // `vendor_hostname` may be a real DNS name rather than a literal IP, so
    // this is resolved by `TcpListener::bind` itself rather than parsed as a
    // `SocketAddr` up front.
    let addr = format!("{}:{}", manifest.vendor_hostname, manifest.vendor_port);

    // Bind before daemonizing so a port-in-use error is visible on the
    // terminal rather than silently swallowed after detaching.
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;

    if !args.foreground {
        uppir_vendor::daemonize::daemonize()?;
    }

    let state = Arc::new(VendorState::new(
        manifest_bytes,
        Duration::from_secs(args.mirror_expiry_time),
        args.max_mirror_info,
    ));

    info!(%addr, "vendor ready to serve");
    serve(listener, state).await;
    Ok(())
}
