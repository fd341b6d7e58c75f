//! `uppir-mirror`: holds a full copy of a release and answers XOR block
//! queries against it, optionally also serving the same files over legacy
//! HTTP and periodically advertising itself to its vendor.
//!
//! Mirrors `uppir_mirror.py`'s CLI surface: `--ip`, `--port`, `--http`,
//! `--httpport`, `--mirrorroot`, `--retrievemanifestfrom`, `--manifestfile`,
//! `--foreground`, `--logfile`, `--announcedelay`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::net::{TcpListener, TcpStream};
use tracing::info;

use uppir_datastore::XorDatastore;
use uppir_manifest::{populate_xordatastore, Manifest};
use uppir_mirror::{advertise_loop, http_router, serve_http, serve_pir, MirrorState};
use uppir_wire::vendor::VendorRequest;
use uppir_wire::{read_message, write_message};

#[derive(Parser, Debug)]
#[command(name = "uppir-mirror", about = "upPIR mirror: serves XOR block queries and optionally legacy HTTP")]
struct Args {
    /// Listen for clients on this IP (default: all interfaces).
    #[arg(long, default_value = "0.0.0.0")]
    ip: String,

    /// Port to serve upPIR clients on (default 62294).
    #[arg(long, default_value_t = 62294)]
    port: u16,

    /// Also serve legacy clients via HTTP (default false).
    #[arg(long)]
    http: bool,

    /// Port to serve HTTP clients on (default 80).
    #[arg(long, default_value_t = 80)]
    http_port: u16,

    /// The base directory every mirrored file lives under.
    #[arg(long, default_value = ".")]
    mirror_root: PathBuf,

    /// Vendor address to retrieve the manifest from, as `host:port`. If
    /// unset, the manifest is read from `--manifest-file` instead.
    #[arg(long)]
    retrieve_manifest_from: Option<String>,

    /// The manifest file to use (default manifest.dat). When
    /// `--retrieve-manifest-from` is set, the retrieved manifest is written
    /// here too.
    #[arg(long, default_value = "manifest.dat")]
    manifest_file: PathBuf,

    /// Do not detach from the terminal and run in the background.
    #[arg(long)]
    foreground: bool,

    /// The file to write log data to (default mirror.log).
    #[arg(long, default_value = "mirror.log")]
    log_file: PathBuf,

    /// Seconds to wait between vendor advertisements (default 60).
    #[arg(long, default_value_t = 60)]
    announce_delay: u64,
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
        eprintln!("uppir-mirror: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    if args.announce_delay == 0 {
        bail!("announce delay must be positive");
    }

    let raw_manifest = if let Some(vendor_addr) = &args.retrieve_manifest_from {
        let raw = retrieve_manifest(vendor_addr).await?;
        std::fs::write(&args.manifest_file, &raw)
            .with_context(|| format!("writing retrieved manifest to {}", args.manifest_file.display()))?;
        raw
    } else {
        std::fs::read(&args.manifest_file).with_context(|| format!("reading {}", args.manifest_file.display()))?
    };

    let manifest: Manifest = serde_json::from_slice(&raw_manifest).context("parsing manifest JSON")?;
    manifest.validate().context("validating manifest")?;

    let pir_addr: SocketAddr = format!("{}:{}", args.ip, args.port)
        .parse()
        .with_context(|| format!("PIR listen address {}:{}", args.ip, args.port))?;
    let pir_listener = TcpListener::bind(pir_addr).await.with_context(|| format!("binding {pir_addr}"))?;

    let http_listener = if args.http {
        let http_addr: SocketAddr = format!("{}:{}", args.ip, args.http_port)
            .parse()
            .with_context(|| format!("HTTP listen address {}:{}", args.ip, args.http_port))?;
        Some(
            TcpListener::bind(http_addr)
                .await
                .with_context(|| format!("binding {http_addr}"))?,
        )
    } else {
        None
    };

    // Bind before daemonizing, same rationale as the vendor: a bind failure
    // must still reach the terminal.
    if !args.foreground {
        uppir_mirror::daemonize::daemonize()?;
    }

    if manifest.block_count == 0 {
        bail!("manifest describes an empty release; nothing for a mirror to serve");
    }
    let mut datastore = XorDatastore::new(manifest.block_size, manifest.block_count)
        .context("allocating the mirror's datastore")?;
    populate_xordatastore(&manifest, &mut datastore, &args.mirror_root).context("populating the mirror's datastore")?;

    let state = Arc::new(MirrorState { datastore, manifest });

    info!(%pir_addr, "mirror ready to serve");
    tokio::spawn(serve_pir(pir_listener, state.clone()));

    if let Some(http_listener) = http_listener {
        let router = http_router(state.clone());
        tokio::spawn(serve_http(http_listener, router));
    }

    let vendor_addr = format!("{}:{}", state.manifest.vendor_hostname, state.manifest.vendor_port);

    advertise_loop(&vendor_addr, args.port, Duration::from_secs(args.announce_delay)).await
}

async fn retrieve_manifest(vendor_addr: &str) -> Result<Vec<u8>> {
    let mut stream = TcpStream::connect(vendor_addr)
        .await
        .with_context(|| format!("connecting to vendor at {vendor_addr}"))?;
    let request = VendorRequest::GetManifest.encode()?;
    write_message(&mut stream, &request).await?;
    match read_message(&mut stream).await? {
        Some(body) => Ok(body),
        None => bail!("vendor closed the connection before sending a manifest"),
    }
}
