//! The upPIR mirror daemon: holds a full copy of a release's datastore and
//! answers `XORBLOCK` queries from it. Optionally also serves the same
//! content directly over HTTP for non-private "legacy" clients — this
//! leaks which file was requested and is opt-in.

pub mod daemonize;
mod http;
mod pir;

pub use http::{http_router, serve_http};
pub use pir::{handle_pir_connection, serve_pir};

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, warn};

use uppir_wire::vendor::{MirrorDescriptor, VendorRequest};
use uppir_wire::{read_message, write_message};

use uppir_datastore::XorDatastore;
use uppir_manifest::Manifest;

/// Everything a mirror needs to answer both PIR and legacy HTTP requests:
/// the populated datastore and the manifest describing it.
pub struct MirrorState {
    pub datastore: XorDatastore,
    pub manifest: Manifest,
}

/// Periodically advertises this mirror's reachability to its vendor, as
/// `uppir_mirror.py`'s `_send_mirrorinfo` loop does (default every 60s).
/// Connection or protocol failures are logged and retried on the next tick
/// rather than treated as fatal — a vendor being briefly unreachable must
/// not take the mirror down.
pub async fn advertise_loop(vendor_addr: &str, pir_port: u16, delay: Duration) -> ! {
    loop {
        if let Err(err) = advertise_once(vendor_addr, pir_port).await {
            warn!(%err, "failed to advertise to vendor");
        }
        tokio::time::sleep(delay).await;
    }
}

async fn advertise_once(vendor_addr: &str, pir_port: u16) -> anyhow::Result<()> {
    // `vendor_addr` is `vendorhostname:vendorport` from the manifest and may
    // be a real DNS name, so this resolves on every reconnect rather than
    // parsing once as a literal `SocketAddr`.
    let mut stream = TcpStream::connect(vendor_addr).await?;
    // The vendor accepts an advertisement only if its `ip` matches the peer
    // address it observes on this very connection, so we read it back from
    // the socket rather than asking the operator to supply it.
    let my_ip = stream.local_addr()?.ip().to_string();

    let descriptor = MirrorDescriptor {
        ip: my_ip,
        port: pir_port,
        extra: Default::default(),
    };
    let request = VendorRequest::MirrorAdvertise(descriptor).encode()?;
    write_message(&mut stream, &request).await?;

    match read_message(&mut stream).await? {
        Some(body) if body == b"OK" => {
            debug!("mirror advertisement accepted");
            Ok(())
        }
        Some(body) => {
            let text = String::from_utf8_lossy(&body);
            anyhow::bail!("vendor rejected advertisement: {text}")
        }
        None => anyhow::bail!("vendor closed the connection before replying"),
    }
}
