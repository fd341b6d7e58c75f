//! The upPIR vendor daemon: the discovery point clients and mirrors both
//! talk to. The vendor serves the manifest verbatim and maintains a
//! time-limited directory of mirrors that have recently advertised
//! themselves; it never sees a client's block selection, only that it asked
//! for *a* manifest or mirror list.

pub mod daemonize;
mod directory;

pub use directory::MirrorDirectory;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use uppir_wire::vendor::{AdvertiseResponse, HelloAck, MirrorDescriptor, VendorRequest};
use uppir_wire::{read_message, write_message, ProtocolError};

/// Shared, immutable-after-construction vendor state. `manifest_bytes` is
/// served byte-for-byte on `GET MANIFEST` — it is exactly the file on disk,
/// nothing re-encoded or re-derived.
pub struct VendorState {
    manifest_bytes: Vec<u8>,
    directory: MirrorDirectory,
    max_advertise_size: usize,
}

impl VendorState {
    pub fn new(manifest_bytes: Vec<u8>, mirror_expiry: Duration, max_advertise_size: usize) -> Self {
        Self {
            manifest_bytes,
            directory: MirrorDirectory::new(mirror_expiry),
            max_advertise_size,
        }
    }
}

/// Accepts connections forever, spawning one task per connection. Never
/// returns under normal operation; a failed `accept()` is logged and
/// retried rather than treated as fatal, since a single bad peer socket
/// should not take down the server.
pub async fn serve(listener: TcpListener, state: Arc<VendorState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, peer.ip().to_string(), &state).await {
                        debug!(%peer, %err, "vendor connection ended with an error");
                    }
                });
            }
            Err(err) => warn!(%err, "failed to accept vendor connection"),
        }
    }
}

/// Services exactly one request on `stream`, then returns (the upPIR
/// protocol is one request/response pair per connection, matching the
/// original threaded socket server's per-connection handler).
pub async fn handle_connection<S>(mut stream: S, peer_ip: String, state: &VendorState) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(raw) = read_message(&mut stream).await? else {
        return Ok(());
    };

    let response = match VendorRequest::decode(&raw) {
        Ok(VendorRequest::Hello) => {
            debug!(peer = %peer_ip, "HELLO");
            HelloAck::encode()
        }
        Ok(VendorRequest::GetManifest) => {
            debug!(peer = %peer_ip, "GET MANIFEST");
            state.manifest_bytes.clone()
        }
        Ok(VendorRequest::GetMirrorList) => {
            let list = state.directory.live_list();
            debug!(peer = %peer_ip, mirrors = list.len(), "GET MIRRORLIST");
            serde_json::to_vec(&list)?
        }
        Ok(VendorRequest::MirrorAdvertise(descriptor)) => {
            handle_advertise(descriptor, &raw, &peer_ip, state)
        }
        Err(_) => {
            warn!(peer = %peer_ip, "unrecognized vendor request");
            b"Invalid request type".to_vec()
        }
    };

    write_message(&mut stream, &response).await
}

fn handle_advertise(descriptor: MirrorDescriptor, raw: &[u8], peer_ip: &str, state: &VendorState) -> Vec<u8> {
    let payload_len = raw.len().saturating_sub(b"MIRRORADVERTISE".len());
    if payload_len > state.max_advertise_size {
        warn!(peer = %peer_ip, payload_len, "mirror advertisement too large");
        return AdvertiseResponse::Error(format!(
            "mirrorinfo too large ({payload_len} bytes, max {})",
            state.max_advertise_size
        ))
        .encode();
    }

    if descriptor.ip != peer_ip {
        warn!(peer = %peer_ip, claimed_ip = %descriptor.ip, "mirror advertised a mismatched IP");
        return AdvertiseResponse::Error("must provide mirrorinfo from the mirror's own IP".to_string()).encode();
    }

    info!(peer = %peer_ip, port = descriptor.port, "mirror advertisement accepted");
    state.directory.upsert(descriptor);
    AdvertiseResponse::Ok.encode()
}
