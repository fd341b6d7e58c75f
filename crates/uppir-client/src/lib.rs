//! The upPIR client: retrieves files from a threshold of mirrors without any
//! single mirror learning which file was requested.
//!
//! Work is farmed out across a configurable number of concurrent tasks, each
//! pulling requests from a shared [`RequestorState`] and reporting the
//! outcome back to it. A request that fails at the transport layer — the
//! mirror vanished, refused the connection, or hung up mid-response — is
//! reported as a mirror failure and the slot is handed to a reserve mirror;
//! anything else (a malformed response, a local bug) propagates instead of
//! being silently retried, since retrying it would make the same mistake
//! forever.

mod error;

pub use error::ClientError;

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::ErrorKind;
use tokio::net::TcpStream;
use tracing::{debug, info};

use uppir_bitstring::Bitstring;
use uppir_manifest::{extract_file_from_blockdict, get_blocklist_for_file, HashAlgorithm, Manifest};
use uppir_requestor::{RequestTuple, RequestorState};
use uppir_wire::mirror::{MirrorRequest, XorBlockResponse};
use uppir_wire::vendor::{MirrorDescriptor, VendorRequest};
use uppir_wire::{read_message, write_message};

/// Retrieves the manifest's raw, signed bytes from a vendor. `vendor_addr`
/// is `host:port` and may be a real DNS name, resolved by `TcpStream::connect`.
pub async fn retrieve_manifest_bytes(vendor_addr: &str) -> Result<Vec<u8>, ClientError> {
    let mut stream = connect(vendor_addr, "vendor").await?;
    let request = VendorRequest::GetManifest
        .encode()
        .map_err(|e| ClientError::InternalError(e.to_string()))?;
    send(&mut stream, &request, vendor_addr).await?;
    recv(&mut stream, vendor_addr)
        .await?
        .ok_or_else(|| ClientError::TransportFailure {
            peer: vendor_addr.to_string(),
            source: std::io::Error::new(ErrorKind::UnexpectedEof, "vendor closed the connection"),
        })
}

/// Retrieves the vendor's current list of live mirrors.
pub async fn retrieve_mirror_list(vendor_addr: &str) -> Result<Vec<MirrorDescriptor>, ClientError> {
    let mut stream = connect(vendor_addr, "vendor").await?;
    let request = VendorRequest::GetMirrorList
        .encode()
        .map_err(|e| ClientError::InternalError(e.to_string()))?;
    send(&mut stream, &request, vendor_addr).await?;
    let body = recv(&mut stream, vendor_addr).await?.unwrap_or_default();
    serde_json::from_slice(&body).map_err(|e| ClientError::InternalError(format!("parsing mirror list: {e}")))
}

async fn connect(addr: &str, what: &str) -> Result<TcpStream, ClientError> {
    TcpStream::connect(addr).await.map_err(|source| {
        debug!(%addr, %what, "connection failed");
        ClientError::TransportFailure { peer: addr.to_string(), source }
    })
}

async fn send(stream: &mut TcpStream, body: &[u8], peer: &str) -> Result<(), ClientError> {
    write_message(stream, body)
        .await
        .map_err(|e| transport_error(peer, e))
}

async fn recv(stream: &mut TcpStream, peer: &str) -> Result<Option<Vec<u8>>, ClientError> {
    read_message(stream).await.map_err(|e| transport_error(peer, e))
}

fn transport_error(peer: &str, err: uppir_wire::ProtocolError) -> ClientError {
    match err {
        uppir_wire::ProtocolError::Io(io_err) => ClientError::TransportFailure { peer: peer.to_string(), source: io_err },
        uppir_wire::ProtocolError::Truncated => ClientError::TransportFailure {
            peer: peer.to_string(),
            source: std::io::Error::new(ErrorKind::UnexpectedEof, "connection closed mid-message"),
        },
        other => ClientError::InternalError(other.to_string()),
    }
}

/// Retrieves one XOR block share from a single mirror. A connection or I/O
/// failure here is the *only* thing a caller should treat as "this mirror is
/// down" — anything else (garbage bytes, wrong length) is a protocol-level
/// surprise worth surfacing rather than quietly blamed on the network.
async fn retrieve_xorblock_from_mirror(
    mirror: &MirrorDescriptor,
    bitstring: &Bitstring,
    block_size: usize,
) -> Result<Vec<u8>, ClientError> {
    let addr: std::net::SocketAddr = format!("{}:{}", mirror.ip, mirror.port)
        .parse()
        .map_err(|_| ClientError::BadArgument(format!("invalid mirror address {}:{}", mirror.ip, mirror.port)))?;
    let addr = addr.to_string();

    let mut stream = connect(&addr, "mirror").await?;
    let request = MirrorRequest::XorBlock(bitstring.clone()).encode();
    send(&mut stream, &request, &addr).await?;
    let body = recv(&mut stream, &addr)
        .await?
        .ok_or_else(|| ClientError::TransportFailure {
            peer: addr.clone(),
            source: std::io::Error::new(ErrorKind::UnexpectedEof, "mirror closed the connection"),
        })?;

    match XorBlockResponse::decode(&body, block_size) {
        XorBlockResponse::Block(bytes) => Ok(bytes),
        XorBlockResponse::InvalidRequestLength | XorBlockResponse::InvalidRequestType => {
            Err(ClientError::UnexpectedResponse { peer: addr.to_string() })
        }
    }
}

/// Retrieves every block in `blocklist` from `mirrors`, spreading the work
/// across `thread_count` concurrent tasks. A mirror that fails at the
/// transport layer has its slot substituted from the reserve pool
/// transparently; `thread_count - 1` worker tasks are spawned and the
/// calling task itself behaves as the final worker (matching the original
/// client, which always participates in its own thread pool).
pub async fn request_blocks_from_mirrors(
    mirrors: Vec<MirrorDescriptor>,
    blocklist: Vec<usize>,
    manifest: &Manifest,
    privacy_threshold: usize,
    thread_count: usize,
) -> Result<HashMap<usize, Vec<u8>>, ClientError> {
    use std::sync::Arc;

    let requestor = Arc::new(RequestorState::new(
        mirrors,
        blocklist.clone(),
        manifest,
        privacy_threshold,
        Duration::from_millis(50),
    )?);
    let block_size = manifest.block_size;

    let worker_count = thread_count.max(1);
    let mut workers = Vec::with_capacity(worker_count - 1);
    for _ in 0..worker_count.saturating_sub(1) {
        let requestor = requestor.clone();
        workers.push(tokio::spawn(async move { request_worker(requestor, block_size).await }));
    }
    request_worker(requestor.clone(), block_size).await?;

    for worker in workers {
        worker
            .await
            .map_err(|e| ClientError::InternalError(format!("worker task panicked: {e}")))??;
    }

    let mut out = HashMap::with_capacity(blocklist.len());
    for block_num in blocklist {
        let block = requestor
            .return_block(block_num)
            .await
            .ok_or_else(|| ClientError::InternalError(format!("block {block_num} was never reconstructed")))?;
        out.insert(block_num, block);
    }
    Ok(out)
}

async fn request_worker(
    requestor: std::sync::Arc<RequestorState<MirrorDescriptor>>,
    block_size: usize,
) -> Result<(), ClientError> {
    while let Some(request) = requestor.next_request().await {
        match retrieve_xorblock_from_mirror(&request.mirror, &request.bitstring, block_size).await {
            Ok(xorblock) => {
                requestor.notify_success(&request, xorblock).await?;
            }
            Err(ClientError::TransportFailure { .. }) => {
                handle_failed_request(&requestor, &request).await?;
            }
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

async fn handle_failed_request(
    requestor: &RequestorState<MirrorDescriptor>,
    request: &RequestTuple<MirrorDescriptor>,
) -> Result<(), ClientError> {
    requestor.notify_failure(request).await?;
    Ok(())
}

/// Retrieves `filenames` from `mirrors` and returns each one's verified
/// contents, keyed by its manifest filename.
pub async fn request_files_from_mirrors(
    filenames: &[String],
    manifest: &Manifest,
    mirrors: Vec<MirrorDescriptor>,
    privacy_threshold: usize,
    thread_count: usize,
) -> Result<Vec<(String, Vec<u8>)>, ClientError> {
    let mut needed_blocks = Vec::new();
    for filename in filenames {
        for block_num in get_blocklist_for_file(manifest, filename)? {
            if !needed_blocks.contains(&block_num) {
                needed_blocks.push(block_num);
            }
        }
    }

    info!(blocks = needed_blocks.len(), "requesting blocks from mirrors");
    let blockdict = request_blocks_from_mirrors(mirrors, needed_blocks, manifest, privacy_threshold, thread_count).await?;

    let algorithm = HashAlgorithm::parse(&manifest.hash_algorithm)?;
    let mut out = Vec::with_capacity(filenames.len());
    for filename in filenames {
        let contents = extract_file_from_blockdict(manifest, filename, &blockdict)?;
        let file = manifest
            .files
            .iter()
            .find(|f| &f.filename == filename)
            .ok_or_else(|| ClientError::FileNotFound(filename.clone()))?;
        if algorithm.digest(&contents) != file.hash {
            return Err(ClientError::CorruptManifest(format!(
                "'{filename}' has an incorrect hash despite passing block hash checks"
            )));
        }
        out.push((filename.clone(), contents));
    }
    Ok(out)
}
