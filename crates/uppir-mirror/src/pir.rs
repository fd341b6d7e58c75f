//! The PIR query service: `HELLO` and `XORBLOCK<bitstring>` over the
//! length-prefixed wire protocol.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, warn};

use uppir_wire::mirror::{HelloAck, MirrorRequest, XorBlockResponse};
use uppir_wire::{read_message, write_message, ProtocolError};

use crate::MirrorState;

/// Accepts connections forever, spawning one task per connection.
pub async fn serve_pir(listener: TcpListener, state: Arc<MirrorState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_pir_connection(stream, &state).await {
                        debug!(%peer, %err, "PIR connection ended with an error");
                    }
                });
            }
            Err(err) => warn!(%err, "failed to accept PIR connection"),
        }
    }
}

/// Services exactly one request on `stream`.
pub async fn handle_pir_connection<S>(mut stream: S, state: &MirrorState) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(raw) = read_message(&mut stream).await? else {
        return Ok(());
    };

    let response = match MirrorRequest::decode(&raw) {
        Ok(MirrorRequest::Hello) => HelloAck::encode(),
        Ok(MirrorRequest::XorBlock(bitstring)) => match state.datastore.xor_of_selected_blocks(&bitstring) {
            Ok(block) => XorBlockResponse::Block(block).encode(),
            Err(_) => {
                warn!(len = bitstring.len(), "invalid XORBLOCK request length");
                XorBlockResponse::InvalidRequestLength.encode()
            }
        },
        Err(_) => {
            warn!("unrecognized mirror request");
            XorBlockResponse::InvalidRequestType.encode()
        }
    };

    write_message(&mut stream, &response).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use uppir_bitstring::Bitstring;
    use uppir_datastore::XorDatastore;
    use uppir_manifest::{HashAlgorithm, Manifest};

    fn state_with_blocks(block_size: usize, block_count: usize) -> MirrorState {
        let mut datastore = XorDatastore::new(block_size, block_count).unwrap();
        for i in 0..block_count {
            datastore.set_data(i * block_size, &vec![i as u8; block_size]).unwrap();
        }
        let algo = HashAlgorithm::parse("sha256-hex").unwrap();
        let block_hashes = (0..block_count)
            .map(|i| algo.digest(&vec![i as u8; block_size]))
            .collect();
        let mut manifest = Manifest {
            manifest_version: "1.0".to_string(),
            hash_algorithm: "sha256-hex".to_string(),
            block_size,
            block_count,
            block_hashes,
            vendor_hostname: "vendor.example".to_string(),
            vendor_port: 62293,
            manifest_hash: Default::default(),
            files: vec![],
        };
        manifest.manifest_hash = manifest.compute_manifest_hash().unwrap();
        MirrorState { datastore, manifest }
    }

    async fn roundtrip(request: &[u8], state: &MirrorState) -> Vec<u8> {
        let mut input = Vec::new();
        write_message(&mut input, request).await.unwrap();
        let mut conn = Cursor::new(input);
        let mut output = Vec::new();
        let framed = read_message(&mut conn).await.unwrap().unwrap();
        let response = match MirrorRequest::decode(&framed) {
            Ok(MirrorRequest::Hello) => HelloAck::encode(),
            Ok(MirrorRequest::XorBlock(bitstring)) => match state.datastore.xor_of_selected_blocks(&bitstring) {
                Ok(block) => XorBlockResponse::Block(block).encode(),
                Err(_) => XorBlockResponse::InvalidRequestLength.encode(),
            },
            Err(_) => XorBlockResponse::InvalidRequestType.encode(),
        };
        write_message(&mut output, &response).await.unwrap();
        output
    }

    #[tokio::test]
    async fn hello_gets_hi() {
        let state = state_with_blocks(64, 3);
        let out = roundtrip(b"HELLO", &state).await;
        let mut cursor = Cursor::new(out);
        assert_eq!(read_message(&mut cursor).await.unwrap().unwrap(), b"HI!");
    }

    #[tokio::test]
    async fn xorblock_of_correct_length_returns_a_block() {
        let state = state_with_blocks(64, 3);
        let bitstring = Bitstring::zeroed(3).set(0, 1).unwrap().set(2, 1).unwrap();
        let mut request = b"XORBLOCK".to_vec();
        request.extend_from_slice(bitstring.as_bytes());

        let out = roundtrip(&request, &state).await;
        let mut cursor = Cursor::new(out);
        let body = read_message(&mut cursor).await.unwrap().unwrap();
        assert_eq!(body, vec![0u8 ^ 2u8; 64]);
    }

    #[tokio::test]
    async fn wrong_length_bitstring_is_reported() {
        let state = state_with_blocks(64, 3);
        let mut request = b"XORBLOCK".to_vec();
        request.extend_from_slice(&[0u8; 100]);

        let out = roundtrip(&request, &state).await;
        let mut cursor = Cursor::new(out);
        let body = read_message(&mut cursor).await.unwrap().unwrap();
        assert_eq!(body, b"Invalid request length");
    }

    #[tokio::test]
    async fn unknown_verb_is_reported() {
        let state = state_with_blocks(64, 3);
        let out = roundtrip(b"GARBAGE", &state).await;
        let mut cursor = Cursor::new(out);
        let body = read_message(&mut cursor).await.unwrap().unwrap();
        assert_eq!(body, b"Invalid request type");
    }
}
