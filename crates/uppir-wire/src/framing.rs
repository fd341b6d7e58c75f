//! Length-prefixed message framing shared by mirror and vendor connections.
//!
//! Every message on the wire is a big-endian `u32` byte length followed by
//! that many message bytes. The framing itself carries no semantics; verb
//! parsing happens one layer up in [`crate::mirror`] and [`crate::vendor`].

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Messages larger than this are refused rather than allocated. Generous
/// enough for any plausible block size or manifest; not configurable because
/// nothing in this protocol needs a message larger than a handful of MiB.
pub const MAX_MESSAGE_LEN: u32 = 64 * 1024 * 1024;

/// Reads one length-prefixed message, or `Ok(None)` if the peer closed the
/// connection cleanly before sending any length prefix at all.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_LEN {
        return Err(ProtocolError::MessageTooLarge {
            len: len as u64,
            max: MAX_MESSAGE_LEN as u64,
        });
    }

    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::Truncated
        } else {
            ProtocolError::Io(e)
        })?;

    Ok(Some(body))
}

/// Writes one length-prefixed message and flushes the stream.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<(), ProtocolError> {
    let len = u32::try_from(body.len()).map_err(|_| ProtocolError::MessageTooLarge {
        len: body.len() as u64,
        max: MAX_MESSAGE_LEN as u64,
    })?;
    if len > MAX_MESSAGE_LEN {
        return Err(ProtocolError::MessageTooLarge {
            len: len as u64,
            max: MAX_MESSAGE_LEN as u64,
        });
    }

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_a_message() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"hello").await.unwrap();

        let mut cursor = Cursor::new(buf);
        let message = read_message(&mut cursor).await.unwrap().unwrap();
        assert_eq!(message, b"hello");
    }

    #[tokio::test]
    async fn clean_eof_before_any_bytes_is_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert_eq!(read_message(&mut cursor).await.unwrap(), None);
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&10u32.to_be_bytes());
        buf.extend_from_slice(b"short");
        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::Truncated)
        ));
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_MESSAGE_LEN + 1).to_be_bytes());
        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }
}
