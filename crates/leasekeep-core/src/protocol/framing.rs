//! `Content-Length` framing over a byte stream
//!
//! ```text
//! Content-Length: 42\r\n
//! \r\n
//! {"signature":"…","payload":{…}}
//! ```

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::{ProtocolError, ProtocolResult};

/// Largest body accepted in either direction (1 MiB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

const MAX_HEADER_LINE: usize = 256;

/// Write one frame and flush
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> ProtocolResult<()> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame.
///
/// Returns `Ok(None)` if the peer closed the stream before sending anything.
pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> ProtocolResult<Option<Vec<u8>>> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    let mut first = true;

    loop {
        line.clear();
        let bytes_read = (&mut *reader)
            .take(MAX_HEADER_LINE as u64)
            .read_line(&mut line)
            .await?;

        if bytes_read == 0 {
            if first {
                return Ok(None);
            }
            return Err(ProtocolError::InvalidFrame("connection closed in headers".to_string()));
        }
        first = false;

        if !line.ends_with('\n') {
            return Err(ProtocolError::InvalidFrame("header line too long".to_string()));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }

        if let Some(len_str) = trimmed.strip_prefix("Content-Length:") {
            let length = len_str
                .trim()
                .parse()
                .map_err(|_| ProtocolError::InvalidFrame("invalid Content-Length".to_string()))?;
            content_length = Some(length);
        }
    }

    let length = content_length
        .ok_or_else(|| ProtocolError::InvalidFrame("missing Content-Length header".to_string()))?;

    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: length,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_frame_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(4096);
        let (_, mut client_write) = tokio::io::split(client);
        let (server_read, _) = tokio::io::split(server);

        write_frame(&mut client_write, br#"{"a":1}"#).await.unwrap();
        let mut reader = BufReader::new(server_read);
        let body = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(body, br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_empty_stream_is_none() {
        let mut reader = BufReader::new(&b""[..]);
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let mut reader = BufReader::new(&b"X-Other: 1\r\n\r\n{}"[..]);
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidFrame(_)));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let header = format!("Content-Length: {}\r\n\r\n", MAX_FRAME_SIZE + 1);
        let mut reader = BufReader::new(header.as_bytes());
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_truncated_body() {
        let mut reader = BufReader::new(&b"Content-Length: 10\r\n\r\n{}"[..]);
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
    }

    #[tokio::test]
    async fn test_endless_header_rejected() {
        let junk = vec![b'a'; MAX_HEADER_LINE * 2];
        let mut reader = BufReader::new(&junk[..]);
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidFrame(_)));
    }
}
