//! Content-Length framing for LSP messages.
//!
//! ```text
//! Content-Length: <n>\r\n
//! \r\n
//! <n bytes of UTF-8 JSON>
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::TransportError;

const CONTENT_LENGTH: &str = "content-length";

/// Read one framed message body. Returns `Ok(None)` on a clean EOF between
/// messages.
pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError> {
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;

    // Read headers until empty line
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return if saw_header {
                Err(TransportError::Closed)
            } else {
                Ok(None)
            };
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            if saw_header {
                break;
            }
            // Stray blank line between messages
            continue;
        }
        saw_header = true;

        let (name, value) = trimmed
            .split_once(':')
            .ok_or_else(|| TransportError::InvalidHeader(trimmed.to_string()))?;
        if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            let len = value
                .trim()
                .parse::<usize>()
                .map_err(|_| TransportError::InvalidHeader(trimmed.to_string()))?;
            content_length = Some(len);
        }
        // Content-Type and unknown headers are ignored
    }

    let len = content_length
        .ok_or_else(|| TransportError::InvalidHeader("missing Content-Length".into()))?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Serialize `message` and prepend its Content-Length header.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Bytes, TransportError> {
    let body = serde_json::to_vec(message).map_err(TransportError::Parse)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());

    let mut framed = BytesMut::with_capacity(header.len() + body.len());
    framed.put_slice(header.as_bytes());
    framed.put_slice(&body);
    Ok(framed.freeze())
}
