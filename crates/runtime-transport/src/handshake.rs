//! Encryption handshake: the single JSON line that precedes LSP framing when
//! the runtime is started with `--set-credentials-encryption-key`.

use std::time::Duration;

use runtime_protocol::EncryptionInitialization;
use runtime_protocol::encryption::{ENCRYPTION_MODE_JWT, ENCRYPTION_VERSION};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::HandshakeError;

/// How long the client has to send the handshake line.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Read the handshake line within [`HANDSHAKE_TIMEOUT`].
pub async fn read_encryption_details<R>(reader: &mut R) -> Result<EncryptionInitialization, HandshakeError>
where
    R: AsyncRead + Unpin,
{
    read_encryption_details_with_timeout(reader, HANDSHAKE_TIMEOUT).await
}

/// Read the handshake line within `timeout`.
///
/// Bytes are pulled one at a time so nothing after the `\n` is consumed;
/// whatever follows belongs to the framed LSP stream.
pub async fn read_encryption_details_with_timeout<R>(
    reader: &mut R,
    timeout: Duration,
) -> Result<EncryptionInitialization, HandshakeError>
where
    R: AsyncRead + Unpin,
{
    let line = tokio::time::timeout(timeout, read_line_unbuffered(reader))
        .await
        .map_err(|_| HandshakeError::Timeout(timeout))??;

    debug!("Received encryption details ({} bytes)", line.len());
    Ok(serde_json::from_slice(&line)?)
}

async fn read_line_unbuffered<R>(reader: &mut R) -> Result<Vec<u8>, HandshakeError>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        if reader.read(&mut byte).await? == 0 {
            return Err(HandshakeError::Closed);
        }
        if byte[0] == b'\n' {
            return Ok(line);
        }
        line.push(byte[0]);
    }
}

/// Check version, key presence and mode, in that order.
pub fn validate_encryption_details(details: &EncryptionInitialization) -> Result<(), HandshakeError> {
    if details.version != ENCRYPTION_VERSION {
        return Err(HandshakeError::UnsupportedVersion(details.version.clone()));
    }
    if details.key.as_deref().is_none_or(str::is_empty) {
        return Err(HandshakeError::MissingKey);
    }
    if details.mode != ENCRYPTION_MODE_JWT {
        return Err(HandshakeError::UnsupportedMode(details.mode.clone()));
    }
    Ok(())
}
