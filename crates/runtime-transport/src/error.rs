//! Transport and handshake error types.

use std::time::Duration;

use runtime_protocol::ResponseError;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed message body: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Malformed header: {0}")]
    InvalidHeader(String),

    #[error("Connection closed")]
    Closed,

    #[error("Connection is already listening")]
    AlreadyListening,
}

impl From<TransportError> for ResponseError {
    fn from(err: TransportError) -> Self {
        ResponseError::request_failed(err.to_string())
    }
}

/// Failures while reading or validating the encryption handshake line.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("Encryption details followed by newline must be sent during first {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Input closed before encryption details were received")]
    Closed,

    #[error("I/O error while reading encryption details: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid encryption details: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported initialization version: {0}")]
    UnsupportedVersion(String),

    #[error("Encryption key is missing")]
    MissingKey,

    #[error("Unsupported encoding mode: {0}")]
    UnsupportedMode(String),
}
