//! Encryption handshake payload.
//!
//! When the runtime is started with `--set-credentials-encryption-key`, the
//! very first line on stdin is a JSON object of this shape, terminated by
//! `\n`, sent before any Content-Length framed traffic.

use serde::{Deserialize, Serialize};

/// The only handshake version the runtime accepts.
pub const ENCRYPTION_VERSION: &str = "1.0";
/// The only handshake mode the runtime accepts.
pub const ENCRYPTION_MODE_JWT: &str = "JWT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionInitialization {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub mode: String,
    /// Base64-encoded 256-bit symmetric key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}
