//! LSP Runtime - Services
//!
//! Stateful pieces shared by every hosted server:
//! - `encryption`: the JWE secure channel codec keyed by the handshake key
//! - `auth`: the credential store behind `aws/credentials/*`
//! - `chat`: the chat prompt relay, encrypted when the session is
//! - `telemetry`: the injected telemetry context

pub mod auth;
pub mod chat;
pub mod encryption;
pub mod telemetry;

pub use auth::{Auth, AuthError, CredentialsProvider, connection_type};
pub use chat::Chat;
pub use encryption::{
    EncryptionError, EncryptionKey, decrypt_claims, decrypt_jwt, decrypt_object_with_key,
    encrypt_object_with_key, is_message_jwe_encrypted,
};
pub use telemetry::{MetricResult, Telemetry};
