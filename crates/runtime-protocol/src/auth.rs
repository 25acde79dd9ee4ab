//! Credential wire types for the `aws/credentials/*` methods.
//!
//! Protocol flow:
//!   1. Client sends `aws/credentials/iam/update` or `aws/credentials/token/update`
//!      with plaintext credentials, or with a JWE token when `encrypted` is set
//!   2. Server validates the shape and stores the credentials
//!   3. For bearer updates without metadata, server asks the client back via
//!      `aws/credentials/getConnectionMetadata`
//!   4. `aws/credentials/{iam,token}/delete` clears the slot

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ResponseError;

// ─────────────────────────────────────────────────────────────────────────────
// Credential values
// ─────────────────────────────────────────────────────────────────────────────

/// AWS IAM credentials. Immutable once constructed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamCredentials {
    #[serde(rename = "accessKeyId")]
    access_key_id: String,
    #[serde(rename = "secretAccessKey")]
    secret_access_key: String,
    #[serde(rename = "sessionToken", default, skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
}

impl IamCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

impl fmt::Debug for IamCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Opaque bearer token credentials. Immutable once constructed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerCredentials {
    token: String,
}

impl BearerCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for BearerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerCredentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Either credential shape, as handed out by a credentials provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Iam(IamCredentials),
    Bearer(BearerCredentials),
}

/// Which credential slot a query or update addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialsType {
    Iam,
    Bearer,
}

impl CredentialsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iam => "iam",
            Self::Bearer => "bearer",
        }
    }
}

impl fmt::Display for CredentialsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialsType {
    type Err = ResponseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iam" => Ok(Self::Iam),
            "bearer" => Ok(Self::Bearer),
            _ => Err(ResponseError::invalid_params("Unsupported credentials type")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection metadata
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoProfileData {
    #[serde(rename = "startUrl", default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
}

/// Side-channel data describing the connection behind the bearer token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sso: Option<SsoProfileData>,
}

impl ConnectionMetadata {
    pub fn with_start_url(start_url: impl Into<String>) -> Self {
        Self {
            sso: Some(SsoProfileData {
                start_url: Some(start_url.into()),
            }),
        }
    }

    pub fn start_url(&self) -> Option<&str> {
        self.sso.as_ref().and_then(|s| s.start_url.as_deref())
    }
}

/// Connection classification derived from the SSO start URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SsoConnectionType {
    #[serde(rename = "builderId")]
    BuilderId,
    #[serde(rename = "identityCenter")]
    IdentityCenter,
    #[serde(rename = "external_idp")]
    ExternalIdp,
    #[serde(rename = "none")]
    None,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client → Server
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for `aws/credentials/{iam,token}/update`.
///
/// `data` is a credentials object, or a JWE token string when `encrypted`
/// is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCredentialsParams {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ConnectionMetadata>,
}

impl UpdateCredentialsParams {
    pub fn is_encrypted(&self) -> bool {
        self.encrypted.unwrap_or(false)
    }
}
