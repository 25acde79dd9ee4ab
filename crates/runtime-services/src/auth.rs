//! Credential store.
//!
//! Holds at most one IAM and one bearer credential set. Updates replace a
//! slot wholesale, deletes clear it. When the session has an encryption key,
//! updates flagged `encrypted` carry a JWE whose `data` claim is the
//! credentials object.

use std::sync::Arc;

use parking_lot::RwLock;
use runtime_protocol::{
    BearerCredentials, ClientMethods, ConnectionMetadata, Credentials, CredentialsType,
    IamCredentials, Methods, ResponseError, SsoConnectionType, UpdateCredentialsParams,
    parse_params,
};
use runtime_transport::{ClientChannel, Connection};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::encryption::{EncryptionError, EncryptionKey, decrypt_jwt};
use crate::telemetry::{MetricResult, Telemetry};

/// Start URL shared by every AWS Builder ID connection.
pub const BUILDER_ID_START_URL: &str = "https://view.awsapps.com/start";

/// Host suffixes of AWS-operated IAM Identity Center portals.
pub const IDENTITY_CENTER_DOMAINS: [&str; 4] =
    [".amazonaws.com", ".awsapps.com", ".amazonaws.cn", ".awsapps.cn"];

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid IAM credentials")]
    InvalidIam,

    #[error("Invalid bearer credentials")]
    InvalidBearer,

    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}

impl From<AuthError> for ResponseError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Encryption(e) => e.into(),
            other => ResponseError::invalid_params(other.to_string()),
        }
    }
}

/// Read-only view of the credential store handed to servers.
pub trait CredentialsProvider: Send + Sync {
    fn has_credentials(&self, kind: CredentialsType) -> bool;
    fn get_credentials(&self, kind: CredentialsType) -> Option<Credentials>;
    fn get_connection_metadata(&self) -> Option<ConnectionMetadata>;
    fn get_connection_type(&self) -> SsoConnectionType;
}

type DeletionHandler = Arc<dyn Fn(CredentialsType) + Send + Sync>;

pub struct Auth {
    client: Arc<dyn ClientChannel>,
    telemetry: Telemetry,
    key: Option<Arc<EncryptionKey>>,
    iam: RwLock<Option<IamCredentials>>,
    bearer: RwLock<Option<BearerCredentials>>,
    metadata: RwLock<Option<ConnectionMetadata>>,
    deletion_handlers: RwLock<Vec<DeletionHandler>>,
}

impl Auth {
    pub fn new(
        client: Arc<dyn ClientChannel>,
        telemetry: Telemetry,
        key: Option<Arc<EncryptionKey>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            telemetry,
            key,
            iam: RwLock::new(None),
            bearer: RwLock::new(None),
            metadata: RwLock::new(None),
            deletion_handlers: RwLock::new(Vec::new()),
        })
    }

    /// Wire the four `aws/credentials/*` methods onto `connection`.
    pub fn register(self: &Arc<Self>, connection: &Connection) {
        let auth = Arc::clone(self);
        connection.on_request(Methods::IAM_CREDENTIALS_UPDATE, move |params, _token| {
            let auth = Arc::clone(&auth);
            async move {
                let params: UpdateCredentialsParams = parse_params(params)?;
                auth.update_iam_credentials(params)?;
                Ok(Value::Null)
            }
        });

        let auth = Arc::clone(self);
        connection.on_request(Methods::BEARER_CREDENTIALS_UPDATE, move |params, _token| {
            let auth = Arc::clone(&auth);
            async move {
                let params: UpdateCredentialsParams = parse_params(params)?;
                auth.update_bearer_credentials(params).await?;
                Ok(Value::Null)
            }
        });

        let auth = Arc::clone(self);
        connection.on_notification(Methods::IAM_CREDENTIALS_DELETE, move |_| {
            let auth = Arc::clone(&auth);
            async move { auth.delete_credentials(CredentialsType::Iam) }
        });

        let auth = Arc::clone(self);
        connection.on_notification(Methods::BEARER_CREDENTIALS_DELETE, move |_| {
            let auth = Arc::clone(&auth);
            async move { auth.delete_credentials(CredentialsType::Bearer) }
        });
    }

    /// Register a callback run after a slot is cleared by a delete.
    pub fn on_credentials_deleted(&self, handler: impl Fn(CredentialsType) + Send + Sync + 'static) {
        self.deletion_handlers.write().push(Arc::new(handler));
    }

    // ── Updates ─────────────────────────────────────────────────────────

    pub fn update_iam_credentials(&self, params: UpdateCredentialsParams) -> Result<(), AuthError> {
        let data = self.credentials_payload(&params)?;
        match parse_iam(data) {
            Some(credentials) => {
                *self.iam.write() = Some(credentials);
                info!("IAM credentials updated");
                Ok(())
            }
            None => {
                *self.iam.write() = None;
                warn!("Rejected IAM credentials update");
                Err(AuthError::InvalidIam)
            }
        }
    }

    /// Store a bearer token. Metadata missing from the update is fetched from
    /// the client; failure to fetch it leaves metadata unset but never fails
    /// the update.
    pub async fn update_bearer_credentials(&self, params: UpdateCredentialsParams) -> Result<(), AuthError> {
        let data = self.credentials_payload(&params)?;
        let Some(credentials) = parse_bearer(data) else {
            *self.bearer.write() = None;
            warn!("Rejected bearer credentials update");
            return Err(AuthError::InvalidBearer);
        };
        *self.bearer.write() = Some(credentials);
        info!("Bearer credentials updated");

        let metadata = match params.metadata {
            Some(metadata) => Some(metadata),
            None => self.request_connection_metadata().await,
        };
        // The token may have been deleted while the metadata was fetched
        if self.bearer.read().is_some() {
            *self.metadata.write() = metadata;
        }
        Ok(())
    }

    /// Clear a slot and notify deletion handlers. Clearing bearer credentials
    /// also clears the connection metadata.
    pub fn delete_credentials(&self, kind: CredentialsType) {
        match kind {
            CredentialsType::Iam => *self.iam.write() = None,
            CredentialsType::Bearer => {
                *self.bearer.write() = None;
                *self.metadata.write() = None;
            }
        }
        info!("{kind} credentials deleted");

        let handlers = self.deletion_handlers.read().clone();
        for handler in handlers {
            handler(kind);
        }
    }

    /// The plaintext credentials object of an update, decrypting it first
    /// when the update is flagged as encrypted.
    fn credentials_payload(&self, params: &UpdateCredentialsParams) -> Result<Value, AuthError> {
        if !params.is_encrypted() {
            return Ok(params.data.clone());
        }
        let key = self.key.as_deref().ok_or(EncryptionError::MissingKey)?;
        let token = params.data.as_str().ok_or(EncryptionError::Malformed)?;
        Ok(decrypt_jwt(token, key)?)
    }

    async fn request_connection_metadata(&self) -> Option<ConnectionMetadata> {
        let result = self
            .client
            .send_request(ClientMethods::GET_CONNECTION_METADATA, None)
            .await
            .and_then(|value| {
                serde_json::from_value::<ConnectionMetadata>(value)
                    .map_err(|e| ResponseError::internal(format!("Invalid connection metadata: {e}")))
            });

        match result {
            Ok(metadata) => {
                debug!("Received connection metadata");
                Some(metadata)
            }
            Err(e) => {
                warn!("Failed to fetch connection metadata: {e}");
                self.telemetry.emit_metric(
                    "runtime_getConnectionMetadata",
                    MetricResult::Failed,
                    None,
                    Some(json!({ "reason": e.message })),
                );
                None
            }
        }
    }
}

impl CredentialsProvider for Auth {
    fn has_credentials(&self, kind: CredentialsType) -> bool {
        match kind {
            CredentialsType::Iam => self.iam.read().is_some(),
            CredentialsType::Bearer => self.bearer.read().is_some(),
        }
    }

    fn get_credentials(&self, kind: CredentialsType) -> Option<Credentials> {
        match kind {
            CredentialsType::Iam => self.iam.read().clone().map(Credentials::Iam),
            CredentialsType::Bearer => self.bearer.read().clone().map(Credentials::Bearer),
        }
    }

    fn get_connection_metadata(&self) -> Option<ConnectionMetadata> {
        self.metadata.read().clone()
    }

    fn get_connection_type(&self) -> SsoConnectionType {
        connection_type(self.metadata.read().as_ref())
    }
}

/// Classify a connection by its SSO start URL.
pub fn connection_type(metadata: Option<&ConnectionMetadata>) -> SsoConnectionType {
    let Some(start_url) = metadata.and_then(ConnectionMetadata::start_url) else {
        return SsoConnectionType::None;
    };
    let Ok(url) = Url::parse(start_url) else {
        return SsoConnectionType::None;
    };

    if start_url.contains(BUILDER_ID_START_URL) {
        return SsoConnectionType::BuilderId;
    }
    let aws_owned = url
        .host_str()
        .is_some_and(|host| IDENTITY_CENTER_DOMAINS.iter().any(|domain| host.ends_with(domain)));
    if aws_owned {
        SsoConnectionType::IdentityCenter
    } else {
        SsoConnectionType::ExternalIdp
    }
}

fn parse_iam(data: Value) -> Option<IamCredentials> {
    let credentials: IamCredentials = serde_json::from_value(data).ok()?;
    let complete = !credentials.access_key_id().is_empty() && !credentials.secret_access_key().is_empty();
    complete.then_some(credentials)
}

fn parse_bearer(data: Value) -> Option<BearerCredentials> {
    let credentials: BearerCredentials = serde_json::from_value(data).ok()?;
    (!credentials.token().is_empty()).then_some(credentials)
}
