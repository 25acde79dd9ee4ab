//! Runtime bootstrapper: the composition root for hosted servers.

use std::sync::Arc;

use runtime_protocol::{EncryptionInitialization, ResponseError};
use runtime_services::{Auth, Chat, CredentialsProvider, EncryptionError, EncryptionKey, Telemetry};
use runtime_transport::{ClientChannel, Connection, HandshakeError, TransportError, validate_encryption_details};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::adapter::LspServer;
use crate::encoding::{Base64Encoding, Encoding};
use crate::features::{Features, Lsp, RuntimeProps, Server, ServerHandle, Workspace};
use crate::notification::{Notifications, ServerNameRouter};
use crate::router::LspRouter;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<RuntimeError> for ResponseError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Encryption(e) => e.into(),
            RuntimeError::Transport(e) => e.into(),
            RuntimeError::Handshake(e) => ResponseError::internal(e.to_string()),
        }
    }
}

pub struct Runtime {
    props: RuntimeProps,
    servers: Vec<Box<dyn Server>>,
    encryption_key: Option<Arc<EncryptionKey>>,
    encoding: Arc<dyn Encoding>,
}

impl Runtime {
    pub fn new(props: RuntimeProps) -> Self {
        Self {
            props,
            servers: Vec::new(),
            encryption_key: None,
            encoding: Arc::new(Base64Encoding),
        }
    }

    /// Host `server`. Servers are started, initialized and routed to in the
    /// order they are added.
    pub fn with_server(mut self, server: impl Server + 'static) -> Self {
        self.servers.push(Box::new(server));
        self
    }

    pub fn with_encoding(mut self, encoding: Arc<dyn Encoding>) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_encryption_key(mut self, key: EncryptionKey) -> Self {
        self.encryption_key = Some(Arc::new(key));
        self
    }

    /// Validate handshake details and adopt their key for the session.
    pub fn with_encryption_details(self, details: &EncryptionInitialization) -> Result<Self, RuntimeError> {
        validate_encryption_details(details)?;
        let key = EncryptionKey::from_base64(details.key.as_deref().unwrap_or_default())?;
        Ok(self.with_encryption_key(key))
    }

    /// Serve one client over `reader` / `writer` until `exit` or EOF, then
    /// dispose every server handle.
    pub async fn run<R, W>(self, reader: R, writer: W) -> Result<(), RuntimeError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let connection = Connection::new();
        let client: Arc<dyn ClientChannel> = connection.clone();
        let telemetry = Telemetry::new(Arc::clone(&client));

        let auth = Auth::new(Arc::clone(&client), telemetry.clone(), self.encryption_key.clone());
        auth.register(&connection);
        let credentials_provider: Arc<dyn CredentialsProvider> = auth;

        let chat = Chat::new(self.encryption_key.clone());
        chat.register(&connection);

        let router = LspRouter::new(&self.props);
        router.register(&connection);

        info!(
            "Starting {} with {} server(s){}",
            self.props.name,
            self.servers.len(),
            if chat.is_encrypted() { ", encrypted" } else { "" }
        );

        let mut handles: Vec<ServerHandle> = Vec::with_capacity(self.servers.len());
        for server in &self.servers {
            let adapter = LspServer::new(server.name());
            router.add_server(Arc::clone(&adapter));

            let features = Features {
                lsp: Lsp::new(adapter, Arc::clone(&router), Arc::clone(&connection)),
                credentials_provider: Arc::clone(&credentials_provider),
                notification: Notifications::new(
                    ServerNameRouter::new(server.name(), Arc::clone(&self.encoding)),
                    Arc::clone(&connection),
                ),
                chat: Arc::clone(&chat),
                workspace: Workspace::new(Arc::clone(&router)),
                telemetry: telemetry.clone(),
                runtime: self.props.clone(),
            };
            info!("Starting server {}", server.name());
            handles.push(server.start(features));
        }

        connection.on_exit(move || {
            info!("Disposing {} server(s)", handles.len());
            for handle in &handles {
                handle.dispose();
            }
        });

        connection.listen(reader, writer).await?;
        info!("Runtime stopped");
        Ok(())
    }
}
