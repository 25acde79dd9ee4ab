//! The feature bundle each hosted server is started with, and the `Server`
//! factory trait.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use runtime_protocol::{
    DidChangeConfigurationParams, ExecuteCommandParams, GetConfigurationFromServerParams,
    HandlerResult, InitializeParams, InitializeResult, Methods, ResponseError, WorkspaceFolder,
};
use runtime_services::{Chat, CredentialsProvider, Telemetry};
use runtime_transport::{Connection, TransportError};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapter::LspServer;
use crate::notification::Notifications;
use crate::router::LspRouter;

/// Identity the runtime reports in `serverInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProps {
    pub name: String,
    pub version: Option<String>,
}

impl RuntimeProps {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lsp
// ─────────────────────────────────────────────────────────────────────────────

/// LSP surface for one server: handlers go to that server's adapter; raw
/// methods go straight to the connection.
#[derive(Clone)]
pub struct Lsp {
    adapter: Arc<LspServer>,
    router: Arc<LspRouter>,
    connection: Arc<Connection>,
}

impl Lsp {
    pub fn new(adapter: Arc<LspServer>, router: Arc<LspRouter>, connection: Arc<Connection>) -> Self {
        Self {
            adapter,
            router,
            connection,
        }
    }

    pub fn on_initialize<F, Fut>(&self, handler: F)
    where
        F: Fn(InitializeParams, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<InitializeResult, ResponseError>> + Send + 'static,
    {
        self.adapter.set_initialize_handler(handler);
    }

    pub fn on_initialized<F, Fut>(&self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.adapter.set_initialized_handler(handler);
    }

    pub fn on_execute_command<F, Fut>(&self, handler: F)
    where
        F: Fn(ExecuteCommandParams, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.adapter.set_execute_command_handler(handler);
    }

    pub fn on_get_configuration_from_server<F, Fut>(&self, handler: F)
    where
        F: Fn(GetConfigurationFromServerParams, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.adapter.set_server_configuration_handler(handler);
    }

    pub fn on_did_change_configuration<F, Fut>(&self, handler: F)
    where
        F: Fn(DidChangeConfigurationParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.adapter.set_did_change_configuration_handler(handler);
    }

    /// The client's initialize params; `None` until `initialize` arrives.
    pub fn client_initialize_params(&self) -> Option<InitializeParams> {
        self.router.client_initialize_params().cloned()
    }

    /// Register a raw request handler. Methods the runtime answers itself
    /// (see [`Methods::RUNTIME_REQUESTS`]) are refused with a warning.
    pub fn on_request<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Option<Value>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        if Methods::is_runtime_request(method) {
            warn!(
                "Server {} tried to register {method}, which the runtime handles; ignoring",
                self.adapter.name()
            );
            return;
        }
        self.connection.on_request(method, handler);
    }

    pub fn on_notification<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.connection.on_notification(method, handler);
    }

    pub async fn send_request(&self, method: &str, params: Option<Value>) -> HandlerResult {
        self.connection.send_request(method, params).await
    }

    pub fn send_notification(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        self.connection.send_notification(method, params)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workspace
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Workspace {
    router: Arc<LspRouter>,
}

impl Workspace {
    pub fn new(router: Arc<LspRouter>) -> Self {
        Self { router }
    }

    /// Workspace folders from the client's initialize params, falling back
    /// to a single folder for `rootUri`. Empty before `initialize`.
    #[expect(deprecated, reason = "rootUri is still sent by clients without workspace folders")]
    pub fn workspace_folders(&self) -> Vec<WorkspaceFolder> {
        let Some(params) = self.router.client_initialize_params() else {
            return Vec::new();
        };
        if let Some(folders) = &params.workspace_folders {
            return folders.clone();
        }
        params
            .root_uri
            .as_ref()
            .map(|uri| {
                let name = uri
                    .as_str()
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                vec![WorkspaceFolder { uri: uri.clone(), name }]
            })
            .unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Features + Server
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a server can use. Built per server by the runtime.
#[derive(Clone)]
pub struct Features {
    pub lsp: Lsp,
    pub credentials_provider: Arc<dyn CredentialsProvider>,
    pub notification: Notifications,
    pub chat: Arc<Chat>,
    pub workspace: Workspace,
    pub telemetry: Telemetry,
    pub runtime: RuntimeProps,
}

/// A hosted server: registers what it needs on `features` and returns a
/// handle whose teardown runs when the runtime stops.
pub trait Server: Send + Sync {
    fn name(&self) -> &str;
    fn start(&self, features: Features) -> ServerHandle;
}

/// Teardown for a started server. Runs at most once, on
/// [`ServerHandle::dispose`] or on drop.
pub struct ServerHandle {
    teardown: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ServerHandle {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// A handle with nothing to tear down.
    pub fn noop() -> Self {
        Self {
            teardown: Mutex::new(None),
        }
    }

    pub fn dispose(&self) {
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            debug!("Disposing server");
            teardown();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("disposed", &self.teardown.lock().is_none())
            .finish()
    }
}
