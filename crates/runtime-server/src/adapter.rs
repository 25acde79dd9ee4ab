//! Per-server adapter.
//!
//! Each hosted server gets one `LspServer`. It holds the handlers the server
//! chose to register and, once `initialize` succeeds, the capabilities the
//! server advertised. Dispatch is gated on that snapshot: until it exists the
//! adapter matches nothing.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use runtime_protocol::{
    DidChangeConfigurationParams, ExecuteCommandParams, GetConfigurationFromServerParams,
    HandlerResult, InitializeParams, InitializeResult, ResponseError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub type InitializeHandler = Arc<
    dyn Fn(InitializeParams, CancellationToken) -> BoxFuture<'static, Result<InitializeResult, ResponseError>>
        + Send
        + Sync,
>;
pub type ExecuteCommandHandler =
    Arc<dyn Fn(ExecuteCommandParams, CancellationToken) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
pub type ServerConfigurationHandler = Arc<
    dyn Fn(GetConfigurationFromServerParams, CancellationToken) -> BoxFuture<'static, HandlerResult>
        + Send
        + Sync,
>;
pub type DidChangeConfigurationHandler =
    Arc<dyn Fn(DidChangeConfigurationParams) -> BoxFuture<'static, ()> + Send + Sync>;
pub type InitializedHandler = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Unconfigured,
    Initializing,
    Ready,
    /// Initialize returned an error or panicked before any snapshot was taken.
    Failed,
}

/// What one adapter contributed to `initialize`.
#[derive(Debug, Clone, PartialEq)]
pub enum InitializeOutcome {
    /// No initialize handler registered.
    Declined,
    Initialized(InitializeResult),
    /// The handler returned an error or panicked.
    Failed(ResponseError),
}

#[derive(Default)]
struct Handlers {
    initialize: Option<InitializeHandler>,
    initialized: Option<InitializedHandler>,
    execute_command: Option<ExecuteCommandHandler>,
    server_configuration: Option<ServerConfigurationHandler>,
    did_change_configuration: Option<DidChangeConfigurationHandler>,
}

pub struct LspServer {
    name: String,
    handlers: RwLock<Handlers>,
    state: Mutex<AdapterState>,
    /// Written once, after the first successful initialize
    capabilities: OnceLock<InitializeResult>,
}

impl LspServer {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            handlers: RwLock::new(Handlers::default()),
            state: Mutex::new(AdapterState::Unconfigured),
            capabilities: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AdapterState {
        *self.state.lock()
    }

    /// The capabilities captured from this server's initialize result.
    pub fn capabilities(&self) -> Option<&InitializeResult> {
        self.capabilities.get()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Handler registration
    // ─────────────────────────────────────────────────────────────────────

    pub fn set_initialize_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(InitializeParams, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<InitializeResult, ResponseError>> + Send + 'static,
    {
        self.handlers.write().initialize = Some(Arc::new(move |p, t| Box::pin(handler(p, t))));
    }

    pub fn set_initialized_handler<F, Fut>(&self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers.write().initialized = Some(Arc::new(move || Box::pin(handler())));
    }

    pub fn set_execute_command_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(ExecuteCommandParams, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers.write().execute_command = Some(Arc::new(move |p, t| Box::pin(handler(p, t))));
    }

    pub fn set_server_configuration_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(GetConfigurationFromServerParams, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers.write().server_configuration = Some(Arc::new(move |p, t| Box::pin(handler(p, t))));
    }

    pub fn set_did_change_configuration_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(DidChangeConfigurationParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers.write().did_change_configuration = Some(Arc::new(move |p| Box::pin(handler(p))));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Run this server's initialize handler.
    ///
    /// Expected to be called once per session. The capability snapshot is
    /// write-once, so a later successful call does not replace it.
    pub async fn initialize(&self, params: &InitializeParams, token: CancellationToken) -> InitializeOutcome {
        let Some(handler) = self.handlers.read().initialize.clone() else {
            debug!("Server {} has no initialize handler", self.name);
            return InitializeOutcome::Declined;
        };

        *self.state.lock() = AdapterState::Initializing;
        let params = params.clone();
        let outcome = AssertUnwindSafe(async move { handler(params, token).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => {
                if self.capabilities.set(result.clone()).is_err() {
                    warn!("Server {} initialized more than once; keeping first capabilities", self.name);
                }
                *self.state.lock() = AdapterState::Ready;
                info!("Server {} initialized", self.name);
                InitializeOutcome::Initialized(result)
            }
            Ok(Err(e)) => {
                warn!("Server {} failed to initialize: {e}", self.name);
                self.settle_failed();
                InitializeOutcome::Failed(e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("Server {} panicked during initialize: {message}", self.name);
                self.settle_failed();
                InitializeOutcome::Failed(ResponseError::internal(message))
            }
        }
    }

    /// A failed re-initialize leaves an earlier snapshot, and `Ready`, in place.
    fn settle_failed(&self) {
        *self.state.lock() = if self.capabilities.get().is_some() {
            AdapterState::Ready
        } else {
            AdapterState::Failed
        };
    }

    pub async fn initialized(&self) {
        let handler = self.handlers.read().initialized.clone();
        if let Some(handler) = handler {
            handler().await;
        }
    }

    pub async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let handler = self.handlers.read().did_change_configuration.clone();
        if let Some(handler) = handler {
            handler(params).await;
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Capability-gated dispatch
    // ─────────────────────────────────────────────────────────────────────

    /// Run the command if this server advertised it. `None` means not handled.
    pub async fn try_execute_command(
        &self,
        params: &ExecuteCommandParams,
        token: CancellationToken,
    ) -> Option<HandlerResult> {
        let declared = self
            .capabilities
            .get()
            .is_some_and(|caps| caps.declares_command(&params.command));
        if !declared {
            return None;
        }
        let handler = self.handlers.read().execute_command.clone()?;
        Some(handler(params.clone(), token).await)
    }

    /// Answer the configuration query if this server advertised the section.
    /// `None` means not handled.
    pub async fn try_get_server_configuration(
        &self,
        params: &GetConfigurationFromServerParams,
        token: CancellationToken,
    ) -> Option<HandlerResult> {
        let declared = self
            .capabilities
            .get()
            .is_some_and(|caps| caps.declares_configuration_section(&params.section));
        if !declared {
            return None;
        }
        let handler = self.handlers.read().server_configuration.clone()?;
        Some(handler(params.clone(), token).await)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "initialize handler panicked".to_string()
    }
}
