//! LSP Router: aggregates `initialize` across hosted servers and routes
//! commands and configuration queries by advertised capability.

use std::sync::{Arc, OnceLock};

use futures_util::future::join_all;
use parking_lot::RwLock;
use runtime_protocol::{
    DidChangeConfigurationParams, ExecuteCommandParams, GetConfigurationFromServerParams,
    HandlerResult, InitializeParams, InitializeResult, Merge, Methods, ResponseError, ServerInfo,
    parse_params,
};
use runtime_transport::Connection;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::{InitializeOutcome, LspServer};
use crate::features::RuntimeProps;

pub struct LspRouter {
    name: String,
    version: Option<String>,
    /// Adapters in registration order
    servers: RwLock<Vec<Arc<LspServer>>>,
    client_params: OnceLock<InitializeParams>,
}

impl LspRouter {
    pub fn new(props: &RuntimeProps) -> Arc<Self> {
        Arc::new(Self {
            name: props.name.clone(),
            version: props.version.clone(),
            servers: RwLock::new(Vec::new()),
            client_params: OnceLock::new(),
        })
    }

    pub fn add_server(&self, server: Arc<LspServer>) {
        debug!("Registering server adapter: {}", server.name());
        self.servers.write().push(server);
    }

    pub fn servers(&self) -> Vec<Arc<LspServer>> {
        self.servers.read().clone()
    }

    /// The client's `initialize` params, once received.
    pub fn client_initialize_params(&self) -> Option<&InitializeParams> {
        self.client_params.get()
    }

    /// Register the lifecycle and routed methods on `connection`.
    pub fn register(self: &Arc<Self>, connection: &Connection) {
        let router = Arc::clone(self);
        connection.on_request(Methods::INITIALIZE, move |params, token| {
            let router = Arc::clone(&router);
            async move {
                let params: InitializeParams = parse_params(params)?;
                let result = router.initialize(params, token).await?;
                serde_json::to_value(result).map_err(|e| ResponseError::internal(e.to_string()))
            }
        });

        let router = Arc::clone(self);
        connection.on_notification(Methods::INITIALIZED, move |_| {
            let router = Arc::clone(&router);
            async move { router.initialized().await }
        });

        connection.on_request(Methods::SHUTDOWN, |_, _| async {
            info!("Shutdown requested");
            Ok(Value::Null)
        });

        let router = Arc::clone(self);
        connection.on_request(Methods::EXECUTE_COMMAND, move |params, token| {
            let router = Arc::clone(&router);
            async move { router.execute_command(parse_params(params)?, token).await }
        });

        let router = Arc::clone(self);
        connection.on_request(Methods::GET_CONFIGURATION_FROM_SERVER, move |params, token| {
            let router = Arc::clone(&router);
            async move { router.get_configuration_from_server(parse_params(params)?, token).await }
        });

        let router = Arc::clone(self);
        connection.on_notification(Methods::DID_CHANGE_CONFIGURATION, move |params| {
            let router = Arc::clone(&router);
            async move {
                match parse_params::<DidChangeConfigurationParams>(params) {
                    Ok(params) => router.did_change_configuration(params).await,
                    Err(e) => warn!("Ignoring didChangeConfiguration: {e}"),
                }
            }
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Initialize aggregation
    // ─────────────────────────────────────────────────────────────────────

    /// Initialize every server concurrently and fold their results.
    ///
    /// Results are right-folded in registration order over the router
    /// default, so earlier-registered servers win conflicting fields. Any failure, or two servers reporting the
    /// same `serverInfo.name`, fails the whole call.
    pub async fn initialize(
        &self,
        params: InitializeParams,
        token: CancellationToken,
    ) -> Result<InitializeResult, ResponseError> {
        if self.client_params.set(params).is_err() {
            warn!("Received initialize more than once; keeping the first params");
        }
        let params = self
            .client_params
            .get()
            .ok_or_else(|| ResponseError::internal("Client initialize params unavailable"))?;

        let servers = self.servers();
        info!("Initializing {} server(s)", servers.len());
        let outcomes = join_all(
            servers
                .iter()
                .map(|server| server.initialize(params, token.clone())),
        )
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                InitializeOutcome::Declined => {}
                InitializeOutcome::Initialized(result) => results.push(result),
                InitializeOutcome::Failed(e) => return Err(e),
            }
        }

        let duplicates = duplicate_server_names(&results);
        if !duplicates.is_empty() {
            return Err(ResponseError::internal(format!(
                "Duplicate servers defined: {}",
                duplicates.join(", ")
            )));
        }

        let default = InitializeResult::router_default(&self.name, self.version.clone());
        // Right fold: each result absorbs everything registered after it, so a
        // value set by an earlier server shadows the later ones as a whole.
        let mut merged = results
            .into_iter()
            .rev()
            .fold(default, |later, earlier| earlier.merge(later));
        merged.server_info = Some(ServerInfo {
            name: self.name.clone(),
            version: self.version.clone(),
        });
        Ok(merged)
    }

    pub async fn initialized(&self) {
        for server in self.servers() {
            server.initialized().await;
        }
    }

    pub async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        for server in self.servers() {
            server.did_change_configuration(params.clone()).await;
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Capability-gated dispatch
    // ─────────────────────────────────────────────────────────────────────

    /// First server advertising the command handles it; `null` when none does.
    pub async fn execute_command(&self, params: ExecuteCommandParams, token: CancellationToken) -> HandlerResult {
        for server in self.servers() {
            if let Some(result) = server.try_execute_command(&params, token.clone()).await {
                debug!("Command {} handled by {}", params.command, server.name());
                return result;
            }
        }
        debug!("No server handles command {}", params.command);
        Ok(Value::Null)
    }

    /// First server advertising the section answers; `null` when none does.
    pub async fn get_configuration_from_server(
        &self,
        params: GetConfigurationFromServerParams,
        token: CancellationToken,
    ) -> HandlerResult {
        for server in self.servers() {
            if let Some(result) = server.try_get_server_configuration(&params, token.clone()).await {
                debug!("Configuration section {} served by {}", params.section, server.name());
                return result;
            }
        }
        debug!("No server provides configuration section {}", params.section);
        Ok(Value::Null)
    }
}

/// Names reported by more than one result, each once, in first-seen order.
fn duplicate_server_names(results: &[InitializeResult]) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut duplicates: Vec<String> = Vec::new();
    for name in results
        .iter()
        .filter_map(|r| r.server_info.as_ref().map(|info| info.name.as_str()))
    {
        if seen.contains(&name) {
            if !duplicates.iter().any(|d| d == name) {
                duplicates.push(name.to_string());
            }
        } else {
            seen.push(name);
        }
    }
    duplicates
}
