//! Built-in server reporting the runtime's own state.
//!
//! Advertises one command and one configuration section; both answer with
//! the runtime identity, credential presence and SSO connection type.

use std::sync::Arc;

use runtime_protocol::{
    AwsServerCapabilities, ConfigurationProvider, CredentialsType, InitializeResult,
    ServerCapabilities, ServerInfo, execute_command_options,
};
use runtime_server::{Features, RuntimeProps, Server, ServerHandle, Workspace};
use runtime_services::CredentialsProvider;
use serde_json::{Value, json};
use tracing::{debug, info};

pub const RUNTIME_INFO_COMMAND: &str = "aws/runtime/info";
pub const RUNTIME_CONFIGURATION_SECTION: &str = "aws.runtime";

const SERVER_NAME: &str = "runtime-info";

#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeInfoServer;

#[derive(Clone)]
struct InfoSource {
    runtime: RuntimeProps,
    credentials: Arc<dyn CredentialsProvider>,
    workspace: Workspace,
}

impl InfoSource {
    fn snapshot(&self) -> Value {
        json!({
            "name": self.runtime.name,
            "version": self.runtime.version,
            "connectionType": self.credentials.get_connection_type(),
            "hasIamCredentials": self.credentials.has_credentials(CredentialsType::Iam),
            "hasBearerCredentials": self.credentials.has_credentials(CredentialsType::Bearer),
            "workspaceFolders": self.workspace.workspace_folders(),
        })
    }
}

impl Server for RuntimeInfoServer {
    fn name(&self) -> &str {
        SERVER_NAME
    }

    fn start(&self, features: Features) -> ServerHandle {
        let source = InfoSource {
            runtime: features.runtime.clone(),
            credentials: Arc::clone(&features.credentials_provider),
            workspace: features.workspace.clone(),
        };

        features.lsp.on_initialize(|_, _| async {
            Ok(InitializeResult {
                capabilities: ServerCapabilities {
                    execute_command_provider: Some(execute_command_options([RUNTIME_INFO_COMMAND])),
                    ..Default::default()
                },
                aws_server_capabilities: Some(AwsServerCapabilities {
                    configuration_provider: Some(ConfigurationProvider::new([RUNTIME_CONFIGURATION_SECTION])),
                    ..Default::default()
                }),
                server_info: Some(ServerInfo {
                    name: SERVER_NAME.into(),
                    version: None,
                }),
            })
        });

        let commands = source.clone();
        features.lsp.on_execute_command(move |_, _| {
            let info = commands.snapshot();
            async move { Ok(info) }
        });

        let configuration = source;
        features.lsp.on_get_configuration_from_server(move |_, _| {
            let info = configuration.snapshot();
            async move { Ok(info) }
        });

        features.lsp.on_did_change_configuration(|params| async move {
            debug!("Configuration changed: {}", params.settings);
        });

        info!("{SERVER_NAME} started");
        ServerHandle::new(|| debug!("{SERVER_NAME} stopped"))
    }
}
