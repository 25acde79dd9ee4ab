//! Client-side lifecycle payloads.
//!
//! Standard LSP params come from `lsp_types`; only the AWS extension request
//! is defined here.

use serde::{Deserialize, Serialize};

pub use lsp_types::{
    ClientInfo, DidChangeConfigurationParams, ExecuteCommandParams, InitializeParams, WorkspaceFolder,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetConfigurationFromServerParams {
    pub section: String,
}
