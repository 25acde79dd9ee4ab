//! Initialize result and the capability subset the runtime routes on.
//!
//! Leaf capability types come from `lsp_types`. The router only types the
//! fields it inspects or must merge with a rule of their own; everything else
//! a server advertises is kept in the flattened `other` maps and merged with
//! the generic JSON rules.

use lsp_types::{
    ExecuteCommandOptions, SaveOptions, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, TextDocumentSyncSaveOptions, WorkDoneProgressOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::merge::{Merge, union};

// ─────────────────────────────────────────────────────────────────────────────
// Initialize result
// ─────────────────────────────────────────────────────────────────────────────

/// The `initialize` result, either one server's partial answer or the merged
/// answer returned to the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    #[serde(rename = "awsServerCapabilities", default, skip_serializing_if = "Option::is_none")]
    pub aws_server_capabilities: Option<AwsServerCapabilities>,
    #[serde(rename = "serverInfo", default, skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerInfo>,
}

impl InitializeResult {
    /// The lowest-priority base every merged initialize result starts from.
    pub fn router_default(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::INCREMENTAL),
                    will_save: None,
                    will_save_wait_until: None,
                    save: None,
                })),
                ..Default::default()
            },
            aws_server_capabilities: None,
            server_info: Some(ServerInfo {
                name: name.into(),
                version,
            }),
        }
    }

    /// Whether `executeCommandProvider.commands` lists `command`.
    pub fn declares_command(&self, command: &str) -> bool {
        self.capabilities
            .execute_command_provider
            .as_ref()
            .is_some_and(|p| p.commands.iter().any(|c| c == command))
    }

    /// Whether `awsServerCapabilities.configurationProvider.sections` lists `section`.
    pub fn declares_configuration_section(&self, section: &str) -> bool {
        self.aws_server_capabilities
            .as_ref()
            .and_then(|aws| aws.configuration_provider.as_ref())
            .is_some_and(|p| p.sections.iter().any(|s| s == section))
    }
}

impl Merge for InitializeResult {
    fn merge(self, secondary: Self) -> Self {
        Self {
            capabilities: self.capabilities.merge(secondary.capabilities),
            aws_server_capabilities: self
                .aws_server_capabilities
                .merge(secondary.aws_server_capabilities),
            server_info: self.server_info.or(secondary.server_info),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server capabilities
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(rename = "textDocumentSync", default, skip_serializing_if = "Option::is_none")]
    pub text_document_sync: Option<TextDocumentSyncCapability>,
    #[serde(rename = "executeCommandProvider", default, skip_serializing_if = "Option::is_none")]
    pub execute_command_provider: Option<ExecuteCommandOptions>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Merge for ServerCapabilities {
    fn merge(self, secondary: Self) -> Self {
        Self {
            text_document_sync: self.text_document_sync.merge(secondary.text_document_sync),
            execute_command_provider: self
                .execute_command_provider
                .merge(secondary.execute_command_provider),
            other: self.other.merge(secondary.other),
        }
    }
}

/// Builds `executeCommandProvider` options for `commands`.
pub fn execute_command_options<I, S>(commands: I) -> ExecuteCommandOptions
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ExecuteCommandOptions {
        commands: commands.into_iter().map(Into::into).collect(),
        work_done_progress_options: WorkDoneProgressOptions::default(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge rules for lsp_types leaves
// ─────────────────────────────────────────────────────────────────────────────

/// A bare kind and an options object cannot be combined; the primary form
/// is kept whole.
impl Merge for TextDocumentSyncCapability {
    fn merge(self, secondary: Self) -> Self {
        match (self, secondary) {
            (Self::Options(primary), Self::Options(secondary)) => Self::Options(primary.merge(secondary)),
            (primary, _) => primary,
        }
    }
}

impl Merge for TextDocumentSyncOptions {
    fn merge(self, secondary: Self) -> Self {
        Self {
            open_close: self.open_close.or(secondary.open_close),
            change: self.change.or(secondary.change),
            will_save: self.will_save.or(secondary.will_save),
            will_save_wait_until: self.will_save_wait_until.or(secondary.will_save_wait_until),
            save: self.save.merge(secondary.save),
        }
    }
}

impl Merge for TextDocumentSyncSaveOptions {
    fn merge(self, secondary: Self) -> Self {
        match (self, secondary) {
            (Self::SaveOptions(primary), Self::SaveOptions(secondary)) => Self::SaveOptions(SaveOptions {
                include_text: primary.include_text.or(secondary.include_text),
            }),
            (primary, _) => primary,
        }
    }
}

impl Merge for ExecuteCommandOptions {
    fn merge(self, secondary: Self) -> Self {
        Self {
            commands: union(self.commands, secondary.commands),
            work_done_progress_options: WorkDoneProgressOptions {
                work_done_progress: self
                    .work_done_progress_options
                    .work_done_progress
                    .or(secondary.work_done_progress_options.work_done_progress),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AWS extension capabilities
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsServerCapabilities {
    #[serde(rename = "configurationProvider", default, skip_serializing_if = "Option::is_none")]
    pub configuration_provider: Option<ConfigurationProvider>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Merge for AwsServerCapabilities {
    fn merge(self, secondary: Self) -> Self {
        Self {
            configuration_provider: self
                .configuration_provider
                .merge(secondary.configuration_provider),
            other: self.other.merge(secondary.other),
        }
    }
}

/// Configuration sections a server can answer `aws/getConfigurationFromServer` for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationProvider {
    #[serde(default)]
    pub sections: Vec<String>,
}

impl ConfigurationProvider {
    pub fn new<I, S>(sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sections: sections.into_iter().map(Into::into).collect(),
        }
    }
}

impl Merge for ConfigurationProvider {
    fn merge(self, secondary: Self) -> Self {
        Self {
            sections: union(self.sections, secondary.sections),
        }
    }
}
