//! LSP Runtime - Protocol Types
//!
//! JSON-RPC 2.0 / LSP types shared by the transport, services and router.
//! Standard LSP shapes are re-exported from `lsp_types`.
//! This crate is the single source of truth for method names, error codes,
//! wire payloads and the capability merge rules.

pub mod auth;
pub mod capabilities;
pub mod chat;
pub mod encryption;
pub mod error;
pub mod jsonrpc;
pub mod lifecycle;
pub mod merge;
pub mod methods;
pub mod notification;

pub use auth::{
    BearerCredentials, ConnectionMetadata, Credentials, CredentialsType, IamCredentials,
    SsoConnectionType, UpdateCredentialsParams,
};
pub use capabilities::{
    AwsServerCapabilities, ConfigurationProvider, InitializeResult, ServerCapabilities,
    execute_command_options,
};
pub use encryption::EncryptionInitialization;
pub use error::{ErrorCode, ResponseError};
pub use jsonrpc::{HandlerResult, Message, Notification, Request, RequestId, Response, parse_params};
pub use lifecycle::{
    ClientInfo, DidChangeConfigurationParams, ExecuteCommandParams, GetConfigurationFromServerParams,
    InitializeParams, WorkspaceFolder,
};
pub use lsp_types::{
    ExecuteCommandOptions, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, Uri,
};
pub use merge::Merge;
pub use methods::{ClientMethods, Methods};
