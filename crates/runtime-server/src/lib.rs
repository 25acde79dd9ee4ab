//! LSP Runtime - Server Host
//!
//! Hosts several independently written servers behind one LSP connection.
//! The router fans `initialize` out to every server and merges the answers,
//! then routes commands and configuration queries to whichever server
//! advertised them.

pub mod adapter;
pub mod encoding;
pub mod features;
pub mod notification;
pub mod router;
pub mod runtime;

pub use adapter::{AdapterState, InitializeOutcome, LspServer};
pub use encoding::{Base64Encoding, Encoding};
pub use features::{Features, Lsp, RuntimeProps, Server, ServerHandle, Workspace};
pub use notification::{Notifications, ServerNameRouter};
pub use router::LspRouter;
pub use runtime::{Runtime, RuntimeError};
