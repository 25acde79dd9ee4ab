//! LSP Runtime
//!
//! Hosts LSP servers behind one stdio connection. The binary wires the CLI,
//! logging and the optional encryption handshake onto a
//! [`runtime_server::Runtime`]; this library holds the pieces the binary and
//! its tests share.

pub mod cli;
pub mod runtime_info;

pub use cli::{Cli, HANDSHAKE_FAILURE_EXIT_CODE};
pub use runtime_info::RuntimeInfoServer;
