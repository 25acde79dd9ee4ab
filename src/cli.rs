//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

/// Process exit code when the encryption handshake fails.
pub const HANDSHAKE_FAILURE_EXIT_CODE: i32 = 10;

#[derive(Parser, Debug)]
#[command(name = "lsp-runtime", version, about = "LSP Runtime: hosts language servers over one LSP connection")]
pub struct Cli {
    /// Communicate over stdin/stdout (the only supported transport)
    #[arg(long)]
    pub stdio: bool,

    /// Expect a credentials encryption key on the first line of stdin
    #[arg(long = "set-credentials-encryption-key")]
    pub set_credentials_encryption_key: bool,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
