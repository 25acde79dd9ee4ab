//! LSP Runtime: hosts language servers behind one stdio LSP connection.
//!
//! Usage:
//!   lsp-runtime --stdio                                   # Plaintext credentials
//!   lsp-runtime --stdio --set-credentials-encryption-key  # First stdin line is the key handshake
//!   lsp-runtime --stdio --verbose --log-file runtime.log  # Debug logs to a file
//!
//! stdout carries the LSP stream, so logs go to stderr or the log file.

use anyhow::Context;
use clap::Parser;
use lsp_runtime::{Cli, HANDSHAKE_FAILURE_EXIT_CODE, RuntimeInfoServer};
use runtime_server::{Runtime, RuntimeProps};
use runtime_transport::read_encryption_details;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(ref log_path) = cli.log_file {
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let props = RuntimeProps::new(env!("CARGO_PKG_NAME"), Some(env!("CARGO_PKG_VERSION").into()));
    info!("{} v{} starting", props.name, env!("CARGO_PKG_VERSION"));
    if !cli.stdio {
        info!("No transport flag given; using stdio");
    }

    let mut stdin = tokio::io::stdin();
    let mut runtime = Runtime::new(props).with_server(RuntimeInfoServer);

    if cli.set_credentials_encryption_key {
        let details = match read_encryption_details(&mut stdin).await {
            Ok(details) => details,
            Err(e) => {
                error!("Failed to read encryption details: {e}");
                std::process::exit(HANDSHAKE_FAILURE_EXIT_CODE);
            }
        };
        runtime = match runtime.with_encryption_details(&details) {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Invalid encryption details: {e}");
                std::process::exit(HANDSHAKE_FAILURE_EXIT_CODE);
            }
        };
        info!("Credentials encryption enabled");
    }

    runtime
        .run(stdin, tokio::io::stdout())
        .await
        .context("LSP session failed")?;

    info!("Shutdown complete");
    Ok(())
}
