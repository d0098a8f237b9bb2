//! pizzaz-mcp: MCP server exposing widget-backed tools over an SSE transport
//!
//! Serves the pizzaz widget catalog and the personal auto product lookup to
//! MCP clients over HTTP.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use pizzaz_mcp::config::{self, Config};
use pizzaz_mcp::error::BoxError;
use pizzaz_mcp::http;
use pizzaz_mcp::mcp::{SessionManager, TransportBridge};
use pizzaz_mcp::products::HttpProductSource;
use pizzaz_mcp::widgets;

/// MCP server exposing widget-backed tools over an SSE transport.
///
/// Clients open a stream at the SSE path and post JSON-RPC messages to the
/// endpoint announced on it.
#[derive(Parser, Debug)]
#[command(name = "pizzaz-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Interface to bind (overrides the configuration file)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT and the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "info" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO, // Default to info for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Completes on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Builds the catalog and serves it until a shutdown signal arrives.
async fn run(cfg: Config) -> Result<(), BoxError> {
    let source = HttpProductSource::new(&cfg.products)?;
    if cfg.products.api_key.is_none() {
        info!(
            "No product API key configured; set {} to authenticate product lookups",
            config::API_KEY_ENV
        );
    }

    let catalog = widgets::build_catalog(Arc::new(source))?;
    info!(
        tools = catalog.tools.len(),
        resources = catalog.resources.len(),
        "Catalog ready"
    );

    let bridge = TransportBridge::new(
        SessionManager::new(Arc::new(catalog)),
        cfg.server.message_path.clone(),
    );

    let listener = TcpListener::bind((cfg.server.host.as_str(), cfg.server.port)).await?;
    info!(
        address = %listener.local_addr()?,
        sse_path = %cfg.server.sse_path,
        message_path = %cfg.server.message_path,
        "Listening for MCP clients"
    );

    http::serve(listener, bridge, &cfg.server.sse_path, shutdown_signal()).await?;
    Ok(())
}

/// Entry point for the pizzaz-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    // Environment, then CLI flags
    config::apply_env_overrides(
        &mut cfg,
        std::env::var(config::PORT_ENV).ok().as_deref(),
        std::env::var(config::API_KEY_ENV).ok(),
    );
    cfg.server.port = config::resolve_port(args.port, None, cfg.server.port);
    if let Some(host) = args.host {
        cfg.server.host = host;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting pizzaz-mcp server"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg)) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
