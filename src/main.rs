//! MCP Server Entry Point
//!
//! Loads the layered configuration, opens the local registry and serves it
//! over the configured transport.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use prompt_registry_server::core::{Config, McpServer, TransportService};
use prompt_registry_server::domains::registry::{JsonFileStorage, Registry, RegistryAccessor};
use prompt_registry_server::domains::sync::SyncOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // Defaults, then config files, then environment
    let config = Config::load().context("failed to load configuration")?;

    init_logging(&config.logging.level, config.logging.with_timestamps);

    info!("Starting {} v{}", config.server.name, config.server.version);

    let storage = Arc::new(JsonFileStorage::new(&config.registry.path));
    let registry = Registry::load(storage)
        .with_context(|| format!("failed to open registry {}", config.registry.path.display()))?;
    info!(
        "Loaded {} prompts from {}",
        registry.document().len(),
        config.registry.path.display()
    );

    let accessor = RegistryAccessor::new(
        registry,
        SyncOrchestrator::from_config(&config.sync),
        config.registry.stale_after(),
    );

    let transport = TransportService::new(config.transport.clone());
    let server = McpServer::new(config, accessor);

    info!("Server initialized");

    transport.run(server).await?;

    info!("Server shutting down");

    Ok(())
}

/// Initialize the logging subsystem.
///
/// Logs go to stderr so they never mix with the STDIO protocol stream.
fn init_logging(level: &str, with_timestamps: bool) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if with_timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}
