//! Prompt Registry MCP Server Library
//!
//! This crate keeps a local, versioned registry of prompt templates, keeps it
//! in step with a trusted remote registry, and serves it over the Model
//! Context Protocol (MCP).
//!
//! # Architecture
//!
//! The server is organized into the following modules:
//!
//! - **core**: Configuration, error handling, source trust policy, the MCP server and transports
//! - **domains**: Business logic organized by bounded contexts
//!   - **registry**: Versioned prompt entries, persistence and the shared accessor
//!   - **sync**: Remote fetching, validation, caching and merging
//!   - **prompts**: Template rendering and the MCP prompt surface
//!   - **tools**: MCP tools that can be executed by clients
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use prompt_registry_server::core::{Config, McpServer, TransportService};
//! use prompt_registry_server::domains::registry::{JsonFileStorage, Registry, RegistryAccessor};
//! use prompt_registry_server::domains::sync::SyncOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let registry = Registry::load(Arc::new(JsonFileStorage::new(&config.registry.path)))?;
//!     let accessor = RegistryAccessor::new(
//!         registry,
//!         SyncOrchestrator::from_config(&config.sync),
//!         config.registry.stale_after(),
//!     );
//!     let transport = TransportService::new(config.transport.clone());
//!     transport.run(McpServer::new(config, accessor)).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
