//! Transport layer for the MCP server.
//!
//! - **STDIO**: standard input/output (default for MCP clients) - feature `stdio`
//! - **TCP**: line-delimited JSON-RPC over a TCP socket, one MCP session per
//!   connection - feature `tcp`
//!
//! Every transport hands connections to a clone of the same
//! [`McpServer`](crate::core::McpServer), so all sessions share one registry.

mod config;
mod error;
mod service;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use service::TransportService;

#[cfg(feature = "tcp")]
pub use config::TcpConfig;
