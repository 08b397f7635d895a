//! Domains module containing business logic organized by bounded contexts.
//!
//! `registry` owns the prompt data, `sync` brings in remote changes, and
//! `prompts` and `tools` expose both to MCP clients.

pub mod prompts;
pub mod registry;
pub mod sync;
pub mod tools;
