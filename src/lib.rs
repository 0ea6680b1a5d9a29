// ABOUTME: Library root for the bcbot MCP server
// ABOUTME: Exposes the MCP tool surface and its HTTP and stdio transports

pub mod logging;
pub mod mcp;
pub mod server;
pub mod stdio;

pub use bcbot_core::{config, metrics, paths};
