//! # eoka-assist
//!
//! Config, CLI and MCP server around [`eoka_actor`]: collect a page's
//! affordances, resolve what the user asked for, and act on the page.

pub mod config;
pub mod mcp;

pub use config::Config;
