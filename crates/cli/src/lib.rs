//! Process entry point for a replicated key-value node: config loading,
//! structured logging, the peer listener, and the HTTP adapter.

pub mod config;
pub mod http;
pub mod logging;
pub mod server;

pub use config::CliConfig;
