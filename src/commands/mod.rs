//! Command implementations for the CLI
//!
//! - serve: run the daemon
//! - status: probe a running daemon
//! - query: search logs through the daemon API
//! - clear: delete an application's logs
//! - retention: apply the retention policy once

pub mod clear;
pub mod query;
pub mod retention;
pub mod serve;
pub mod status;

use anyhow::Result;
use logdock::client::ClientConfig;

/// `--url` if given, else the daemon address from the client environment
pub fn resolve_daemon_url(url: Option<String>) -> Result<String> {
    match url {
        Some(url) => Ok(url.trim_end_matches('/').to_string()),
        None => Ok(ClientConfig::from_env()?.daemon_base_url()),
    }
}
