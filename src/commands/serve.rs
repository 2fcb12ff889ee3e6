use anyhow::Result;
use colored::Colorize;
use logdock::{config::DaemonConfig, server};

pub async fn execute(cfg: DaemonConfig) -> Result<()> {
    println!(
        "{} {}",
        "Starting logdock daemon on".green(),
        format!("{}:{}", cfg.server.host, cfg.server.port).cyan()
    );

    server::start_server(cfg).await
}
