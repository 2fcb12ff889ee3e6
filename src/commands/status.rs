use anyhow::Result;
use colored::Colorize;
use logdock::client::DaemonHealth;

use super::resolve_daemon_url;

pub async fn execute(url: Option<String>) -> Result<()> {
    let base_url = resolve_daemon_url(url)?;
    let health = DaemonHealth::new(base_url.as_str())?;

    match health.check().await {
        Ok(status) => {
            println!("{} {}", "Daemon is".green(), status.status.green().bold());
            println!("  {:<15} {}", "URL:".bold(), base_url.cyan());
            println!("  {:<15} {}", "Service:".bold(), status.service_name);
            println!("  {:<15} {}", "Version:".bold(), status.version);
            println!("  {:<15} {}:{}", "Listening:".bold(), status.host, status.port);
            println!("  {:<15} {} days", "Retention:".bold(), status.retention_days);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            std::process::exit(1);
        }
    }
}
