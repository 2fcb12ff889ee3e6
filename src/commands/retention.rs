use anyhow::Result;
use colored::Colorize;
use logdock::config::{DaemonConfig, RetentionConfig};
use logdock::retention::RetentionManager;
use logdock::storage::{LogStore, SqliteLogStore};
use std::sync::Arc;

/// Run one retention pass directly against the database
pub async fn execute(cfg: DaemonConfig, days: Option<i64>) -> Result<()> {
    let retention = days.map(RetentionConfig::from_days).unwrap_or(cfg.retention.days);

    let store = Arc::new(
        SqliteLogStore::new(&cfg.storage.database_url)
            .await?
            .with_delete_chunk(cfg.storage.delete_chunk),
    );
    let manager = RetentionManager::new(store.clone(), retention);
    let stats = manager.run_now().await?;
    let remaining = store.count().await?;

    let cutoff = chrono::DateTime::from_timestamp(stats.cutoff as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| stats.cutoff.to_string());

    println!("{}", "Retention pass complete".green().bold());
    println!("  {:<15} {} days", "Retention:".bold(), stats.retention_days);
    println!("  {:<15} {}", "Cutoff:".bold(), cutoff.dimmed());
    println!("  {:<15} {}", "Deleted:".bold(), stats.deleted.to_string().yellow());
    println!("  {:<15} {}", "Remaining:".bold(), remaining);

    Ok(())
}
