//! Query command
//!
//! Search stored logs through the daemon API and print them.

use anyhow::{bail, Result};
use clap::Parser;
use colored::Colorize;
use logdock::client::{ClientError, QueryClient, QueryRequest};
use logdock::model::{Level, LogRecord};
use std::time::{Duration, Instant};

use super::resolve_daemon_url;

#[derive(Debug, Clone, Parser)]
pub struct QueryArgs {
    /// Case-insensitive substring to look for in messages
    pub pattern: Option<String>,

    /// Regular expression to match against messages
    #[arg(short = 'E', long)]
    pub regex: Option<String>,

    /// Filter by application id
    #[arg(short, long)]
    pub application: Option<String>,

    /// Filter by service name (comma-separated for several)
    #[arg(short, long)]
    pub service: Option<String>,

    /// Filter by module name (comma-separated for several)
    #[arg(short, long)]
    pub module: Option<String>,

    /// Minimum level (DEBUG, INFO, WARN, ERROR, CRITICAL)
    #[arg(short = 'l', long)]
    pub min_level: Option<String>,

    /// How many hours back to search
    #[arg(long, default_value = "1")]
    pub hours: u64,

    /// Allow windows longer than 24 hours
    #[arg(long)]
    pub full_search: bool,

    /// Maximum number of results
    #[arg(long)]
    pub limit: Option<usize>,

    /// Resume from a previous page's cursor
    #[arg(long)]
    pub cursor: Option<String>,

    /// Output format (text, json)
    #[arg(short = 'f', long, default_value = "text")]
    pub format: String,

    /// Seconds to wait for the daemon to answer the query
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    #[arg(long)]
    pub url: Option<String>,
}

impl QueryArgs {
    fn to_request(&self) -> Result<QueryRequest> {
        let min_level = match self.min_level.as_deref() {
            Some(raw) => match Level::parse(raw) {
                Some(level) => Some(level),
                None => bail!("Unknown level '{}'. Valid levels: DEBUG, INFO, WARN, ERROR, CRITICAL", raw),
            },
            None => None,
        };

        Ok(QueryRequest {
            hours: self.hours,
            full_search: self.full_search,
            application_id: self.application.clone(),
            service_name: self.service.clone(),
            module_name: self.module.clone(),
            pattern: self.pattern.clone(),
            message_regex: self.regex.clone(),
            min_level,
            limit: self.limit,
            cursor: self.cursor.clone(),
        })
    }
}

pub async fn execute(args: QueryArgs) -> Result<()> {
    let request = args.to_request()?;
    let client = QueryClient::with_timeout(
        resolve_daemon_url(args.url.clone())?,
        Duration::from_secs(args.timeout),
    )?;

    let started = Instant::now();
    let page = match client.query(&request).await {
        Ok(page) => page,
        Err(e @ (ClientError::DaemonUnavailable { .. } | ClientError::WindowTooWide { .. })) => {
            eprintln!("{}", e.to_string().red());
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.results.is_empty() {
        println!("{}", "No logs found matching the criteria".yellow());
        return Ok(());
    }

    display_logs_text(&page.results);
    println!();
    println!(
        "{}",
        format!("Results in {}ms", started.elapsed().as_millis()).dimmed()
    );
    if let Some(cursor) = page.next_cursor.filter(|_| page.has_more) {
        println!("{} --cursor {}", "More results available:".bold(), cursor);
    }

    Ok(())
}

/// ` [service@environment]`, or whichever part the record carries
fn source_tag(log: &LogRecord) -> String {
    match (log.service_name.as_deref(), log.environment()) {
        (Some(service), Some(env)) => format!(" [{}@{}]", service, env),
        (Some(service), None) => format!(" [{}]", service),
        (None, Some(env)) => format!(" [@{}]", env),
        (None, None) => String::new(),
    }
}

fn display_logs_text(logs: &[LogRecord]) {
    println!("{}", format!("Found {} log entries", logs.len()).bold());
    println!();

    for log in logs {
        let timestamp = chrono::DateTime::from_timestamp_micros((log.ts * 1_000_000.0) as i64)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S%.3f");

        let level_colored = match Level::parse_lenient(&log.level) {
            Level::Critical => log.level.red().bold().reversed(),
            Level::Error => log.level.red().bold(),
            Level::Warn => log.level.yellow().bold(),
            Level::Info => log.level.green(),
            Level::Debug => log.level.blue(),
        };

        let service = source_tag(log);

        println!(
            "{} {} {}{} {}",
            timestamp.to_string().dimmed(),
            level_colored,
            log.module_name.cyan(),
            service.dimmed(),
            log.message
        );

        if let Some(exception) = &log.exception_type {
            println!("  {}", exception.red());
        }
        if let Some(stacktrace) = &log.stacktrace {
            for line in stacktrace.lines() {
                println!("    {}", line.dimmed());
            }
        }
        if !log.context.is_empty() {
            let fields = serde_json::Value::Object(log.context.clone());
            println!("  {}", format!("context: {}", fields).dimmed());
        }
    }
}
