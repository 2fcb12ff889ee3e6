use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use logdock::{config, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config_path = args.config_path();

    match args.get_command() {
        cli::Commands::Serve => {
            let cfg = config::load_config(config_path.as_deref())?;
            init_tracing(&cfg.server.log_level, &cfg.server.log_format);
            commands::serve::execute(cfg).await?;
        }
        cli::Commands::Status { url } => {
            init_tracing("warn", "text");
            commands::status::execute(url).await?;
        }
        cli::Commands::Query(query_args) => {
            init_tracing("warn", "text");
            commands::query::execute(query_args).await?;
        }
        cli::Commands::Clear {
            application_id,
            environment,
            url,
        } => {
            init_tracing("warn", "text");
            commands::clear::execute(application_id, environment, url).await?;
        }
        cli::Commands::Retention { days } => {
            let cfg = config::load_config(config_path.as_deref())?;
            init_tracing(&cfg.server.log_level, &cfg.server.log_format);
            commands::retention::execute(cfg, days).await?;
        }
    }

    Ok(())
}
