use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "logdock", version, about = "Local log collection daemon")]
pub struct Cli {
    /// Daemon configuration file (defaults to ./logdock.toml when present)
    #[arg(short, long, global = true, env = "LOGDOCK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the daemon in the foreground (default)
    Serve,

    /// Check whether the daemon is reachable
    Status {
        /// Daemon base URL (defaults to LOGDOCK_DAEMON_URL or host/port)
        #[arg(long)]
        url: Option<String>,
    },

    /// Search stored logs through the daemon
    Query(crate::commands::query::QueryArgs),

    /// Delete one application's logs
    Clear {
        #[arg(short, long)]
        application_id: String,

        /// Only records whose context.environment matches
        #[arg(short, long)]
        environment: Option<String>,

        #[arg(long)]
        url: Option<String>,
    },

    /// Apply the retention policy to the database now
    Retention {
        /// Override the configured retention period
        #[arg(short, long)]
        days: Option<i64>,
    },
}

impl Cli {
    /// Get the command to execute, defaulting to Serve if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }

    pub fn config_path(&self) -> Option<String> {
        self.config.as_ref().map(|p| p.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let cli = Cli::try_parse_from(["logdock"]).unwrap();
        assert!(matches!(cli.get_command(), Commands::Serve));
        assert!(cli.config_path().is_none());
    }

    #[test]
    fn test_cli_parsing_query() {
        let cli = Cli::try_parse_from([
            "logdock",
            "query",
            "timeout",
            "--hours",
            "48",
            "--full-search",
            "--module",
            "db,http",
            "--min-level",
            "error",
        ])
        .unwrap();

        match cli.get_command() {
            Commands::Query(args) => {
                assert_eq!(args.pattern.as_deref(), Some("timeout"));
                assert_eq!(args.hours, 48);
                assert!(args.full_search);
                assert_eq!(args.module.as_deref(), Some("db,http"));
                assert_eq!(args.min_level.as_deref(), Some("error"));
            }
            _ => panic!("Expected Query command"),
        }
    }

    #[test]
    fn test_cli_parsing_clear_requires_application() {
        assert!(Cli::try_parse_from(["logdock", "clear"]).is_err());

        let cli = Cli::try_parse_from(["logdock", "clear", "-a", "billing", "-e", "staging"]).unwrap();
        match cli.get_command() {
            Commands::Clear {
                application_id,
                environment,
                ..
            } => {
                assert_eq!(application_id, "billing");
                assert_eq!(environment.as_deref(), Some("staging"));
            }
            _ => panic!("Expected Clear command"),
        }
    }

    #[test]
    fn test_cli_parsing_retention_and_config() {
        let cli = Cli::try_parse_from(["logdock", "--config", "custom.toml", "retention", "--days", "30"]).unwrap();
        assert_eq!(cli.config_path().as_deref(), Some("custom.toml"));
        assert!(matches!(cli.get_command(), Commands::Retention { days: Some(30) }));
    }
}
