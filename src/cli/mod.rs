//! # CLI Module
//!
//! This module provides command-line interface functionality for logvault.
//! It handles parsing and execution of CLI commands for running the ingest
//! pipeline and managing the log store database.
//!
//! ## Commands
//!
//! - `start`: run the ingest pipeline, reading events from stdin until EOF
//!   or Ctrl+C, then shutting the service down gracefully
//! - `migrate`: apply all pending database migrations
//! - `list-migrations`: show applied and pending migrations
//! - `schema`: print the schema of all tables in the database
//!
//! ## Ingest line formats
//!
//! Each stdin line becomes one log event. Accepted forms:
//!
//! - `{"level": "ERROR", "message": "disk full"}`
//! - `ERROR disk full`
//! - `disk full` (logged at INFO)

use clap::{Parser, Subcommand};
use function_name::named;
use serde::Deserialize;
use sqlx::sqlite::SqlitePool;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::database::{DatabaseManager, MigrationCli};
use crate::env::AppConfig;
use crate::service::LogService;
use crate::store::sqlite::SqliteLogStore;
use crate::store::{LogLevel, SourceContext};

///////////////////////////////////////////////////////////////////////////////
//****                        Private Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

#[derive(Parser)]
#[command(name = "logvault")]
#[command(about = "Durable batched log persistence service CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingest pipeline, reading log events from stdin
    #[command(name = "start")]
    Start,
    /// Apply all pending database migrations
    #[command(name = "migrate")]
    Migrate,
    /// Show applied and pending migrations
    #[command(name = "list-migrations")]
    ListMigrations,
    /// Print the schema of all tables in the database
    #[command(name = "schema")]
    Schema,
}

/// One stdin line in JSON form.
#[derive(Deserialize)]
struct IngestLine {
    level: Option<LogLevel>,
    message: String,
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Parse the command line and execute the selected command.
pub async fn parse_cli_commands(pool: SqlitePool, config: AppConfig) {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => run_ingest(pool, config).await,
        Commands::Migrate => {
            let migration_cli = MigrationCli::new(DatabaseManager::new(pool));
            migration_cli
                .apply_migrations()
                .await
                .expect("Failed to apply migrations");
        }
        Commands::ListMigrations => {
            let migration_cli = MigrationCli::new(DatabaseManager::new(pool));
            migration_cli
                .list_migrations()
                .await
                .expect("Failed to list migrations");
        }
        Commands::Schema => {
            let migration_cli = MigrationCli::new(DatabaseManager::new(pool));
            migration_cli
                .view_schema()
                .await
                .expect("Failed to read schema");
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Private Functions                           ****//
///////////////////////////////////////////////////////////////////////////////

/// Run the log service over stdin until the input ends or Ctrl+C arrives,
/// then shut down, flushing whatever is still buffered.
#[named]
async fn run_ingest(pool: SqlitePool, config: AppConfig) {
    let store = SqliteLogStore::new(pool);
    let service = LogService::new(store, config.log_service_config());
    service.initialize();
    info!(
        target: "logvault::cli",
        "ingesting from stdin, press Ctrl+C to stop"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let (level, message) = parse_line(line);
                    let context = SourceContext::capture().in_function(function_name!());
                    service.log_with_context(message, level, context).await;
                }
                Ok(None) => {
                    info!(target: "logvault::cli", "stdin closed, shutting down");
                    break;
                }
                Err(e) => {
                    warn!(target: "logvault::cli", "failed to read stdin: {}", e);
                    break;
                }
            },
            _ = &mut ctrl_c => {
                info!(target: "logvault::cli", "received shutdown signal");
                break;
            }
        }
    }

    service.shutdown().await;
}

/// Accepts `{"level": "...", "message": "..."}`, `LEVEL message`, or plain
/// text (logged at INFO).
fn parse_line(line: &str) -> (LogLevel, String) {
    if let Ok(parsed) = serde_json::from_str::<IngestLine>(line) {
        return (parsed.level.unwrap_or(LogLevel::Info), parsed.message);
    }
    if let Some((prefix, rest)) = line.split_once(' ') {
        if let Some(level) = LogLevel::parse(prefix) {
            return (level, rest.trim_start().to_string());
        }
    }
    (LogLevel::Info, line.to_string())
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_accepts_json() {
        let (level, message) = parse_line(r#"{"level": "ERROR", "message": "disk full"}"#);
        assert_eq!(level, LogLevel::Error);
        assert_eq!(message, "disk full");
    }

    #[test]
    fn parse_line_json_defaults_to_info() {
        let (level, message) = parse_line(r#"{"message": "plain json"}"#);
        assert_eq!(level, LogLevel::Info);
        assert_eq!(message, "plain json");
    }

    #[test]
    fn parse_line_accepts_level_prefix() {
        let (level, message) = parse_line("WARN cache miss rate above threshold");
        assert_eq!(level, LogLevel::Warning);
        assert_eq!(message, "cache miss rate above threshold");
    }

    #[test]
    fn parse_line_falls_back_to_info() {
        let (level, message) = parse_line("just some text");
        assert_eq!(level, LogLevel::Info);
        assert_eq!(message, "just some text");
    }
}
