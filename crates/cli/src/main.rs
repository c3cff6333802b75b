//! ctxforge CLI — the main entry point.
//!
//! Commands:
//! - `context` — Retrieve budget-bounded context for a unit of work
//! - `record`  — File a knowledge episode under a category
//! - `status`  — Show configuration and knowledge-service health

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ctxforge",
    about = "ctxforge — budget-bounded context retrieval for coding agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.ctxforge/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve job-specific context for a task
    Context(commands::context::ContextArgs),

    /// Record a knowledge episode
    Record {
        /// Episode name
        #[arg(short, long)]
        name: String,

        /// Target category group (e.g. `project_decisions`, `shared_patterns`)
        #[arg(short, long)]
        category: String,

        /// Episode body; JSON objects keep their fields
        #[arg(short, long)]
        body: String,
    },

    /// Show configuration and knowledge-service status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Context(args) => commands::context::run(config_path, args).await?,
        Commands::Record {
            name,
            category,
            body,
        } => commands::record::run(config_path, &name, &category, &body).await?,
        Commands::Status => commands::status::run(config_path).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_context_command() {
        let cli = Cli::try_parse_from([
            "ctxforge",
            "context",
            "--description",
            "Add OAuth login",
            "--complexity",
            "7",
            "--phase",
            "implement",
            "--autobuild",
            "--actor",
            "coach",
            "--turn",
            "2",
        ])
        .unwrap();
        let Commands::Context(args) = cli.command else {
            panic!("expected context command");
        };
        assert_eq!(args.description, "Add OAuth login");
        assert_eq!(args.complexity, Some(7));
        assert!(args.autobuild);
        assert_eq!(args.turn, Some(2));
    }

    #[test]
    fn parses_record_command_with_global_flags() {
        let cli = Cli::try_parse_from([
            "ctxforge",
            "record",
            "--name",
            "ADR-1",
            "--category",
            "project_decisions",
            "--body",
            "Use Postgres",
            "-v",
            "--config",
            "/tmp/ctxforge.toml",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ctxforge.toml")));
        assert!(matches!(cli.command, Commands::Record { .. }));
    }

    #[test]
    fn complexity_is_bounded() {
        assert!(Cli::try_parse_from(["ctxforge", "context", "-d", "x", "--complexity", "11"]).is_err());
    }
}
