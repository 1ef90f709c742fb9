// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifeline - client resilience daemon.
//!
//! This is the binary entry point: it loads configuration, installs the
//! redacting log subscriber and dispatches to a subcommand.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod queue;
mod report;
mod run;
mod shutdown;
mod status;
mod tracing_setup;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lifeline_config::LifelineConfig;
use lifeline_resilience::ReportCategory;
use uuid::Uuid;

/// Lifeline - keeps user actions safe while the backend is unreachable.
#[derive(Parser, Debug)]
#[command(name = "lifeline", version, about, long_about = None)]
struct Cli {
    /// Act on behalf of this user (overrides `client.user_id`).
    #[arg(long, global = true)]
    user: Option<String>,

    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Probe the backend and replay queued actions until interrupted.
    Run,
    /// Probe once and print the derived state and queue depth.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Inspect or edit the offline action queue.
    Queue {
        #[command(subcommand)]
        action: QueueCommand,
    },
    /// Build a sanitized support report.
    Report(ReportArgs),
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
    /// List queued actions, oldest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Queue an action for replay.
    Add {
        /// Action kind, used to route the replay.
        kind: String,
        /// JSON payload.
        #[arg(default_value = "{}")]
        payload: String,
    },
    /// Drop a queued action without replaying it.
    Discard { id: Uuid },
}

#[derive(clap::Args, Debug)]
struct ReportArgs {
    /// bug, billing, sync, performance or other.
    #[arg(long, default_value = "bug")]
    category: ReportCategory,
    /// One-line description of the problem.
    #[arg(long)]
    summary: String,
    #[arg(long)]
    steps: Option<String>,
    #[arg(long)]
    expected: Option<String>,
    #[arg(long)]
    actual: Option<String>,
    /// Attach connectivity diagnostics and recent error fingerprints.
    #[arg(long)]
    consent: bool,
    /// Send the report (queued when the backend is unreachable) instead of
    /// only printing it.
    #[arg(long)]
    submit: bool,
}

fn load_config(cli: &Cli) -> Result<LifelineConfig, Vec<lifeline_config::ConfigError>> {
    let mut config = match &cli.config {
        Some(path) => lifeline_config::load_and_validate_path(path)?,
        None => lifeline_config::load_and_validate()?,
    };
    if let Some(user) = &cli.user {
        config.client.user_id = Some(user.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(errors) => {
            lifeline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    tracing_setup::init_tracing(&config);

    let result = match cli.command {
        Commands::Run => run::run(config).await,
        Commands::Status { json, plain } => status::run_status(&config, json, plain).await,
        Commands::Queue { action } => queue::run_queue(&config, action).await,
        Commands::Report(args) => report::run_report(&config, args).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn user_flag_is_global() {
        let cli = Cli::try_parse_from(["lifeline", "queue", "list", "--user", "u-42"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("u-42"));
        assert!(matches!(
            cli.command,
            Commands::Queue {
                action: QueueCommand::List { json: false }
            }
        ));
    }

    #[test]
    fn report_category_parses_snake_case() {
        let cli = Cli::try_parse_from([
            "lifeline", "report", "--category", "performance", "--summary", "slow",
        ])
        .unwrap();
        let Commands::Report(args) = cli.command else {
            panic!("expected report");
        };
        assert_eq!(args.category, ReportCategory::Performance);
        assert!(!args.consent);
    }

    #[test]
    fn discard_requires_a_uuid() {
        assert!(Cli::try_parse_from(["lifeline", "queue", "discard", "nope"]).is_err());
    }

    #[test]
    fn user_flag_overrides_config() {
        let cli = Cli::try_parse_from(["lifeline", "--user", "cli-user", "status"]).unwrap();
        let config = load_config(&cli).expect("default config should be valid");
        assert_eq!(config.client.user_id.as_deref(), Some("cli-user"));
    }
}
