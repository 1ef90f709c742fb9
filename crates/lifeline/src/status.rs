// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lifeline status` command implementation.
//!
//! Probes the backend once, derives the state and prints it with the
//! queue depth. `--json` prints the full snapshot for scripting.

use std::io::IsTerminal;

use lifeline_config::LifelineConfig;
use lifeline_core::{LifelineError, ResilienceState};
use lifeline_resilience::ResilienceSnapshot;
use serde::Serialize;

use crate::app;
use crate::run::describe;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub user_id: String,
    pub base_url: String,
    #[serde(flatten)]
    pub snapshot: ResilienceSnapshot,
}

pub async fn run_status(
    config: &LifelineConfig,
    json: bool,
    plain: bool,
) -> Result<(), LifelineError> {
    let core = app::build_core(config).await?;
    core.run_probe().await;
    let snapshot = core.snapshot();
    let user_id = core.user_id().to_string();
    core.shutdown().await?;

    if json {
        let resp = StatusResponse {
            user_id,
            base_url: config.backend.base_url.clone(),
            snapshot,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&resp).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&config.backend.base_url, &snapshot, use_color);
    }
    Ok(())
}

fn marker(state: ResilienceState, use_color: bool) -> String {
    let ok = matches!(state, ResilienceState::Healthy | ResilienceState::Recovered);
    let blocked = state.blocks_replay();
    if use_color {
        use colored::Colorize;
        if ok {
            "✓".green().to_string()
        } else if blocked {
            "✗".red().to_string()
        } else {
            "!".yellow().to_string()
        }
    } else if ok {
        "[OK]".to_string()
    } else if blocked {
        "[FAIL]".to_string()
    } else {
        "[WARN]".to_string()
    }
}

fn print_status(base_url: &str, snapshot: &ResilienceSnapshot, use_color: bool) {
    println!();
    println!("  lifeline status");
    println!("  {}", "-".repeat(35));
    println!(
        "    State:    {} {} ({})",
        marker(snapshot.state, use_color),
        snapshot.state,
        describe(snapshot.state, snapshot.queue_count)
    );
    println!("    Backend:  {} ({})", base_url, snapshot.backend_health);
    println!("    Queue:    {} action(s)", snapshot.queue_count);
    if let Some(err) = &snapshot.last_sync_error {
        println!("    Last sync error: {err}");
    }
    println!();
}
