// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lifeline queue` subcommands.

use lifeline_config::LifelineConfig;
use lifeline_core::{LifelineError, QueuedAction};

use crate::QueueCommand;
use crate::app;

pub async fn run_queue(
    config: &LifelineConfig,
    command: QueueCommand,
) -> Result<(), LifelineError> {
    let core = app::build_core(config).await?;
    let result = match command {
        QueueCommand::List { json } => {
            let actions = core.list_actions().await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&actions).unwrap_or_else(|_| "[]".to_string())
                );
            } else {
                print_actions(&actions);
            }
            Ok(())
        }
        QueueCommand::Add { kind, payload } => {
            let payload = parse_payload(&payload)?;
            let action = core.queue_action(&kind, payload).await?;
            println!("queued {} ({})", action.id, action.kind);
            Ok(())
        }
        QueueCommand::Discard { id } => {
            let action = core.discard_action(id).await?;
            println!("discarded {} ({})", action.id, action.kind);
            Ok(())
        }
    };
    core.shutdown().await?;
    result
}

fn parse_payload(raw: &str) -> Result<serde_json::Value, LifelineError> {
    serde_json::from_str(raw)
        .map_err(|e| LifelineError::Validation(format!("payload is not valid JSON: {e}")))
}

fn format_row(action: &QueuedAction) -> String {
    let error = action.last_error.as_deref().unwrap_or("-");
    format!(
        "{}  {}  {:<20}  attempts={}  last_error={}",
        action.id,
        action.created_at.format("%Y-%m-%d %H:%M:%S"),
        action.kind,
        action.attempt_count,
        error
    )
}

fn print_actions(actions: &[QueuedAction]) {
    if actions.is_empty() {
        println!("queue is empty");
        return;
    }
    for action in actions {
        println!("{}", format_row(action));
    }
    println!("{} action(s) queued", actions.len());
}
