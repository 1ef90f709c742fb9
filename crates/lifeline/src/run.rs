// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lifeline run`: probe and replay in the background until a shutdown
//! signal arrives, printing every state change.

use std::io::IsTerminal;

use lifeline_bus::ResilienceEvent;
use lifeline_config::LifelineConfig;
use lifeline_core::{LifelineError, ResilienceState};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::app;
use crate::shutdown;

pub async fn run(config: LifelineConfig) -> Result<(), LifelineError> {
    let core = app::build_core(&config).await?;
    let use_color = std::io::stdout().is_terminal();

    let token = core.cancellation_token();
    shutdown::install_signal_handler(token.clone());

    let mut events = core.subscribe();
    core.start();
    print_state(core.state(), core.queue_count(), use_color);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            received = events.recv() => match received {
                Ok(envelope) => {
                    if let ResilienceEvent::StateChanged { to, queue_count, .. } = envelope.event {
                        print_state(to, queue_count, use_color);
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "event subscriber lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("stopping");
    core.shutdown().await
}

/// One-line, banner-style description of a state.
pub fn describe(state: ResilienceState, queue_count: usize) -> String {
    match state {
        ResilienceState::Healthy => "all systems normal".to_string(),
        ResilienceState::Offline => {
            format!("offline: changes are saved on this device ({queue_count} queued)")
        }
        ResilienceState::Degraded => "backend is slow or failing intermittently".to_string(),
        ResilienceState::Outage => {
            format!("backend unreachable: changes will sync later ({queue_count} queued)")
        }
        ResilienceState::Recovering => format!("syncing {queue_count} queued change(s)"),
        ResilienceState::Recovered => "back online, everything is synced".to_string(),
    }
}

fn print_state(state: ResilienceState, queue_count: usize, use_color: bool) {
    let text = describe(state, queue_count);
    if use_color {
        use colored::Colorize;
        let label = state.to_string();
        let label = match state {
            ResilienceState::Healthy | ResilienceState::Recovered => label.green(),
            ResilienceState::Degraded | ResilienceState::Recovering => label.yellow(),
            ResilienceState::Offline | ResilienceState::Outage => label.red(),
        };
        println!("[{label}] {text}");
    } else {
        println!("[{state}] {text}");
    }
}
