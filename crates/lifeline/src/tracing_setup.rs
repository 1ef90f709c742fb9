// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log subscriber setup. Everything is written to stderr through a
//! [`RedactingWriter`], so tokens never reach the terminal or log files.

use std::sync::{Arc, RwLock};

use lifeline_config::LifelineConfig;
use lifeline_security::{KnownSecrets, RedactingWriter};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise `lifeline={level},warn`.
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lifeline={log_level},warn")))
}

/// Exact values to strip from log output in addition to the pattern rules.
pub fn known_secrets(config: &LifelineConfig) -> KnownSecrets {
    let known: KnownSecrets = Arc::new(RwLock::new(Vec::new()));
    if let Some(key) = &config.backend.api_key {
        RedactingWriter::<std::io::Stderr>::add_known_secret(&known, key.clone());
    }
    known
}

/// Install the global subscriber.
pub fn init_tracing(config: &LifelineConfig) {
    let known = known_secrets(config);

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.client.log_level))
        .with_target(true)
        .with_thread_names(false)
        .with_writer(move || RedactingWriter::new(std::io::stderr(), known.clone()))
        .try_init();
    if let Err(e) = installed {
        eprintln!("lifeline: log subscriber already installed: {e}");
    }
}
