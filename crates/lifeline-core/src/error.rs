// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Lifeline resilience subsystem.

use thiserror::Error;
use uuid::Uuid;

/// The primary error type used across all Lifeline traits and core operations.
#[derive(Debug, Error)]
pub enum LifelineError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Queue persistence errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Health probe errors (timeout, DNS failure, TLS error, unexpected status).
    #[error("probe error: {message}")]
    Probe {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A replay executor rejected or failed to deliver a queued action.
    #[error("replay error: {message}")]
    Replay {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No executor is registered for a queued action kind.
    #[error("no executor registered for action kind `{kind}`")]
    NoExecutor { kind: String },

    /// The referenced queued action does not exist.
    #[error("queued action not found: {id}")]
    ActionNotFound { id: Uuid },

    /// Caller-supplied input failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transport security policy violations.
    #[error("security error: {0}")]
    Security(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LifelineError {
    /// Wraps any displayable storage failure.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        LifelineError::Storage {
            source: err.to_string().into(),
        }
    }

    /// Builds a replay failure without an underlying source.
    pub fn replay(message: impl Into<String>) -> Self {
        LifelineError::Replay {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a probe failure without an underlying source.
    pub fn probe(message: impl Into<String>) -> Self {
        LifelineError::Probe {
            message: message.into(),
            source: None,
        }
    }
}
