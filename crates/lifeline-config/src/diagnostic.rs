// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment and validation failures into miette diagnostics.
//!
//! Unknown keys get a "did you mean" hint (Jaro-Winkler over the keys the
//! section accepts) and, when the offending file is known, a labelled span.
//! Validation failures name the dotted key and the environment variable that
//! overrides it.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// One problem found while loading `lifeline.toml` and its overrides.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key (or a whole section) that no config struct accepts.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(lifeline::config::unknown_key),
        help("{}", format_unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Closest accepted key, when one is similar enough.
        suggestion: Option<String>,
        /// Comma-separated keys accepted at this level.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not deserialize into the field's type, e.g. a
    /// string for `queue.max_entries`.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(lifeline::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path, `section.field`.
        key: String,
        detail: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(lifeline::config::missing_key),
        help("add `{key} = <value>` to your lifeline.toml")
    )]
    MissingKey { key: String },

    /// A well-typed value that breaks a semantic rule (zero intervals,
    /// plain HTTP with TLS required, ...).
    #[error("invalid `{key}`: {message}")]
    #[diagnostic(
        code(lifeline::config::validation),
        help("fix `{key}` in lifeline.toml or override it with {}", env_override(key))
    )]
    Validation { key: String, message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(lifeline::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(key: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

fn format_unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Environment variable that overrides a dotted key:
/// `queue.max_entries` is `LIFELINE_QUEUE_MAX_ENTRIES`.
pub fn env_override(key: &str) -> String {
    format!("LIFELINE_{}", key.replace('.', "_").to_ascii_uppercase())
}

/// Convert a `figment::Error` into a list of `ConfigError` diagnostics.
///
/// A single figment error may carry several underlying errors; each one
/// becomes its own diagnostic.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let valid_keys: Vec<&str> = expected.to_vec();
                    let (span, src) = find_source_span(&error, &path, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, &valid_keys),
                        valid_keys: valid_keys.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.clone().into_owned(),
                },
                Kind::InvalidType(actual, expected) => {
                    // The path ends with the field itself.
                    let (span, src) = match path.split_last() {
                        Some((field, section)) => {
                            find_source_span(&error, section, field, toml_sources)
                        }
                        None => (None, None),
                    };
                    ConfigError::InvalidType {
                        key: path.join("."),
                        detail: format!("found {actual}, expected {expected}"),
                        expected: expected.to_string(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn find_source_span(
    error: &figment::error::Error,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let source_path = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline sources carry no file metadata; fall back to the only source.
    let source = match source_path {
        Some(path) => toml_sources.iter().find(|(p, _)| *p == path),
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    };

    let Some((path, content)) = source else {
        return (None, None);
    };
    match find_key_offset(content, section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Find the byte offset of a key in TOML content, relative to a section path.
///
/// For `path = ["probe"]` and `field = "intervl_secs"`, finds the `[probe]`
/// header then searches for the key after it.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header).map(|pos| pos + header.len())?
        }
    };

    let remaining = &content[search_start..];

    let mut byte_offset = 0;
    for line in remaining.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(after) = trimmed.strip_prefix(field) {
            if after.starts_with([' ', '=', '\t']) {
                let field_start_in_line = line.len() - trimmed.len();
                return Some(search_start + byte_offset + field_start_in_line);
            }
        }
        byte_offset += line.len();
    }

    None
}

/// Suggest a similar key name using Jaro-Winkler string similarity.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    let mut best_score = SUGGESTION_THRESHOLD;
    let mut best_match = None;

    for &key in valid_keys {
        let score = strsim::jaro_winkler(unknown, key);
        if score > best_score {
            best_score = score;
            best_match = Some(key.to_string());
        }
    }

    best_match
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_probe_key() {
        let valid = &["interval_secs", "timeout_secs", "outage_threshold"];
        assert_eq!(
            suggest_key("intervl_secs", valid),
            Some("interval_secs".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["max_entries", "eviction_min_age_secs", "ttl_secs"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn find_key_offset_in_section() {
        let content = "[client]\nplatform = \"x\"\n\n[queue]\nmax_entrys = 3\n";
        let path = vec!["queue".to_string()];
        let o = find_key_offset(content, &path, "max_entrys").unwrap();
        assert_eq!(&content[o..o + 10], "max_entrys");
    }

    #[test]
    fn env_override_names_the_variable() {
        assert_eq!(env_override("queue.max_entries"), "LIFELINE_QUEUE_MAX_ENTRIES");
        assert_eq!(env_override("probe.interval_secs"), "LIFELINE_PROBE_INTERVAL_SECS");
    }

    #[test]
    fn validation_message_names_key_and_override() {
        let err = ConfigError::validation("replay.backoff_factor", "must be >= 1.0");
        assert_eq!(err.to_string(), "invalid `replay.backoff_factor`: must be >= 1.0");
        let help = Diagnostic::help(&err).map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("LIFELINE_REPLAY_BACKOFF_FACTOR"), "{help}");
    }

    #[test]
    fn find_key_offset_ignores_prefix_matches() {
        let content = "[queue]\nmax_entries_x = 1\nmax_entries = 2\n";
        let path = vec!["queue".to_string()];
        let o = find_key_offset(content, &path, "max_entries").unwrap();
        assert!(content[o..].starts_with("max_entries = 2"));
    }
}
