// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret sanitization for diagnostics, support reports and log output.
//!
//! Two complementary mechanisms:
//! 1. **Pattern-based**: known secret shapes (bearer tokens, JWTs, API keys,
//!    token query parameters, `password=...` pairs).
//! 2. **Exact-match**: values known at runtime, such as the configured API key.
//!
//! Matches are always replaced whole by [`REDACTED`]; nothing is partially masked.

use std::io::Write;
use std::sync::{Arc, LazyLock, RwLock};

use regex::Regex;
use serde_json::Value;

/// The redaction marker.
pub const REDACTED: &str = "[redacted]";

/// Query parameters whose value is a credential.
static QUERY_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([?&#](?:access_token|refresh_token|id_token|auth_token|token|apikey|api_key|key|code|password|secret|signature)=)[^&#\s]*",
    )
    .unwrap()
});

static BEARER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bBearer\s+[A-Za-z0-9._~+/=\-]+").unwrap());

/// Secret shapes replaced whole, in order.
static TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // JWT: base64url header starting with `{"`, payload, optional signature
        Regex::new(r"\beyJ[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]*").unwrap(),
        // Other three-part dotted tokens
        Regex::new(r"\b[A-Za-z0-9_\-]{16,}\.[A-Za-z0-9_\-]{16,}\.[A-Za-z0-9_\-]{16,}").unwrap(),
        // sk-... style keys (OpenAI, Anthropic), wherever they start. Words
        // such as `task-list` lose their tail too.
        Regex::new(r"sk-[A-Za-z0-9_\-]+").unwrap(),
        // Stripe-style keys
        Regex::new(r"\b(?:sk|pk|rk)_(?:live|test)_[A-Za-z0-9]{8,}").unwrap(),
        // Google API keys
        Regex::new(r"\bAIza[0-9A-Za-z_\-]{20,}").unwrap(),
        // GitHub tokens
        Regex::new(r"\bgh[pousr]_[A-Za-z0-9]{20,}").unwrap(),
        // Slack tokens
        Regex::new(r"\bxox[abprs]-[A-Za-z0-9\-]{10,}").unwrap(),
    ]
});

/// `password=hunter2`, `"secret": "x"`, `session_id: abc` and friends.
static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b((?:password|passwd|secret|client_secret|api[_\-]?key|access[_\-]?token|refresh[_\-]?token|token|session(?:[_\-]?id)?|cookie|jwt)"?\s*[:=]\s*"?)([^\s,;&"'\[\]{}]+)"#,
    )
    .unwrap()
});

/// Object keys whose entire value is replaced in structured payloads.
static SENSITIVE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)token|authorization|cookie|password|secret|session|jwt").unwrap()
});

/// Redact secret-shaped substrings from free text.
pub fn sanitize_text(input: &str) -> String {
    let mut result = QUERY_PARAM
        .replace_all(input, format!("${{1}}{REDACTED}").as_str())
        .into_owned();
    result = BEARER
        .replace_all(&result, format!("Bearer {REDACTED}").as_str())
        .into_owned();
    for pattern in TOKEN_PATTERNS.iter() {
        result = pattern.replace_all(&result, REDACTED).into_owned();
    }
    KEY_VALUE
        .replace_all(&result, format!("${{1}}{REDACTED}").as_str())
        .into_owned()
}

/// Redact pattern-shaped secrets and any of the exact `known` values.
pub fn redact(input: &str, known: &[String]) -> String {
    let mut result = sanitize_text(input);

    // Longest first so a value never leaves a partial suffix behind.
    let mut sorted: Vec<&String> = known.iter().filter(|v| !v.is_empty()).collect();
    sorted.sort_by_key(|v| std::cmp::Reverse(v.len()));
    for value in sorted {
        result = result.replace(value.as_str(), REDACTED);
    }

    result
}

/// Whether an object key names a credential-bearing field.
pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEY.is_match(key)
}

/// Recursively sanitize a JSON value.
///
/// Values under sensitive keys are replaced entirely; every other string is
/// passed through [`sanitize_text`].
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_text(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_json).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if is_sensitive_key(k) {
                        Value::String(REDACTED.to_string())
                    } else {
                        sanitize_json(v)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}

/// Shared list of exact values to redact, updatable at runtime.
pub type KnownSecrets = Arc<RwLock<Vec<String>>>;

/// A writer wrapper that sanitizes everything written through it.
pub struct RedactingWriter<W> {
    inner: W,
    known: KnownSecrets,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(inner: W, known: KnownSecrets) -> Self {
        Self { inner, known }
    }

    /// Add a value to the exact-match list, ignoring empties and duplicates.
    pub fn add_known_secret(known: &KnownSecrets, value: String) {
        if value.is_empty() {
            return;
        }
        if let Ok(mut values) = known.write() {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let input = String::from_utf8_lossy(buf);
        let known = self.known.read().map(|v| v.clone()).unwrap_or_default();
        let redacted = redact(&input, &known);
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
