// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret sanitization and transport security for the Lifeline subsystem.

pub mod sanitize;
pub mod tls;

pub use sanitize::{
    KnownSecrets, REDACTED, RedactingWriter, is_sensitive_key, redact, sanitize_json,
    sanitize_text, truncate,
};
pub use tls::{build_secure_client, build_secure_client_with_headers, is_localhost, validate_url};
