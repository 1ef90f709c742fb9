// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support report assembly.
//!
//! Reports are sanitized as they are built, so a payload that ends up in the
//! action queue is already safe to persist.

use chrono::{DateTime, Utc};
use lifeline_core::{BackendHealth, LifelineError, ResilienceState};
use lifeline_security::sanitize_text;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Queue kind used for support reports that could not be submitted.
pub const SUPPORT_REPORT_KIND: &str = "support_report";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportCategory {
    Bug,
    Billing,
    Sync,
    Performance,
    Other,
}

/// What the user typed into the report form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportReportRequest {
    pub category: ReportCategory,
    pub summary: String,
    pub reproduction_steps: Option<String>,
    pub expected_behavior: Option<String>,
    pub actual_behavior: Option<String>,
    /// Whether diagnostics may be attached.
    pub consent_diagnostics: bool,
}

impl SupportReportRequest {
    pub fn new(category: ReportCategory, summary: impl Into<String>) -> Self {
        Self {
            category,
            summary: summary.into(),
            reproduction_steps: None,
            expected_behavior: None,
            actual_behavior: None,
            consent_diagnostics: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityDiagnostics {
    pub is_online: bool,
    pub resilience_state: ResilienceState,
    pub backend_health: BackendHealth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub app_version: String,
    pub platform: String,
    pub route: Option<String>,
    pub auth_state: String,
    pub connectivity: ConnectivityDiagnostics,
    pub queue_depth: usize,
    pub recent_error_fingerprints: Vec<String>,
    pub user_agent: String,
    pub captured_at: DateTime<Utc>,
}

impl Diagnostics {
    fn sanitized(mut self) -> Self {
        self.route = self.route.as_deref().map(sanitize_text);
        self.user_agent = sanitize_text(&self.user_agent);
        self.recent_error_fingerprints = self
            .recent_error_fingerprints
            .iter()
            .map(|f| sanitize_text(f))
            .collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportReportPayload {
    pub correlation_id: Uuid,
    pub category: ReportCategory,
    pub summary: String,
    pub reproduction_steps: Option<String>,
    pub expected_behavior: Option<String>,
    pub actual_behavior: Option<String>,
    pub consent_diagnostics: bool,
    pub diagnostics: Option<Diagnostics>,
}

/// How a report left the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Submitted { correlation_id: Uuid },
    Queued { correlation_id: Uuid, action_id: Uuid },
}

impl ReportOutcome {
    pub fn correlation_id(&self) -> Uuid {
        match self {
            Self::Submitted { correlation_id } | Self::Queued { correlation_id, .. } => {
                *correlation_id
            }
        }
    }
}

fn clean(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(sanitize_text)
}

/// Build a sanitized payload. Diagnostics are dropped unless the user consented.
pub fn build_payload(
    request: &SupportReportRequest,
    diagnostics: Diagnostics,
) -> Result<SupportReportPayload, LifelineError> {
    let summary = request.summary.trim();
    if summary.is_empty() {
        return Err(LifelineError::Validation(
            "support report summary must not be empty".to_string(),
        ));
    }

    Ok(SupportReportPayload {
        correlation_id: Uuid::new_v4(),
        category: request.category,
        summary: sanitize_text(summary),
        reproduction_steps: clean(request.reproduction_steps.as_deref()),
        expected_behavior: clean(request.expected_behavior.as_deref()),
        actual_behavior: clean(request.actual_behavior.as_deref()),
        consent_diagnostics: request.consent_diagnostics,
        diagnostics: request
            .consent_diagnostics
            .then(|| diagnostics.sanitized()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn diagnostics() -> Diagnostics {
        Diagnostics {
            app_version: "1.2.3".into(),
            platform: "linux".into(),
            route: Some("/help?access_token=abc123".into()),
            auth_state: "authenticated".into(),
            connectivity: ConnectivityDiagnostics {
                is_online: true,
                resilience_state: ResilienceState::Degraded,
                backend_health: BackendHealth::Degraded,
            },
            queue_depth: 2,
            recent_error_fingerprints: vec!["Authorization: Bearer topsecret".into()],
            user_agent: "lifeline/0.1".into(),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn empty_summary_is_rejected() {
        let req = SupportReportRequest::new(ReportCategory::Bug, "   ");
        assert!(matches!(
            build_payload(&req, diagnostics()),
            Err(LifelineError::Validation(_))
        ));
    }

    #[test]
    fn diagnostics_dropped_without_consent() {
        let req = SupportReportRequest::new(ReportCategory::Sync, "quests not saving");
        let payload = build_payload(&req, diagnostics()).unwrap();
        assert!(payload.diagnostics.is_none());
        assert!(!payload.consent_diagnostics);
    }

    #[test]
    fn consented_diagnostics_are_sanitized() {
        let mut req = SupportReportRequest::new(ReportCategory::Bug, "crash");
        req.consent_diagnostics = true;
        req.actual_behavior = Some("sent password=hunter2".into());
        req.expected_behavior = Some("  ".into());

        let payload = build_payload(&req, diagnostics()).unwrap();
        let diag = payload.diagnostics.unwrap();
        assert_eq!(diag.route.as_deref(), Some("/help?access_token=[redacted]"));
        assert_eq!(
            diag.recent_error_fingerprints,
            ["Authorization: Bearer [redacted]"]
        );
        assert_eq!(payload.actual_behavior.as_deref(), Some("sent password=[redacted]"));
        assert_eq!(payload.expected_behavior, None);
    }

    #[test]
    fn payload_serializes_camel_case() {
        let mut req = SupportReportRequest::new(ReportCategory::Performance, "slow");
        req.consent_diagnostics = true;
        let json = serde_json::to_value(build_payload(&req, diagnostics()).unwrap()).unwrap();
        assert!(json["correlationId"].is_string());
        assert_eq!(json["category"], "performance");
        assert_eq!(json["diagnostics"]["queueDepth"], 2);
        assert_eq!(json["diagnostics"]["connectivity"]["resilienceState"], "degraded");
    }

    #[test]
    fn category_parses_from_snake_case() {
        assert_eq!(ReportCategory::from_str("billing").unwrap(), ReportCategory::Billing);
        assert!(ReportCategory::from_str("feature").is_err());
    }
}
