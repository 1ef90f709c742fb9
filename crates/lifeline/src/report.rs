// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lifeline report`: build, and optionally send, a support report.

use lifeline_config::LifelineConfig;
use lifeline_core::LifelineError;
use lifeline_resilience::{ReportOutcome, SupportReportRequest};

use crate::ReportArgs;
use crate::app;

fn request_from_args(args: ReportArgs) -> SupportReportRequest {
    SupportReportRequest {
        category: args.category,
        summary: args.summary,
        reproduction_steps: args.steps,
        expected_behavior: args.expected,
        actual_behavior: args.actual,
        consent_diagnostics: args.consent,
    }
}

fn describe_outcome(outcome: &ReportOutcome) -> String {
    match outcome {
        ReportOutcome::Submitted { correlation_id } => {
            format!("report submitted (reference {correlation_id})")
        }
        ReportOutcome::Queued {
            correlation_id,
            action_id,
        } => format!(
            "backend unreachable, report queued as {action_id} (reference {correlation_id})"
        ),
    }
}

pub async fn run_report(config: &LifelineConfig, args: ReportArgs) -> Result<(), LifelineError> {
    let submit = args.submit;
    let request = request_from_args(args);
    let core = app::build_core(config).await?;

    let result = if submit {
        core.run_probe().await;
        core.report_issue(&request)
            .await
            .map(|outcome| println!("{}", describe_outcome(&outcome)))
    } else {
        core.build_support_report(&request).and_then(|payload| {
            let text = serde_json::to_string_pretty(&payload)
                .map_err(|e| LifelineError::Internal(e.to_string()))?;
            println!("{text}");
            Ok(())
        })
    };

    core.shutdown().await?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeline_resilience::ReportCategory;
    use uuid::Uuid;

    fn args() -> ReportArgs {
        ReportArgs {
            category: ReportCategory::Sync,
            summary: "habits not syncing".into(),
            steps: Some("tick a habit offline".into()),
            expected: None,
            actual: None,
            consent: true,
            submit: false,
        }
    }

    #[test]
    fn args_map_onto_the_request() {
        let request = request_from_args(args());
        assert_eq!(request.category, ReportCategory::Sync);
        assert_eq!(request.summary, "habits not syncing");
        assert_eq!(request.reproduction_steps.as_deref(), Some("tick a habit offline"));
        assert!(request.consent_diagnostics);
    }

    #[test]
    fn queued_outcome_names_both_ids() {
        let correlation_id = Uuid::new_v4();
        let action_id = Uuid::new_v4();
        let text = describe_outcome(&ReportOutcome::Queued {
            correlation_id,
            action_id,
        });
        assert!(text.contains(&correlation_id.to_string()));
        assert!(text.contains(&action_id.to_string()));
    }
}
