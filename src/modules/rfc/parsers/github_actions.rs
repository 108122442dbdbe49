// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use super::subject_has;
use crate::modules::provider::ProviderMailMessage;
use crate::modules::rfc::{ParserVerdict, ServiceParser};

/// CI notification mail from GitHub Actions. Distinguished from regular
/// GitHub notifications by the `ci_activity` reason and "Run failed"-style
/// subjects, and scored as `deployment`/`ci` so the registry applies the
/// two-term domain/severity blend instead of the relation-weighted default.
pub struct GitHubActionsParser;

impl ServiceParser for GitHubActionsParser {
    fn name(&self) -> &'static str {
        "github_actions"
    }

    fn sender_domains(&self) -> &[&'static str] {
        &["notifications.github.com"]
    }

    fn can_parse(&self, message: &ProviderMailMessage) -> bool {
        message.headers.x_github_reason.as_deref() == Some("ci_activity")
            || subject_has(&message.subject, &["workflow run", "run failed", "run succeeded"])
    }

    fn parse(&self, message: &ProviderMailMessage) -> ParserVerdict {
        let failed = subject_has(&message.subject, &["failed", "failure"]);
        ParserVerdict {
            category: "ci".to_owned(),
            sub_category: Some("github_actions".to_owned()),
            domain_score: 1.0,
            reason_score: if failed { 0.9 } else { 0.3 },
            relation_score: 0.5,
            severity_score: if failed { 0.9 } else { 0.2 },
            tags: vec!["github".to_owned(), "ci".to_owned()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::rfc::parsers::sample_message;
    use crate::modules::rfc::ParserRegistry;

    #[test]
    fn can_parse_matches_ci_activity_reason_without_subject_keywords() {
        let mut message = sample_message("Your build", "ci@example-runner.io");
        message.headers.x_github_reason = Some("ci_activity".to_owned());
        assert!(GitHubActionsParser.can_parse(&message));
    }

    #[test]
    fn failed_run_scores_high_via_deployment_blend() {
        let message = sample_message("Run failed: deploy-prod", "ci@example-runner.io");
        let scored = ParserRegistry::new()
            .classify(&message)
            .expect("github actions parser should match");
        assert_eq!(scored.bucket, PriorityBucket::Urgent);
    }

    #[test]
    fn successful_run_scores_lower_than_a_failed_one() {
        let message = sample_message("Run succeeded: deploy-prod", "ci@example-runner.io");
        let scored = ParserRegistry::new()
            .classify(&message)
            .expect("github actions parser should match");
        assert_eq!(scored.bucket, PriorityBucket::Normal);
    }
}
