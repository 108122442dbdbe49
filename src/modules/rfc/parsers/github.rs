// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use super::subject_has;
use crate::modules::provider::ProviderMailMessage;
use crate::modules::rfc::{ParserVerdict, ServiceParser};

/// GitHub notifications carry `X-GitHub-Reason`, the most reliable relation
/// signal in the registry: `assign`/`review_requested` mean "act now",
/// `subscribed`/`mention` in a thread you merely watch mean "low".
pub struct GitHubParser;

impl ServiceParser for GitHubParser {
    fn name(&self) -> &'static str {
        "github"
    }

    fn sender_domains(&self) -> &[&'static str] {
        &["github.com"]
    }

    fn list_id_suffixes(&self) -> &[&'static str] {
        &[".github.com"]
    }

    fn parse(&self, message: &ProviderMailMessage) -> ParserVerdict {
        let reason = message.headers.x_github_reason.as_deref().unwrap_or("");
        let (reason_score, relation_score) = match reason {
            "assign" | "review_requested" => (0.6, 0.5),
            "author" | "mention" => (0.45, 0.35),
            "comment" | "push" => (0.3, 0.2),
            "subscribed" | "team_mention" | "ci_activity" => (0.15, 0.1),
            _ => {
                if subject_has(&message.subject, &["requested your review", "assigned"]) {
                    (0.55, 0.45)
                } else {
                    (0.25, 0.15)
                }
            }
        };

        ParserVerdict {
            category: "work".to_owned(),
            sub_category: Some("github".to_owned()),
            domain_score: 1.0,
            reason_score,
            relation_score,
            severity_score: 0.0,
            tags: vec!["github".to_owned(), reason.to_owned()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::rfc::parsers::sample_message;
    use crate::modules::rfc::ParserRegistry;

    #[test]
    fn review_requested_scores_high_not_urgent() {
        let mut message = sample_message("Review requested on pull request #42", "notifications@github.com");
        message.headers.x_github_reason = Some("review_requested".to_owned());

        let scored = ParserRegistry::new().classify(&message).expect("github parser should match");
        assert!((scored.score - 0.65).abs() < 1e-6, "score was {}", scored.score);
        assert_eq!(scored.bucket, PriorityBucket::High);
    }

    #[test]
    fn subscribed_scores_lowest() {
        let mut message = sample_message("New activity on a thread you're watching", "notifications@github.com");
        message.headers.x_github_reason = Some("subscribed".to_owned());

        let verdict = GitHubParser.parse(&message);
        assert_eq!(verdict.reason_score, 0.15);
        assert_eq!(verdict.relation_score, 0.1);
    }

    #[test]
    fn subject_fallback_matches_without_header() {
        let message = sample_message("You've been assigned to issue #7", "notifications@github.com");
        let verdict = GitHubParser.parse(&message);
        assert_eq!(verdict.reason_score, 0.55);
        assert_eq!(verdict.relation_score, 0.45);
    }
}
