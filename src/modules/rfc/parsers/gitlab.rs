// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use super::subject_has;
use crate::modules::provider::ProviderMailMessage;
use crate::modules::rfc::{ParserVerdict, ServiceParser};

/// GitLab carries `X-GitLab-Project-Path` for every notification; its
/// presence alone is a stronger signal than subject text, so it raises the
/// reason score independent of wording.
pub struct GitLabParser;

impl ServiceParser for GitLabParser {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    fn sender_domains(&self) -> &[&'static str] {
        &["gitlab.com"]
    }

    fn list_id_suffixes(&self) -> &[&'static str] {
        &[".gitlab.com"]
    }

    fn parse(&self, message: &ProviderMailMessage) -> ParserVerdict {
        let has_project_header = message.headers.x_gitlab_project_path.is_some();
        let assigned_or_review = subject_has(
            &message.subject,
            &["assigned you", "requested review", "merge request"],
        );

        let reason_score = match (has_project_header, assigned_or_review) {
            (true, true) => 0.9,
            (true, false) => 0.55,
            (false, true) => 0.7,
            (false, false) => 0.35,
        };

        ParserVerdict {
            category: "work".to_owned(),
            sub_category: Some("gitlab".to_owned()),
            domain_score: 1.0,
            reason_score,
            relation_score: if assigned_or_review { 0.8 } else { 0.4 },
            severity_score: 0.0,
            tags: vec!["gitlab".to_owned()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::rfc::parsers::sample_message;

    #[test]
    fn project_header_and_assignment_stack_to_the_top_reason_score() {
        let mut message = sample_message("You have been assigned you to MR !12", "noreply@gitlab.com");
        message.headers.x_gitlab_project_path = Some("group/project".to_owned());
        let verdict = GitLabParser.parse(&message);
        assert_eq!(verdict.reason_score, 0.9);
        assert_eq!(verdict.relation_score, 0.8);
    }

    #[test]
    fn project_header_alone_scores_lower_than_with_assignment() {
        let mut message = sample_message("Pipeline summary", "noreply@gitlab.com");
        message.headers.x_gitlab_project_path = Some("group/project".to_owned());
        let verdict = GitLabParser.parse(&message);
        assert_eq!(verdict.reason_score, 0.55);
        assert_eq!(verdict.relation_score, 0.4);
    }

    #[test]
    fn neither_signal_scores_lowest() {
        let message = sample_message("Weekly digest", "noreply@gitlab.com");
        let verdict = GitLabParser.parse(&message);
        assert_eq!(verdict.reason_score, 0.35);
        assert_eq!(verdict.relation_score, 0.4);
    }
}
