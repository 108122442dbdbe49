// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use super::subject_has;
use crate::modules::provider::ProviderMailMessage;
use crate::modules::rfc::{ParserVerdict, ServiceParser};

/// Jira/Atlassian notifications. `X-Jira-Fingerprint` identifies the issue
/// event deterministically; subject keywords fill in for the (common) case
/// where the fingerprint header is stripped by an intermediate relay.
pub struct JiraParser;

impl ServiceParser for JiraParser {
    fn name(&self) -> &'static str {
        "jira"
    }

    fn sender_domains(&self) -> &[&'static str] {
        &["atlassian.net", "atlassian.com"]
    }

    fn can_parse(&self, message: &ProviderMailMessage) -> bool {
        message.headers.x_jira_fingerprint.is_some()
    }

    fn parse(&self, message: &ProviderMailMessage) -> ParserVerdict {
        let blocking = subject_has(&message.subject, &["blocker", "assigned", "due"]);
        ParserVerdict {
            category: "work".to_owned(),
            sub_category: Some("jira".to_owned()),
            domain_score: 1.0,
            reason_score: if blocking { 0.85 } else { 0.45 },
            relation_score: if blocking { 0.75 } else { 0.4 },
            severity_score: if subject_has(&message.subject, &["blocker", "critical"]) {
                0.8
            } else {
                0.1
            },
            tags: vec!["jira".to_owned()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::rfc::parsers::sample_message;

    #[test]
    fn can_parse_requires_the_fingerprint_header() {
        let message = sample_message("Issue update", "jira@atlassian.net");
        assert!(!JiraParser.can_parse(&message));
    }

    #[test]
    fn blocker_subject_raises_reason_relation_and_severity() {
        let message = sample_message("[BLOCKER] FOO-1 is blocking the release", "jira@atlassian.net");
        let verdict = JiraParser.parse(&message);
        assert_eq!(verdict.reason_score, 0.85);
        assert_eq!(verdict.relation_score, 0.75);
        assert_eq!(verdict.severity_score, 0.8);
    }

    #[test]
    fn routine_update_scores_low_across_the_board() {
        let message = sample_message("FOO-2 updated", "jira@atlassian.net");
        let verdict = JiraParser.parse(&message);
        assert_eq!(verdict.reason_score, 0.45);
        assert_eq!(verdict.relation_score, 0.4);
        assert_eq!(verdict.severity_score, 0.1);
    }
}
