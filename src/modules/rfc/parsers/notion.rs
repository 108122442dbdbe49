// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use super::subject_has;
use crate::modules::provider::ProviderMailMessage;
use crate::modules::rfc::{ParserVerdict, ServiceParser};

/// Notion page/comment notifications. No dedicated header exists, so
/// relation relies entirely on subject phrasing around mentions and
/// assignment.
pub struct NotionParser;

impl ServiceParser for NotionParser {
    fn name(&self) -> &'static str {
        "notion"
    }

    fn sender_domains(&self) -> &[&'static str] {
        &["notion.so"]
    }

    fn parse(&self, message: &ProviderMailMessage) -> ParserVerdict {
        let mentioned = subject_has(&message.subject, &["mentioned you", "commented", "assigned"]);
        ParserVerdict {
            category: "work".to_owned(),
            sub_category: Some("notion".to_owned()),
            domain_score: 1.0,
            reason_score: if mentioned { 0.65 } else { 0.3 },
            relation_score: if mentioned { 0.6 } else { 0.25 },
            severity_score: 0.0,
            tags: vec!["notion".to_owned()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::rfc::parsers::sample_message;

    #[test]
    fn mention_raises_reason_and_relation() {
        let message = sample_message("Someone mentioned you in Project Plan", "team@notion.so");
        let verdict = NotionParser.parse(&message);
        assert_eq!(verdict.reason_score, 0.65);
        assert_eq!(verdict.relation_score, 0.6);
    }

    #[test]
    fn unrelated_subject_scores_low() {
        let message = sample_message("Weekly workspace digest", "team@notion.so");
        let verdict = NotionParser.parse(&message);
        assert_eq!(verdict.reason_score, 0.3);
        assert_eq!(verdict.relation_score, 0.25);
    }
}
