// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use super::subject_has;
use crate::modules::provider::ProviderMailMessage;
use crate::modules::rfc::{ParserVerdict, ServiceParser};

/// Slack's own notification email: mentions and DMs outrank digest mail, and
/// Slack sets `Precedence: bulk` on the latter, which this parser reads
/// straight off the normalized headers rather than guessing from wording.
pub struct SlackParser;

impl ServiceParser for SlackParser {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn sender_domains(&self) -> &[&'static str] {
        &["slack.com"]
    }

    fn parse(&self, message: &ProviderMailMessage) -> ParserVerdict {
        let bulk = message.headers.precedence.as_deref() == Some("bulk");
        let direct = subject_has(&message.subject, &["mentioned you", "sent you a message", "direct message"]);

        ParserVerdict {
            category: "social".to_owned(),
            sub_category: Some("slack".to_owned()),
            domain_score: 1.0,
            reason_score: if direct { 0.8 } else if bulk { 0.15 } else { 0.4 },
            relation_score: if direct { 0.75 } else { 0.2 },
            severity_score: 0.0,
            tags: vec!["slack".to_owned()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::rfc::parsers::sample_message;

    #[test]
    fn direct_mention_outranks_bulk_digest() {
        let message = sample_message("Someone mentioned you in #general", "no-reply@slack.com");
        let verdict = SlackParser.parse(&message);
        assert_eq!(verdict.reason_score, 0.8);
        assert_eq!(verdict.relation_score, 0.75);
    }

    #[test]
    fn bulk_precedence_scores_lowest() {
        let mut message = sample_message("Your weekly workspace digest", "no-reply@slack.com");
        message.headers.precedence = Some("bulk".to_owned());
        let verdict = SlackParser.parse(&message);
        assert_eq!(verdict.reason_score, 0.15);
        assert_eq!(verdict.relation_score, 0.2);
    }
}
