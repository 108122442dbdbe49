// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use super::subject_has;
use crate::modules::provider::ProviderMailMessage;
use crate::modules::rfc::{ParserVerdict, ServiceParser};

/// Stripe billing notifications, scored as `finance` (deployment-weighted
/// blend): a failed payment or disputed charge is far more severe than a
/// routine receipt or payout confirmation.
pub struct StripeParser;

impl ServiceParser for StripeParser {
    fn name(&self) -> &'static str {
        "stripe"
    }

    fn sender_domains(&self) -> &[&'static str] {
        &["stripe.com"]
    }

    fn parse(&self, message: &ProviderMailMessage) -> ParserVerdict {
        let severity_score = if subject_has(&message.subject, &["dispute", "chargeback"]) {
            1.0
        } else if subject_has(&message.subject, &["failed", "declined", "past due"]) {
            0.8
        } else if subject_has(&message.subject, &["payout", "receipt", "invoice paid"]) {
            0.1
        } else {
            0.3
        };

        ParserVerdict {
            category: "finance".to_owned(),
            sub_category: Some("stripe".to_owned()),
            domain_score: 1.0,
            reason_score: 0.0,
            relation_score: 0.0,
            severity_score,
            tags: vec!["stripe".to_owned(), "billing".to_owned()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::rfc::parsers::sample_message;
    use crate::modules::rfc::{ParserRegistry, PriorityBucket};

    #[test]
    fn disputed_charge_is_urgent() {
        let message = sample_message("A charge was disputed", "billing@stripe.com");
        let scored = ParserRegistry::new().classify(&message).expect("stripe parser should match");
        assert_eq!(scored.bucket, PriorityBucket::Urgent);
    }

    #[test]
    fn payout_confirmation_scores_low() {
        let message = sample_message("Your payout has been sent", "billing@stripe.com");
        let verdict = StripeParser.parse(&message);
        assert_eq!(verdict.severity_score, 0.1);
    }
}
