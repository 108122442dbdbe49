// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use super::subject_has;
use crate::modules::provider::ProviderMailMessage;
use crate::modules::rfc::{ParserVerdict, ServiceParser};

/// Datadog monitor/incident alerts, scored as `deployment` so the registry's
/// severity-weighted blend applies: a recovered alert and a triggered sev1
/// must land in very different buckets even though both come from the same
/// domain.
pub struct DatadogParser;

impl ServiceParser for DatadogParser {
    fn name(&self) -> &'static str {
        "datadog"
    }

    fn sender_domains(&self) -> &[&'static str] {
        &["datadoghq.com"]
    }

    fn parse(&self, message: &ProviderMailMessage) -> ParserVerdict {
        let triggered = subject_has(&message.subject, &["triggered", "alert"]);
        let recovered = subject_has(&message.subject, &["recovered", "resolved"]);
        let severity_score = if subject_has(&message.subject, &["[p1]", "[sev1]", "critical"]) {
            1.0
        } else if triggered {
            0.7
        } else if recovered {
            0.1
        } else {
            0.3
        };

        ParserVerdict {
            category: "deployment".to_owned(),
            sub_category: Some("datadog".to_owned()),
            domain_score: 1.0,
            reason_score: 0.0,
            relation_score: 0.0,
            severity_score,
            tags: vec!["datadog".to_owned(), "monitoring".to_owned()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::rfc::parsers::sample_message;
    use crate::modules::rfc::{ParserRegistry, PriorityBucket};

    #[test]
    fn sev1_triggered_alert_is_urgent() {
        let message = sample_message("[SEV1] CPU usage triggered on web-01", "alerts@datadoghq.com");
        let scored = ParserRegistry::new().classify(&message).expect("datadog parser should match");
        assert_eq!(scored.bucket, PriorityBucket::Urgent);
    }

    #[test]
    fn recovered_alert_scores_low() {
        let message = sample_message("[Recovered] CPU usage on web-01", "alerts@datadoghq.com");
        let verdict = DatadogParser.parse(&message);
        assert_eq!(verdict.severity_score, 0.1);
    }
}
