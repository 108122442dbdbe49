// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! The header-stage parser registry: a detection cascade over a fixed
//! set of per-service parsers, each producing a [`ParserVerdict`] that the
//! priority algebra turns into a bucketed urgency.

pub mod parsers;

use crate::modules::provider::ProviderMailMessage;

/// What a service parser reports about a matched message. Scores are in
/// `[0.0, 1.0]`; the registry combines them, parsers never do that math
/// themselves.
#[derive(Clone, Debug, Default)]
pub struct ParserVerdict {
    pub category: String,
    pub sub_category: Option<String>,
    /// How authoritatively the sending domain identifies this service (1.0 = exact known domain).
    pub domain_score: f32,
    /// How strongly the matched reason (mention, review request, assignment...) implies action.
    pub reason_score: f32,
    /// How directly the message concerns the recipient (assigned-to-you > team-wide digest).
    pub relation_score: f32,
    /// The service's own severity signal, if any (incident sev1 > routine notification).
    pub severity_score: f32,
    pub tags: Vec<String>,
}

pub trait ServiceParser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Domains this parser claims outright, checked before `can_parse`.
    fn sender_domains(&self) -> &[&'static str];

    /// `List-Id` suffixes this parser claims, e.g. `.github.com`.
    fn list_id_suffixes(&self) -> &[&'static str] {
        &[]
    }

    /// Fallback predicate consulted only if domain/list-id didn't already match.
    fn can_parse(&self, message: &ProviderMailMessage) -> bool {
        let _ = message;
        false
    }

    fn parse(&self, message: &ProviderMailMessage) -> ParserVerdict;
}

/// Default algebra weights: `0.3*domain + 0.5*reason + 0.1*relation + 0.1*severity`.
const DEFAULT_WEIGHTS: (f32, f32, f32, f32) = (0.3, 0.5, 0.1, 0.1);

/// Deployment/finance parsers skip relation/reason in favor of a two-term
/// domain/severity blend, then apply an urgency multiplier.
const DEPLOYMENT_WEIGHTS: (f32, f32) = (0.3, 0.7);
const URGENCY_MULTIPLIER: f32 = 1.3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PriorityBucket {
    Urgent,
    High,
    Normal,
    Low,
    Lowest,
}

impl PriorityBucket {
    fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            PriorityBucket::Urgent
        } else if score >= 0.6 {
            PriorityBucket::High
        } else if score >= 0.4 {
            PriorityBucket::Normal
        } else if score >= 0.2 {
            PriorityBucket::Low
        } else {
            PriorityBucket::Lowest
        }
    }

    pub fn as_priority(self) -> f32 {
        match self {
            PriorityBucket::Urgent => 0.9,
            PriorityBucket::High => 0.7,
            PriorityBucket::Normal => 0.5,
            PriorityBucket::Low => 0.3,
            PriorityBucket::Lowest => 0.1,
        }
    }
}

const DEPLOYMENT_CATEGORIES: &[&str] = &["deployment", "ci", "finance"];

pub struct ScoredVerdict {
    pub verdict: ParserVerdict,
    pub parser: &'static str,
    pub score: f32,
    pub bucket: PriorityBucket,
}

pub struct ParserRegistry {
    parsers: Vec<Box<dyn ServiceParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: parsers::all(),
        }
    }

    /// Runs the detection cascade (service header unused here -- providers
    /// don't surface a dedicated one -- so this goes sender domain, then
    /// `List-Id` suffix, then each parser's own predicate) and scores the
    /// first match found.
    pub fn classify(&self, message: &ProviderMailMessage) -> Option<ScoredVerdict> {
        let from_domain = message
            .from_addr
            .rsplit('@')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        let list_id = message.headers.list_id.as_deref().unwrap_or_default();

        let matched = self
            .parsers
            .iter()
            .find(|p| p.sender_domains().iter().any(|d| from_domain.ends_with(d)))
            .or_else(|| {
                self.parsers
                    .iter()
                    .find(|p| p.list_id_suffixes().iter().any(|s| list_id.ends_with(s)))
            })
            .or_else(|| self.parsers.iter().find(|p| p.can_parse(message)))?;

        let verdict = matched.parse(message);
        let score = self.score(&verdict);
        Some(ScoredVerdict {
            bucket: PriorityBucket::from_score(score),
            score,
            parser: matched.name(),
            verdict,
        })
    }

    fn score(&self, verdict: &ParserVerdict) -> f32 {
        if DEPLOYMENT_CATEGORIES.contains(&verdict.category.as_str()) {
            let (w_d, w_s) = DEPLOYMENT_WEIGHTS;
            let base = w_d * verdict.domain_score + w_s * verdict.severity_score;
            (base * URGENCY_MULTIPLIER).min(1.0)
        } else {
            let (w_d, w_r, w_rel, w_s) = DEFAULT_WEIGHTS;
            (w_d * verdict.domain_score
                + w_r * verdict.reason_score
                + w_rel * verdict.relation_score
                + w_s * verdict.severity_score)
                .min(1.0)
        }
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(domain: f32, reason: f32, relation: f32, severity: f32) -> ParserVerdict {
        ParserVerdict {
            category: "work".to_owned(),
            sub_category: None,
            domain_score: domain,
            reason_score: reason,
            relation_score: relation,
            severity_score: severity,
            tags: Vec::new(),
        }
    }

    #[test]
    fn bucket_cutoffs_are_inclusive_at_the_low_end() {
        assert_eq!(PriorityBucket::from_score(0.8), PriorityBucket::Urgent);
        assert_eq!(PriorityBucket::from_score(0.79), PriorityBucket::High);
        assert_eq!(PriorityBucket::from_score(0.6), PriorityBucket::High);
        assert_eq!(PriorityBucket::from_score(0.4), PriorityBucket::Normal);
        assert_eq!(PriorityBucket::from_score(0.2), PriorityBucket::Low);
        assert_eq!(PriorityBucket::from_score(0.19), PriorityBucket::Lowest);
    }

    #[test]
    fn default_weights_combine_all_four_terms() {
        let registry = ParserRegistry::new();
        let v = verdict(1.0, 1.0, 1.0, 1.0);
        assert_eq!(registry.score(&v), 1.0);

        let v = verdict(0.5, 0.4, 0.3, 0.2);
        let expected = 0.3 * 0.5 + 0.5 * 0.4 + 0.1 * 0.3 + 0.1 * 0.2;
        assert!((registry.score(&v) - expected).abs() < 1e-6);
    }

    #[test]
    fn deployment_category_ignores_reason_and_relation() {
        let registry = ParserRegistry::new();
        let mut v = verdict(1.0, 1.0, 1.0, 0.0);
        v.category = "deployment".to_owned();
        let expected = (0.3 * 1.0 + 0.7 * 0.0_f32) * URGENCY_MULTIPLIER;
        assert!((registry.score(&v) - expected).abs() < 1e-6);
    }

    #[test]
    fn deployment_urgency_multiplier_is_capped_at_one() {
        let registry = ParserRegistry::new();
        let mut v = verdict(1.0, 0.0, 0.0, 1.0);
        v.category = "finance".to_owned();
        assert_eq!(registry.score(&v), 1.0);
    }
}
