// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! The four-stage classification pipeline: user rules, then header
//! parsers, then learned sender/domain history, then an LLM fallback. Each
//! stage can short-circuit the rest; only the LLM stage leaves the building.

use crate::modules::ai::{self, ClassificationStatus, ClassifyInput, MailAIResult};
use crate::modules::error::MailFabricResult;
use crate::modules::metrics::MAILFABRIC_AI_CLASSIFY_DURATION;
use crate::modules::notification::NotificationService;
use crate::modules::provider::{ClassificationHeaders, ProviderMailMessage};
use crate::modules::realtime::{RealtimeEvent, REALTIME_BUS};
use crate::modules::repository::entities::classify::{ClassificationRulesEntity, KnownDomain, SenderProfile};
use crate::modules::repository::entities::mail::MailEntity;
use crate::modules::repository::entities::notification::NotificationKind;

/// Everything the pipeline needs about one message; assembled by the sync
/// engine from a freshly-saved [`MailEntity`] plus its provider-normalized body.
pub struct ClassificationRequest {
    pub user_id: String,
    pub mail_id: u64,
    pub from_addr: String,
    pub from_name: Option<String>,
    pub to_addrs: Vec<String>,
    pub subject: String,
    pub body: String,
    pub snippet: String,
    pub has_attachment: bool,
    pub is_reply: bool,
    pub headers: ClassificationHeaders,
}

/// Runs the four stages in order and persists whatever verdict they settle
/// on, notifying the user when the result is urgent.
pub async fn classify_and_persist(request: &ClassificationRequest) -> MailFabricResult<MailAIResult> {
    let result = classify(request).await?;

    MailEntity::apply_classification(
        request.mail_id,
        Some(result.category.clone()),
        result.priority,
        result.is_urgent,
    )
    .await?;

    REALTIME_BUS.publish(
        &request.user_id,
        RealtimeEvent::MailClassified {
            mail_id: request.mail_id,
            category: Some(result.category.clone()),
            priority: result.priority,
            is_urgent: result.is_urgent,
        },
    );

    if result.is_urgent {
        NotificationService::notify(
            &request.user_id,
            NotificationKind::MailClassified,
            "Urgent mail",
            format!("\"{}\" was classified as {}", request.subject, result.category),
        )
        .await?;
    }

    Ok(result)
}

/// Runs the stages without persisting; used by callers (batch reclassify,
/// tests) that want the verdict without the side effects of `classify_and_persist`.
pub async fn classify(request: &ClassificationRequest) -> MailFabricResult<MailAIResult> {
    let from_domain = request
        .from_addr
        .rsplit('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();

    if let Some(result) = user_rules_stage(request, &from_domain).await? {
        return Ok(result);
    }

    if let Some(result) = header_stage(request) {
        return Ok(result);
    }

    if let Some(result) = known_sender_stage(request, &from_domain).await? {
        return Ok(result);
    }

    llm_stage(request).await
}

async fn user_rules_stage(
    request: &ClassificationRequest,
    from_domain: &str,
) -> MailFabricResult<Option<MailAIResult>> {
    let _timer = MAILFABRIC_AI_CLASSIFY_DURATION
        .with_label_values(&["user_rules"])
        .start_timer();

    let Some(rules) = ClassificationRulesEntity::get(&request.user_id).await? else {
        return Ok(None);
    };

    if rules.matches_ignore(&request.from_addr, &request.subject, &request.body) {
        return Ok(Some(MailAIResult::new("other".to_owned(), None, 0.1, "user")));
    }

    if rules.matches_important(from_domain, &request.subject, &request.body) {
        return Ok(Some(MailAIResult::new("work".to_owned(), None, 0.85, "user")));
    }

    Ok(None)
}

const BULK_NEWSLETTER_ESP_FLAGS: &[&str] = &["bulk", "campaign", "marketing"];

fn header_stage(request: &ClassificationRequest) -> Option<MailAIResult> {
    let _timer = MAILFABRIC_AI_CLASSIFY_DURATION
        .with_label_values(&["headers"])
        .start_timer();

    let message = ProviderMailMessage {
        external_id: String::new(),
        thread_id: String::new(),
        subject: request.subject.clone(),
        from_addr: request.from_addr.clone(),
        to_addrs: request.to_addrs.clone(),
        cc_addrs: Vec::new(),
        internal_date: 0,
        snippet: request.snippet.clone(),
        labels: Vec::new(),
        headers: request.headers.clone(),
        html_body: None,
        text_body: Some(request.body.clone()),
    };

    if let Some(scored) = registry().classify(&message) {
        let mut result = MailAIResult::new(
            scored.verdict.category,
            scored.verdict.sub_category,
            scored.score,
            "header",
        );
        result.tags = scored.verdict.tags;
        return Some(result);
    }

    let headers = &request.headers;
    let is_bulk = headers.precedence.as_deref() == Some("bulk")
        || headers.list_unsubscribe.is_some()
        || headers
            .esp_flags
            .iter()
            .any(|f| BULK_NEWSLETTER_ESP_FLAGS.contains(&f.as_str()));

    if is_bulk {
        let category = if headers
            .esp_flags
            .iter()
            .any(|f| f == "marketing" || f == "campaign")
        {
            "marketing"
        } else {
            "newsletter"
        };
        return Some(MailAIResult::new(category.to_owned(), None, 0.2, "header"));
    }

    None
}

fn registry() -> &'static crate::modules::rfc::ParserRegistry {
    use std::sync::OnceLock;
    static REGISTRY: OnceLock<crate::modules::rfc::ParserRegistry> = OnceLock::new();
    REGISTRY.get_or_init(crate::modules::rfc::ParserRegistry::new)
}

async fn known_sender_stage(
    request: &ClassificationRequest,
    from_domain: &str,
) -> MailFabricResult<Option<MailAIResult>> {
    let _timer = MAILFABRIC_AI_CLASSIFY_DURATION
        .with_label_values(&["domain"])
        .start_timer();

    if let Some(profile) = SenderProfile::get(&request.user_id, &request.from_addr).await? {
        if let Some(category) = profile.learned_category {
            let priority = profile.learned_priority.unwrap_or(0.5);
            return Ok(Some(MailAIResult::new(category, None, priority, "domain")));
        }
    }

    if let Some(domain) = KnownDomain::get(from_domain).await? {
        return Ok(Some(MailAIResult::new(domain.default_category, None, 0.5, "domain")));
    }

    Ok(None)
}

async fn llm_stage(request: &ClassificationRequest) -> MailFabricResult<MailAIResult> {
    let _timer = MAILFABRIC_AI_CLASSIFY_DURATION
        .with_label_values(&["llm"])
        .start_timer();

    let input = ClassifyInput {
        from: request.from_addr.clone(),
        from_name: request.from_name.clone(),
        to: request.to_addrs.clone(),
        subject: request.subject.clone(),
        body: request.body.clone(),
        snippet: request.snippet.clone(),
        has_attachment: request.has_attachment,
        is_reply: request.is_reply,
    };

    match ai::classify(&input).await {
        Ok(result) => Ok(result),
        Err(_) => {
            let mut result = MailAIResult::other("llm");
            result.status = ClassificationStatus::Failed;
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> ClassificationRequest {
        ClassificationRequest {
            user_id: "user-1".to_owned(),
            mail_id: 1,
            from_addr: "notifications@github.com".to_owned(),
            from_name: Some("GitHub".to_owned()),
            to_addrs: vec!["me@example.com".to_owned()],
            subject: "You have been assigned to an issue".to_owned(),
            body: "short".to_owned(),
            snippet: "short".to_owned(),
            has_attachment: false,
            is_reply: false,
            headers: ClassificationHeaders {
                x_github_reason: Some("assign".to_owned()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn header_stage_matches_github_assignment() {
        let request = base_request();
        let result = header_stage(&request).expect("github parser should match");
        assert_eq!(result.category, "work");
        assert_eq!(result.source, "header");
    }

    #[test]
    fn header_stage_falls_back_to_bulk_heuristic() {
        let mut request = base_request();
        request.from_addr = "news@example.com".to_owned();
        request.headers = ClassificationHeaders {
            precedence: Some("bulk".to_owned()),
            ..Default::default()
        };
        let result = header_stage(&request).expect("bulk heuristic should match");
        assert_eq!(result.category, "newsletter");
        assert_eq!(result.source, "header");
    }

    #[test]
    fn header_stage_returns_none_without_any_signal() {
        let mut request = base_request();
        request.from_addr = "friend@example.com".to_owned();
        request.headers = ClassificationHeaders::default();
        assert!(header_stage(&request).is_none());
    }
}
