// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! The AI Orchestrator: every LLM call in the system -- classification
//! fallback, summarization, translation, chat and reply drafting -- goes
//! through here so caching, concurrency limiting and the 120s timeout are
//! enforced in one place instead of once per call site.

pub mod cache;
pub mod client;

use crate::modules::error::MailFabricResult;
use crate::modules::metrics::MAILFABRIC_AI_CACHE_HIT_TOTAL;
use crate::modules::scheduler::retry::RetryPolicy;
use crate::modules::scheduler::task::{Task, TaskFuture};
use crate::modules::settings::cli::SETTINGS;
use client::LLM_CLIENT;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tokio::sync::Semaphore;
use tracing::warn;

/// The job-queue family `AIClassifyJob` runs on.
pub const AI_CLASSIFY_QUEUE: &str = "ai.classify";

/// The job-queue family `AIClassifyBatchJob` runs on: one job per sync page
/// instead of one per message, so a 200-message backfill page doesn't spawn
/// 200 separate scheduler entries.
pub const AI_CLASSIFY_BATCH_QUEUE: &str = "ai.classify.batch";

/// Messages shorter than this skip summarization entirely.
const SHORT_MAIL_CHARS: usize = 200;

static AI_SEMAPHORE: LazyLock<Arc<Semaphore>> =
    LazyLock::new(|| Arc::new(Semaphore::new(SETTINGS.ai_concurrency)));

/// What the LLM fallback stage is asked to classify.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassifyInput {
    pub from: String,
    pub from_name: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub snippet: String,
    pub has_attachment: bool,
    pub is_reply: bool,
}

/// The pipeline's terminal output for one message, persisted onto `MailEntity`
/// and surfaced to clients. `is_urgent` and `priority >= 0.80` must agree;
/// [`MailAIResult::new`] is the only constructor and enforces it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailAIResult {
    pub status: ClassificationStatus,
    pub category: String,
    pub sub_category: Option<String>,
    pub priority: f32,
    pub sentiment: Option<String>,
    pub summary: Option<String>,
    pub action_item: Option<String>,
    pub tags: Vec<String>,
    pub intent: Option<String>,
    pub is_urgent: bool,
    pub due_date: Option<i64>,
    /// Which pipeline stage produced this verdict: `header`, `domain`, `llm` or `user`.
    pub source: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ClassificationStatus {
    Classified,
    Other,
    /// The LLM stage errored out (timeout, transport failure, malformed
    /// response past retries); the caller's job carries the retry, this just
    /// records that the verdict persisted is not authoritative.
    Failed,
}

impl MailAIResult {
    pub fn new(
        category: String,
        sub_category: Option<String>,
        priority: f32,
        source: &str,
    ) -> Self {
        let priority = priority.clamp(0.0, 1.0);
        Self {
            status: ClassificationStatus::Classified,
            category,
            sub_category,
            priority,
            sentiment: None,
            summary: None,
            action_item: None,
            tags: Vec::new(),
            intent: None,
            is_urgent: priority >= 0.80,
            due_date: None,
            source: source.to_owned(),
        }
    }

    /// The catch-all verdict for anything the pipeline can't place, per the
    /// "never silently dropped" rule: classification always returns
    /// something, even when every stage abstains.
    pub fn other(source: &str) -> Self {
        Self {
            status: ClassificationStatus::Other,
            category: "other".to_owned(),
            sub_category: None,
            priority: 0.0,
            sentiment: None,
            summary: None,
            action_item: None,
            tags: Vec::new(),
            intent: None,
            is_urgent: false,
            due_date: None,
            source: source.to_owned(),
        }
    }
}

#[derive(Deserialize)]
struct LlmClassification {
    category: String,
    sub_category: Option<String>,
    priority: f32,
    sentiment: Option<String>,
    action_item: Option<String>,
    tags: Option<Vec<String>>,
    intent: Option<String>,
}

const CLASSIFY_SYSTEM_PROMPT: &str = r#"You classify incoming email for a unified inbox.
Respond with a single compact JSON object and nothing else, matching this shape:
{"category": string, "sub_category": string|null, "priority": number between 0 and 1,
 "sentiment": string|null, "action_item": string|null, "tags": string[], "intent": string|null}
Categories: work, personal, finance, deployment, security, newsletter, social, other."#;

/// Classifies one message via the LLM, consulting the two-tier cache first.
/// This is the pipeline's last-resort stage; header and domain
/// matches never reach here.
pub async fn classify(input: &ClassifyInput) -> MailFabricResult<MailAIResult> {
    let cache_key = format!("classify:{}:{}", input.from, input.subject);
    if let Some(cached) = cache::get::<MailAIResult>(&cache_key).await? {
        MAILFABRIC_AI_CACHE_HIT_TOTAL.with_label_values(&["hit"]).inc();
        return Ok(cached);
    }
    MAILFABRIC_AI_CACHE_HIT_TOTAL.with_label_values(&["miss"]).inc();

    let _permit = AI_SEMAPHORE.acquire().await.expect("semaphore never closed");

    let user_prompt = format!(
        "From: {} <{}>\nTo: {}\nSubject: {}\nHas attachment: {}\nIs reply: {}\n\n{}",
        input.from_name.as_deref().unwrap_or(""),
        input.from,
        input.to.join(", "),
        input.subject,
        input.has_attachment,
        input.is_reply,
        if input.body.is_empty() { &input.snippet } else { &input.body }
    );

    let raw = LLM_CLIENT.complete(CLASSIFY_SYSTEM_PROMPT, &user_prompt).await?;
    let parsed: LlmClassification = match serde_json::from_str(extract_json(&raw)) {
        Ok(parsed) => parsed,
        Err(_) => {
            let result = MailAIResult::other("llm");
            cache::set(&cache_key, &result).await?;
            return Ok(result);
        }
    };

    let mut result = MailAIResult::new(parsed.category, parsed.sub_category, parsed.priority, "llm");
    result.sentiment = parsed.sentiment;
    result.action_item = parsed.action_item;
    result.tags = parsed.tags.unwrap_or_default();
    result.intent = parsed.intent;

    if input.body.len() >= SHORT_MAIL_CHARS {
        result.summary = summarize(&input.body).await.ok();
    }

    cache::set(&cache_key, &result).await?;
    Ok(result)
}

/// Summarizes `text`. Callers are expected to skip this for short mail
/// themselves; this function always calls through.
pub async fn summarize(text: &str) -> MailFabricResult<String> {
    let cache_key = format!("summarize:{}", text);
    if let Some(cached) = cache::get::<String>(&cache_key).await? {
        return Ok(cached);
    }

    let _permit = AI_SEMAPHORE.acquire().await.expect("semaphore never closed");
    let summary = LLM_CLIENT
        .complete(
            "Summarize the following email body in one or two sentences. Respond with only the summary.",
            text,
        )
        .await?;

    cache::set(&cache_key, &summary).await?;
    Ok(summary)
}

/// Translates `text` into `target_lang` (e.g. `"es"`, `"ja"`).
pub async fn translate(text: &str, target_lang: &str) -> MailFabricResult<String> {
    let cache_key = format!("translate:{}:{}", target_lang, text);
    if let Some(cached) = cache::get::<String>(&cache_key).await? {
        return Ok(cached);
    }

    let _permit = AI_SEMAPHORE.acquire().await.expect("semaphore never closed");
    let system_prompt = format!(
        "Translate the user's message into {target_lang}. Respond with only the translation."
    );
    let translated = LLM_CLIENT.complete(&system_prompt, text).await?;

    cache::set(&cache_key, &translated).await?;
    Ok(translated)
}

/// Free-form assistant chat, uncached: each turn is assumed to carry
/// conversational state the caller already deduplicates.
pub async fn chat(system_prompt: &str, user_message: &str) -> MailFabricResult<String> {
    let _permit = AI_SEMAPHORE.acquire().await.expect("semaphore never closed");
    LLM_CLIENT.complete(system_prompt, user_message).await
}

/// Drafts a reply to `original_body` given `instructions` (e.g. "decline
/// politely", "ask for a status update").
pub async fn draft_reply(original_body: &str, instructions: &str) -> MailFabricResult<String> {
    let _permit = AI_SEMAPHORE.acquire().await.expect("semaphore never closed");
    let system_prompt =
        "Draft a concise, professional email reply to the message the user provides, following their instructions.";
    let user_prompt = format!("Instructions: {instructions}\n\nOriginal message:\n{original_body}");
    LLM_CLIENT.complete(system_prompt, &user_prompt).await
}

/// LLMs sometimes wrap JSON in prose or code fences despite instructions;
/// this grabs the first top-level `{...}` span.
fn extract_json(raw: &str) -> &str {
    let start = raw.find('{').unwrap_or(0);
    let end = raw.rfind('}').map(|i| i + 1).unwrap_or(raw.len());
    &raw[start..end]
}

/// The queued wire form of a classification request: everything a page
/// worker learned about a saved mail, including the header-stage inputs, so
/// the durable queue runs the full pipeline rather than skipping straight to
/// the LLM fallback.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AIClassifyJob {
    pub user_id: String,
    pub mail_id: u64,
    pub from: String,
    pub from_name: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub snippet: String,
    pub has_attachment: bool,
    pub is_reply: bool,
    /// Carried alongside the wire fields so the header stage still
    /// runs from the durable queue, not just the inline save path.
    pub headers: crate::modules::provider::ClassificationHeaders,
}

impl Task for AIClassifyJob {
    const TASK_KEY: &'static str = "ai.classify";
    const TASK_QUEUE: &'static str = AI_CLASSIFY_QUEUE;

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(SETTINGS.max_job_retries)
    }

    fn run(self, _task_id: u64) -> TaskFuture {
        Box::pin(async move {
            let request = crate::modules::classify::ClassificationRequest {
                user_id: self.user_id,
                mail_id: self.mail_id,
                from_addr: self.from,
                from_name: self.from_name,
                to_addrs: self.to,
                subject: self.subject,
                body: self.body,
                snippet: self.snippet,
                has_attachment: self.has_attachment,
                is_reply: self.is_reply,
                headers: self.headers,
            };
            crate::modules::classify::classify_and_persist(&request).await?;
            Ok(())
        })
    }
}

/// One page's worth of queued classification requests, dispatched as a
/// single scheduler entry rather than one job per message. Individual item
/// failures are logged and skipped so one bad message doesn't fail the batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AIClassifyBatchJob {
    pub items: Vec<AIClassifyJob>,
}

impl Task for AIClassifyBatchJob {
    const TASK_KEY: &'static str = "ai.classify.batch";
    const TASK_QUEUE: &'static str = AI_CLASSIFY_BATCH_QUEUE;

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(SETTINGS.max_job_retries)
    }

    fn run(self, _task_id: u64) -> TaskFuture {
        Box::pin(async move {
            stream::iter(self.items)
                .map(|item| async move {
                    let request = crate::modules::classify::ClassificationRequest {
                        user_id: item.user_id,
                        mail_id: item.mail_id,
                        from_addr: item.from,
                        from_name: item.from_name,
                        to_addrs: item.to,
                        subject: item.subject,
                        body: item.body,
                        snippet: item.snippet,
                        has_attachment: item.has_attachment,
                        is_reply: item.is_reply,
                        headers: item.headers,
                    };
                    if let Err(e) = crate::modules::classify::classify_and_persist(&request).await {
                        warn!("batch classification failed for mail {}: {:?}", request.mail_id, e);
                    }
                })
                .buffer_unordered(SETTINGS.ai_concurrency)
                .collect::<Vec<()>>()
                .await;
            Ok(())
        })
    }
}
