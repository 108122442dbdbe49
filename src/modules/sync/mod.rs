// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! The Sync Engine: `Idle -> InitPlan -> PageFanout -> Incremental ->
//! GapRepair -> Idle`, with a `Failed(retry_at)` transition reachable from
//! any state. [`MailSyncInitJob`] seeds the id-only fanout, [`MailSyncPageJob`]
//! walks the result pages, [`MailSyncIncrementalJob`] consumes a provider
//! delta cursor once the backfill is done, and [`GapRepairTask`] notices a
//! connection whose webhook has gone quiet and kicks an incremental run.

use crate::modules::ai::{AIClassifyBatchJob, AIClassifyJob};
use crate::modules::context::RustMailTask;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailFabricResult;
use crate::modules::notification::NotificationService;
use crate::modules::provider::credentials::valid_access_token;
use crate::modules::provider::pool::PROVIDER_POOL;
use crate::modules::provider::{ProviderClient, ProviderError, ProviderErrorCode, ProviderMailMessage};
use crate::modules::realtime::{RealtimeEvent, REALTIME_BUS};
use crate::modules::repository::entities::connection::Connection;
use crate::modules::repository::entities::mail::{MailBodyEntity, MailEntity};
use crate::modules::repository::entities::notification::NotificationKind;
use crate::modules::repository::entities::sync::{Checkpoint, SyncCursor, SyncPhase, SyncState, SyncStatus};
use crate::modules::scheduler::periodic::PeriodicTask;
use crate::modules::scheduler::retry::RetryPolicy;
use crate::modules::scheduler::task::{Task, TaskFuture};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::tasks::queue::MailFabricJobQueue;
use crate::modules::utils::mail_id;
use crate::{calculate_hash, raise_error, utc_now};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// The job-queue family every sync job runs on.
pub const MAIL_SYNC_QUEUE: &str = "mail.sync";

/// The `recent` phase only looks back this far; a full historical backfill
/// is out of scope until a connection explicitly asks for it.
const RECENT_WINDOW_DAYS: i64 = 30;

/// Kicks off a connection's initial sync: claims [`SyncState`], resets its
/// checkpoint, and enqueues the first page job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailSyncInitJob {
    pub connection_id: u64,
}

impl Task for MailSyncInitJob {
    const TASK_KEY: &'static str = "mail.sync.init";
    const TASK_QUEUE: &'static str = MAIL_SYNC_QUEUE;

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(SETTINGS.max_job_retries)
    }

    fn run(self, _task_id: u64) -> TaskFuture {
        Box::pin(async move { run_init(self.connection_id).await })
    }
}

async fn run_init(connection_id: u64) -> MailFabricResult<()> {
    if Connection::get(connection_id).await?.is_none() {
        return Ok(());
    }
    if !SyncState::begin_run(connection_id).await? {
        // Another run already owns this connection; nothing to do.
        return Ok(());
    }

    let mut state = SyncState::get(connection_id)
        .await?
        .unwrap_or_else(|| SyncState::new(connection_id));
    state.phase = SyncPhase::Recent;
    state.status = SyncStatus::Syncing;
    state.checkpoint = Checkpoint::default();
    state.last_error = None;
    state.upsert().await?;

    MailFabricJobQueue::get()?
        .submit(
            MailSyncPageJob {
                connection_id,
                page_token: None,
                page_number: 1,
            },
            None,
        )
        .await
}

/// Processes one page of id-only results: fetches each message, upserts it,
/// and either chains to the next page or closes out the initial sync.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailSyncPageJob {
    pub connection_id: u64,
    pub page_token: Option<String>,
    pub page_number: u32,
}

impl Task for MailSyncPageJob {
    const TASK_KEY: &'static str = "mail.sync.page";
    const TASK_QUEUE: &'static str = MAIL_SYNC_QUEUE;

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(SETTINGS.max_job_retries)
    }

    fn run(self, _task_id: u64) -> TaskFuture {
        Box::pin(async move { run_page(self).await })
    }
}

async fn run_page(job: MailSyncPageJob) -> MailFabricResult<()> {
    let Some(connection) = Connection::get(job.connection_id).await? else {
        return Ok(());
    };
    let Some(mut state) = SyncState::get(job.connection_id).await? else {
        return Ok(());
    };

    let access_token = valid_access_token(&connection).await?;
    let client = PROVIDER_POOL.get(&connection).await?;
    let query = recent_window_query(state.phase);

    let page = client
        .list_message_ids(&access_token, &query, job.page_token.as_deref())
        .await
        .map_err(map_provider_error)?;

    let (classify_jobs, saved) = save_messages(&connection, &client, &access_token, page.external_ids).await;
    if !classify_jobs.is_empty() {
        MailFabricJobQueue::get()?
            .submit(AIClassifyBatchJob { items: classify_jobs }, None)
            .await?;
    }

    state.checkpoint.synced_count += saved;
    state.checkpoint.total_count = state.checkpoint.total_count.max(state.checkpoint.synced_count);
    state.checkpoint.page_token = page.next_page_token.clone();
    state.upsert().await?;

    REALTIME_BUS.publish(
        &connection.user_id,
        RealtimeEvent::SyncProgress {
            connection_id: connection.id,
            phase: "page_fanout".to_owned(),
            synced_count: state.checkpoint.synced_count,
            total_count: state.checkpoint.total_count,
        },
    );

    match page.next_page_token {
        Some(token) => {
            MailFabricJobQueue::get()?
                .submit(
                    MailSyncPageJob {
                        connection_id: job.connection_id,
                        page_token: Some(token),
                        page_number: job.page_number + 1,
                    },
                    None,
                )
                .await
        }
        None => complete_initial_sync(&connection, &mut state).await,
    }
}

async fn complete_initial_sync(connection: &Connection, state: &mut SyncState) -> MailFabricResult<()> {
    state.status = SyncStatus::Completed;
    state.first_sync_complete = true;
    state.last_sync_at = Some(utc_now!());
    state.upsert().await?;

    REALTIME_BUS.publish(
        &connection.user_id,
        RealtimeEvent::SyncProgress {
            connection_id: connection.id,
            phase: "completed".to_owned(),
            synced_count: state.checkpoint.synced_count,
            total_count: state.checkpoint.total_count,
        },
    );

    NotificationService::notify(
        &connection.user_id,
        NotificationKind::SyncProgress,
        "Mailbox synced",
        format!("Initial sync finished: {} messages", state.checkpoint.synced_count),
    )
    .await
}

/// Consumes a provider delta cursor for a connection whose backfill already
/// finished. Triggered by incoming webhook pushes and by [`GapRepairTask`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailSyncIncrementalJob {
    pub connection_id: u64,
    /// The provider-reported history id carried by the webhook push that
    /// triggered this run, if any; used only to coalesce a push that arrives
    /// while another run already owns the connection.
    pub history_hint: Option<SyncCursor>,
}

impl Task for MailSyncIncrementalJob {
    const TASK_KEY: &'static str = "mail.sync.incremental";
    const TASK_QUEUE: &'static str = MAIL_SYNC_QUEUE;

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(SETTINGS.max_job_retries)
    }

    /// A live webhook push, not bulk backfill paging: drained ahead of
    /// `MailSyncPageJob`'s backlog on the shared `mail.sync` family.
    fn priority(&self) -> bool {
        true
    }

    fn run(self, _task_id: u64) -> TaskFuture {
        Box::pin(async move { run_incremental(self.connection_id, self.history_hint.clone()).await })
    }
}

/// Queues an incremental run for `connection_id`, optionally carrying the
/// webhook push's reported history id. Safe to call while a concurrent run
/// is in flight: [`run_incremental`] itself owns the single-runner guard and
/// coalesces a losing push's cursor onto the run already in progress.
pub async fn trigger_incremental(
    connection_id: u64,
    history_hint: Option<SyncCursor>,
) -> MailFabricResult<()> {
    MailFabricJobQueue::get()?
        .submit(
            MailSyncIncrementalJob {
                connection_id,
                history_hint,
            },
            None,
        )
        .await
}

async fn run_incremental(connection_id: u64, history_hint: Option<SyncCursor>) -> MailFabricResult<()> {
    let Some(connection) = Connection::get(connection_id).await? else {
        return Ok(());
    };
    let Some(state) = SyncState::get(connection_id).await? else {
        return Ok(());
    };
    if !state.first_sync_complete {
        // The initial backfill hasn't caught up yet; its own page jobs will
        // observe this push's effects once they reach the recent window.
        return Ok(());
    }

    if !SyncState::begin_run(connection_id).await? {
        // Another incremental run already owns this connection: coalesce
        // this push's cursor onto it rather than running concurrently.
        if let Some(hint) = history_hint {
            SyncState::stash_next_history_id_if_greater(connection_id, hint).await?;
        }
        return Ok(());
    }

    let outcome = fetch_and_apply_delta(&connection, &state).await;

    match &outcome {
        Err(e) if e.code() == ErrorCode::FullSyncRequired => {
            return restart_full_sync(connection_id).await;
        }
        _ => {}
    }

    let learned = outcome.as_ref().ok().cloned().flatten();
    let pending = SyncState::finish_incremental_run(connection_id, learned).await?;
    outcome?;

    if let Some(next) = pending {
        if let Err(e) = Box::pin(run_incremental(connection_id, Some(next))).await {
            warn!(
                "coalesced incremental re-run failed for connection {}: {:?}",
                connection_id, e
            );
        }
    }

    Ok(())
}

/// Runs one delta call against the provider and applies its results,
/// returning the cursor it learned (if the provider reported one further
/// along) for the caller to fold back into [`SyncState`].
async fn fetch_and_apply_delta(
    connection: &Connection,
    state: &SyncState,
) -> MailFabricResult<Option<SyncCursor>> {
    let access_token = valid_access_token(connection).await?;
    let client = PROVIDER_POOL.get(connection).await?;

    let delta = client
        .delta(&access_token, state.history_id.0.as_deref())
        .await
        .map_err(map_provider_error)?;

    let (classify_jobs, _) =
        save_messages(connection, &client, &access_token, delta.added_or_changed).await;
    if !classify_jobs.is_empty() {
        MailFabricJobQueue::get()?
            .submit(AIClassifyBatchJob { items: classify_jobs }, None)
            .await?;
    }

    for external_id in &delta.deleted {
        if let Some(mail) = MailEntity::get_by_mail_id(mail_id(connection.id, external_id)).await? {
            MailEntity::delete(mail.id).await?;
        }
    }

    Ok(delta.next_cursor.map(|cursor| SyncCursor(Some(cursor))))
}

/// A provider signaled its cursor is no longer valid: drop the
/// history id and re-enter `InitPlan` from scratch.
async fn restart_full_sync(connection_id: u64) -> MailFabricResult<()> {
    let mut state = SyncState::get(connection_id)
        .await?
        .unwrap_or_else(|| SyncState::new(connection_id));
    state.history_id = SyncCursor::default();
    state.first_sync_complete = false;
    state.checkpoint = Checkpoint::default();
    state.status = SyncStatus::Pending;
    state.upsert().await?;

    MailFabricJobQueue::get()?
        .submit(MailSyncInitJob { connection_id }, None)
        .await
}

/// Fetches and upserts each id in `external_ids` with bounded concurrency,
/// returning the classify job for every message actually saved.
async fn save_messages(
    connection: &Connection,
    client: &ProviderClient,
    access_token: &str,
    external_ids: Vec<String>,
) -> (Vec<AIClassifyJob>, u64) {
    let results: Vec<MailFabricResult<Option<AIClassifyJob>>> = stream::iter(external_ids)
        .map(|external_id| fetch_and_save(connection, client, access_token, external_id))
        .buffer_unordered(SETTINGS.page_fetch_concurrency as usize)
        .collect()
        .await;

    let mut classify_jobs = Vec::new();
    let mut saved = 0u64;
    for result in results {
        match result {
            Ok(Some(job)) => {
                saved += 1;
                classify_jobs.push(job);
            }
            Ok(None) => {}
            Err(e) => warn!("failed to sync message for connection {}: {:?}", connection.id, e),
        }
    }
    (classify_jobs, saved)
}

/// Fetches one message and upserts it. Re-delivery of an already-saved
/// `mail_id` updates the existing row in place rather than creating a
/// duplicate.
async fn fetch_and_save(
    connection: &Connection,
    client: &ProviderClient,
    access_token: &str,
    external_id: String,
) -> MailFabricResult<Option<AIClassifyJob>> {
    let message = client
        .get_message(access_token, &external_id)
        .await
        .map_err(map_provider_error)?;

    let dedup_key = mail_id(connection.id, &external_id);
    let mut entity = match MailEntity::get_by_mail_id(dedup_key).await? {
        Some(existing) => apply_message(existing, &message),
        None => MailEntity::new(
            connection.id,
            message.external_id.clone(),
            message.thread_id.clone(),
            message.subject.clone(),
            message.from_addr.clone(),
            message.to_addrs.clone(),
            message.internal_date,
            message.snippet.clone(),
            message.labels.clone(),
        ),
    };
    entity.body_cached = message.html_body.is_some() || message.text_body.is_some();
    entity.upsert().await?;

    save_body(entity.mail_id, &message).await?;

    Ok(Some(AIClassifyJob {
        user_id: connection.user_id.clone(),
        mail_id: entity.id,
        from: message.from_addr,
        from_name: None,
        to: message.to_addrs,
        subject: message.subject,
        body: message.text_body.clone().unwrap_or_default(),
        snippet: message.snippet,
        has_attachment: false,
        is_reply: message.subject.to_lowercase().starts_with("re:"),
        headers: message.headers,
    }))
}

fn apply_message(existing: MailEntity, message: &ProviderMailMessage) -> MailEntity {
    let mut updated = existing;
    updated.subject = message.subject.clone();
    updated.from_addr = message.from_addr.clone();
    updated.to_addrs = message.to_addrs.clone();
    updated.thread_id = message.thread_id.clone();
    updated.internal_date = message.internal_date;
    updated.snippet = message.snippet.clone();
    updated.labels = message.labels.clone();
    updated.updated_at = utc_now!();
    updated
}

async fn save_body(mail_id: u64, message: &ProviderMailMessage) -> MailFabricResult<()> {
    let now = utc_now!();
    let fingerprint = calculate_hash!(&format!(
        "{}{}",
        message.html_body.as_deref().unwrap_or_default(),
        message.text_body.as_deref().unwrap_or_default()
    ))
    .to_string();

    MailBodyEntity {
        mail_id,
        content_fingerprint: fingerprint,
        html: message.html_body.clone(),
        text: message.text_body.clone(),
        cached_at: now,
        expires_at: now + SETTINGS.body_cache_ttl_days * 86_400_000,
    }
    .upsert()
    .await
}

fn recent_window_query(phase: SyncPhase) -> String {
    match phase {
        SyncPhase::Recent => format!("newer_than:{RECENT_WINDOW_DAYS}d"),
        SyncPhase::Full => String::new(),
    }
}

fn map_provider_error(error: ProviderError) -> crate::modules::error::MailFabricError {
    let code = match error.code {
        ProviderErrorCode::AuthError | ProviderErrorCode::TokenExpired => ErrorCode::TokenExpired,
        ProviderErrorCode::RateLimit => ErrorCode::RateLimited,
        ProviderErrorCode::NotFound => ErrorCode::ResourceNotFound,
        ProviderErrorCode::NetworkError => ErrorCode::NetworkError,
        ProviderErrorCode::ServerError => ErrorCode::ProviderServerError,
        ProviderErrorCode::InvalidInput => ErrorCode::InvalidParameter,
        ProviderErrorCode::FullSyncRequired => ErrorCode::FullSyncRequired,
    };
    raise_error!(error.message, code)
}

/// Picks up connections whose webhook (if any) has gone quiet: if nothing
/// has synced within the freshness window, an incremental run is queued
/// directly rather than waiting on a push that may never arrive.
pub struct GapRepairTask;

impl RustMailTask for GapRepairTask {
    fn start() {
        let periodic_task = PeriodicTask::new("sync-gap-repair-task");
        let task = move |_: Option<u64>| Box::pin(async move { sweep_gaps().await });
        periodic_task.start(task, None, Duration::from_secs(5 * 60), false, false);
    }
}

/// Sweeps [`MailBodyEntity`] rows past their TTL; the envelope in
/// [`MailEntity`] is untouched, only the cached body content is evicted.
pub struct MailBodyCleanupTask;

impl RustMailTask for MailBodyCleanupTask {
    fn start() {
        let periodic_task = PeriodicTask::new("mail-body-cleanup-task");
        let task = move |_: Option<u64>| {
            Box::pin(async move {
                let removed = MailBodyEntity::delete_expired(utc_now!()).await?;
                if removed > 0 {
                    tracing::info!("mail body cleanup evicted {} expired bodies", removed);
                }
                Ok(())
            })
        };
        periodic_task.start(task, None, Duration::from_secs(6 * 60 * 60), false, false);
    }
}

async fn sweep_gaps() -> MailFabricResult<()> {
    let cutoff = utc_now!() - (SETTINGS.gap_repair_freshness_minutes as i64) * 60_000;
    for connection in Connection::list_enabled().await? {
        let Some(state) = SyncState::get(connection.id).await? else {
            continue;
        };
        if state.status != SyncStatus::Completed {
            continue;
        }
        let stale = state.last_sync_at.map(|t| t < cutoff).unwrap_or(true);
        if stale {
            if let Err(e) = trigger_incremental(connection.id, None).await {
                warn!(
                    "gap repair failed to enqueue incremental sync for connection {}: {:?}",
                    connection.id, e
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_phase_uses_a_bounded_lookback_query() {
        assert_eq!(recent_window_query(SyncPhase::Recent), "newer_than:30d");
    }

    #[test]
    fn full_phase_has_no_query_filter() {
        assert_eq!(recent_window_query(SyncPhase::Full), "");
    }

    #[test]
    fn token_expiry_maps_to_a_retryable_error() {
        let err = map_provider_error(ProviderError::new(ProviderErrorCode::TokenExpired, "expired"));
        assert_eq!(err.code(), ErrorCode::TokenExpired);
    }

    #[test]
    fn full_sync_required_is_distinguishable_from_other_errors() {
        let err = map_provider_error(ProviderError::new(ProviderErrorCode::FullSyncRequired, "gone"));
        assert_eq!(err.code(), ErrorCode::FullSyncRequired);
    }
}
