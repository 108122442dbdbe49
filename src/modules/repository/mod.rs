// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! Repository contracts: every persisted entity is reached through a named
//! trait rather than its `native_db`-backed methods directly, so a future
//! non-native_db backend only needs a new impl, never a caller rewrite.
//!
//! These traits use return-position `impl Future` the same way the scheduler's
//! `TaskStore` does, which makes them generic-bound contracts rather than
//! `dyn`-safe trait objects (RPITIT methods cannot be boxed into a `dyn Trait`
//! without pinning every call site to `Box<dyn Future>`). Call sites are
//! generic over the repository (`fn f<R: MailRepository>(repo: &R)`) or, since
//! `native_db` is the donor's only persistence technology, just use
//! [`NativeDbRepository`] directly.

pub mod entities;

use crate::modules::error::MailFabricResult;

use entities::{
    classify::{ClassificationRulesEntity, KnownDomain, SenderProfile},
    connection::Connection,
    mail::{EmailAttachmentEntity, MailBodyEntity, MailEntity, MailThreadEntity},
    modifier::{Conflict, Modifier},
    sync::{CalendarSyncState, SyncState},
    webhook::WebhookConfig,
};

use super::database::Paginated;

pub trait ConnectionRepository: Send + Sync {
    fn get(&self, id: u64) -> impl Future<Output = MailFabricResult<Option<Connection>>> + Send;
    fn list_by_user(
        &self,
        user_id: String,
    ) -> impl Future<Output = MailFabricResult<Vec<Connection>>> + Send;
    fn list_enabled(&self) -> impl Future<Output = MailFabricResult<Vec<Connection>>> + Send;
    fn save(&self, connection: Connection) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn delete(&self, id: u64) -> impl Future<Output = MailFabricResult<()>> + Send;
}

pub trait MailRepository: Send + Sync {
    fn upsert(&self, mail: MailEntity) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn get(&self, id: u64) -> impl Future<Output = MailFabricResult<Option<MailEntity>>> + Send;
    fn get_by_mail_id(
        &self,
        mail_id: u64,
    ) -> impl Future<Output = MailFabricResult<Option<MailEntity>>> + Send;
    fn paginate_by_connection(
        &self,
        connection_id: u64,
        page: Option<u64>,
        page_size: Option<u64>,
        desc: Option<bool>,
    ) -> impl Future<Output = MailFabricResult<Paginated<MailEntity>>> + Send;
    fn apply_classification(
        &self,
        id: u64,
        category: Option<String>,
        priority: f32,
        is_urgent: bool,
    ) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn upsert_body(&self, body: MailBodyEntity) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn get_body(
        &self,
        mail_id: u64,
    ) -> impl Future<Output = MailFabricResult<Option<MailBodyEntity>>> + Send;
    fn upsert_thread(
        &self,
        thread: MailThreadEntity,
    ) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn insert_attachment(
        &self,
        attachment: EmailAttachmentEntity,
    ) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn list_attachments(
        &self,
        mail_id: u64,
    ) -> impl Future<Output = MailFabricResult<Vec<EmailAttachmentEntity>>> + Send;
}

pub trait SyncRepository: Send + Sync {
    fn get_state(
        &self,
        connection_id: u64,
    ) -> impl Future<Output = MailFabricResult<Option<SyncState>>> + Send;
    fn upsert_state(&self, state: SyncState) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn get_calendar_state(
        &self,
        connection_id: u64,
        calendar_id: String,
    ) -> impl Future<Output = MailFabricResult<Option<CalendarSyncState>>> + Send;
    fn upsert_calendar_state(
        &self,
        state: CalendarSyncState,
    ) -> impl Future<Output = MailFabricResult<()>> + Send;
}

pub trait ModifierRepository: Send + Sync {
    fn save(&self, modifier: Modifier) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn list_pending_for_connection(
        &self,
        connection_id: u64,
    ) -> impl Future<Output = MailFabricResult<Vec<Modifier>>> + Send;
    fn mark_applied(
        &self,
        id: u64,
        server_version: i64,
    ) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn mark_failed(&self, id: u64) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn save_conflict(&self, conflict: Conflict) -> impl Future<Output = MailFabricResult<()>> + Send;
}

pub trait ClassificationRepository: Send + Sync {
    fn get_rules(
        &self,
        user_id: String,
    ) -> impl Future<Output = MailFabricResult<Option<ClassificationRulesEntity>>> + Send;
    fn get_sender_profile(
        &self,
        user_id: String,
        from_email: String,
    ) -> impl Future<Output = MailFabricResult<Option<SenderProfile>>> + Send;
    fn upsert_sender_profile(
        &self,
        profile: SenderProfile,
    ) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn get_known_domain(
        &self,
        domain: String,
    ) -> impl Future<Output = MailFabricResult<Option<KnownDomain>>> + Send;
}

pub trait WebhookRepository: Send + Sync {
    fn get(&self, connection_id: u64) -> impl Future<Output = MailFabricResult<Option<WebhookConfig>>> + Send;
    fn upsert(&self, config: WebhookConfig) -> impl Future<Output = MailFabricResult<()>> + Send;
    fn delete(&self, connection_id: u64) -> impl Future<Output = MailFabricResult<()>> + Send;
}

/// The single `native_db`-backed implementation of every repository trait.
/// Zero-sized: the entities already own their table handles via `DB_MANAGER`,
/// so this struct exists purely as the seam callers program against.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeDbRepository;

impl ConnectionRepository for NativeDbRepository {
    async fn get(&self, id: u64) -> MailFabricResult<Option<Connection>> {
        Connection::get(id).await
    }

    async fn list_by_user(&self, user_id: String) -> MailFabricResult<Vec<Connection>> {
        Connection::list_by_user(&user_id).await
    }

    async fn list_enabled(&self) -> MailFabricResult<Vec<Connection>> {
        Connection::list_enabled().await
    }

    async fn save(&self, connection: Connection) -> MailFabricResult<()> {
        connection.save().await
    }

    async fn delete(&self, id: u64) -> MailFabricResult<()> {
        Connection::delete(id).await
    }
}

impl MailRepository for NativeDbRepository {
    async fn upsert(&self, mail: MailEntity) -> MailFabricResult<()> {
        mail.upsert().await
    }

    async fn get(&self, id: u64) -> MailFabricResult<Option<MailEntity>> {
        MailEntity::get(id).await
    }

    async fn get_by_mail_id(&self, mail_id: u64) -> MailFabricResult<Option<MailEntity>> {
        MailEntity::get_by_mail_id(mail_id).await
    }

    async fn paginate_by_connection(
        &self,
        connection_id: u64,
        page: Option<u64>,
        page_size: Option<u64>,
        desc: Option<bool>,
    ) -> MailFabricResult<Paginated<MailEntity>> {
        MailEntity::paginate_by_connection(connection_id, page, page_size, desc).await
    }

    async fn apply_classification(
        &self,
        id: u64,
        category: Option<String>,
        priority: f32,
        is_urgent: bool,
    ) -> MailFabricResult<()> {
        MailEntity::apply_classification(id, category, priority, is_urgent).await
    }

    async fn upsert_body(&self, body: MailBodyEntity) -> MailFabricResult<()> {
        body.upsert().await
    }

    async fn get_body(&self, mail_id: u64) -> MailFabricResult<Option<MailBodyEntity>> {
        MailBodyEntity::get(mail_id).await
    }

    async fn upsert_thread(&self, thread: MailThreadEntity) -> MailFabricResult<()> {
        thread.upsert().await
    }

    async fn insert_attachment(&self, attachment: EmailAttachmentEntity) -> MailFabricResult<()> {
        attachment.insert().await
    }

    async fn list_attachments(&self, mail_id: u64) -> MailFabricResult<Vec<EmailAttachmentEntity>> {
        EmailAttachmentEntity::list_by_mail(mail_id).await
    }
}

impl SyncRepository for NativeDbRepository {
    async fn get_state(&self, connection_id: u64) -> MailFabricResult<Option<SyncState>> {
        SyncState::get(connection_id).await
    }

    async fn upsert_state(&self, state: SyncState) -> MailFabricResult<()> {
        state.upsert().await
    }

    async fn get_calendar_state(
        &self,
        connection_id: u64,
        calendar_id: String,
    ) -> MailFabricResult<Option<CalendarSyncState>> {
        CalendarSyncState::get(connection_id, &calendar_id).await
    }

    async fn upsert_calendar_state(&self, state: CalendarSyncState) -> MailFabricResult<()> {
        state.upsert().await
    }
}

impl ModifierRepository for NativeDbRepository {
    async fn save(&self, modifier: Modifier) -> MailFabricResult<()> {
        modifier.save().await
    }

    async fn list_pending_for_connection(&self, connection_id: u64) -> MailFabricResult<Vec<Modifier>> {
        Modifier::list_pending_for_connection(connection_id).await
    }

    async fn mark_applied(&self, id: u64, server_version: i64) -> MailFabricResult<()> {
        Modifier::mark_applied(id, server_version).await
    }

    async fn mark_failed(&self, id: u64) -> MailFabricResult<()> {
        Modifier::mark_failed(id).await
    }

    async fn save_conflict(&self, conflict: Conflict) -> MailFabricResult<()> {
        conflict.save().await
    }
}

impl ClassificationRepository for NativeDbRepository {
    async fn get_rules(&self, user_id: String) -> MailFabricResult<Option<ClassificationRulesEntity>> {
        ClassificationRulesEntity::get(&user_id).await
    }

    async fn get_sender_profile(
        &self,
        user_id: String,
        from_email: String,
    ) -> MailFabricResult<Option<SenderProfile>> {
        SenderProfile::get(&user_id, &from_email).await
    }

    async fn upsert_sender_profile(&self, profile: SenderProfile) -> MailFabricResult<()> {
        profile.upsert().await
    }

    async fn get_known_domain(&self, domain: String) -> MailFabricResult<Option<KnownDomain>> {
        KnownDomain::get(&domain).await
    }
}

impl WebhookRepository for NativeDbRepository {
    async fn get(&self, connection_id: u64) -> MailFabricResult<Option<WebhookConfig>> {
        WebhookConfig::get(connection_id).await
    }

    async fn upsert(&self, config: WebhookConfig) -> MailFabricResult<()> {
        config.upsert().await
    }

    async fn delete(&self, connection_id: u64) -> MailFabricResult<()> {
        WebhookConfig::delete(connection_id).await
    }
}

pub const REPOSITORY: NativeDbRepository = NativeDbRepository;
