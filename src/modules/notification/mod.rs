// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! The sole writer of [`NotificationEntity`] rows. Every other module
//! that wants to surface something to a user goes through here so muting and
//! the realtime fan-out stay in one place.

use crate::modules::error::MailFabricResult;
use crate::modules::realtime::{RealtimeEvent, REALTIME_BUS};
use crate::modules::repository::entities::notification::{
    NotificationEntity, NotificationKind, NotificationSettings,
};

pub struct NotificationService;

impl NotificationService {
    /// Persists a notification and pushes it to the user's realtime stream,
    /// unless the user has muted this kind.
    pub async fn notify(
        user_id: &str,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> MailFabricResult<()> {
        if let Some(settings) = NotificationSettings::get(user_id).await? {
            if settings.is_muted(&kind) {
                return Ok(());
            }
        }

        let kind_tag = match kind {
            NotificationKind::SyncProgress => "sync_progress",
            NotificationKind::ModifierConflict => "modifier_conflict",
            NotificationKind::MailClassified => "mail_classified",
            NotificationKind::WebhookRenewed => "webhook_renewed",
        };
        let entity = NotificationEntity::new(user_id.to_owned(), kind, title.into(), body.into());
        entity.save().await?;

        REALTIME_BUS.publish(
            user_id,
            RealtimeEvent::Notification {
                kind: kind_tag.to_owned(),
                title: entity.title.clone(),
                body: entity.body.clone(),
            },
        );

        Ok(())
    }

    pub async fn list_for_user(user_id: &str) -> MailFabricResult<Vec<NotificationEntity>> {
        NotificationEntity::list_for_user(user_id).await
    }

    pub async fn mark_read(id: u64) -> MailFabricResult<()> {
        NotificationEntity::mark_read(id).await
    }
}
