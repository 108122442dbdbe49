// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! The offline-first modifier queue: every client-originated mutation
//! is recorded as a [`Modifier`] row before it ever touches a provider, so a
//! disconnected client can keep working and the worker here replays the
//! backlog FIFO per connection once it can reach the network again.

use crate::modules::context::RustMailTask;
use crate::modules::error::MailFabricResult;
use crate::modules::notification::NotificationService;
use crate::modules::provider::credentials::valid_access_token;
use crate::modules::provider::pool::PROVIDER_POOL;
use crate::modules::provider::ModifyAction;
use crate::modules::realtime::{RealtimeEvent, REALTIME_BUS};
use crate::modules::repository::entities::connection::Connection;
use crate::modules::repository::entities::mail::MailEntity;
use crate::modules::repository::entities::modifier::{
    Conflict, ConflictPolicy, ConflictSettings, EmailVersionCounter, Modifier, ModifierAction,
};
use crate::modules::repository::entities::notification::NotificationKind;
use crate::modules::scheduler::periodic::PeriodicTask;
use crate::modules::settings::cli::SETTINGS;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{info, warn};

const DRAIN_INTERVAL: Duration = Duration::from_secs(5);
/// Same-action runs within a connection's FIFO are dispatched with this much
/// fan-out; ordering between *different* actions is still preserved because a
/// batch only ever spans a run of identical actions.
const BATCH_CONCURRENCY: usize = 10;

pub struct ModifierWorker;

impl RustMailTask for ModifierWorker {
    fn start() {
        let periodic_task = PeriodicTask::new("modifier-drain-task");
        let task = move |_: Option<u64>| {
            Box::pin(async move {
                for connection in Connection::list_enabled().await? {
                    if let Err(e) = drain_connection(&connection).await {
                        warn!("modifier drain failed for connection {}: {:?}", connection.id, e);
                    }
                }
                Ok(())
            })
        };
        periodic_task.start(task, None, DRAIN_INTERVAL, false, true);
    }
}

/// Drains every pending modifier for `connection`, oldest first, coalescing
/// consecutive same-action runs into one bounded-concurrency batch.
async fn drain_connection(connection: &Connection) -> MailFabricResult<()> {
    let pending = Modifier::list_pending_for_connection(connection.id).await?;
    if pending.is_empty() {
        return Ok(());
    }

    for batch in group_consecutive_by_action(pending) {
        stream::iter(batch)
            .map(|modifier| apply_one(connection, modifier))
            .buffer_unordered(BATCH_CONCURRENCY)
            .for_each(|result| async move {
                if let Err(e) = result {
                    warn!("modifier apply failed: {:?}", e);
                }
            })
            .await;
    }

    Ok(())
}

fn group_consecutive_by_action(modifiers: Vec<Modifier>) -> Vec<Vec<Modifier>> {
    let mut groups: Vec<Vec<Modifier>> = Vec::new();
    for modifier in modifiers {
        match groups.last_mut() {
            Some(group) if group.last().map(|m| m.action_key()) == Some(modifier.action_key()) => {
                group.push(modifier);
            }
            _ => groups.push(vec![modifier]),
        }
    }
    groups
}

trait ActionKey {
    fn action_key(&self) -> std::mem::Discriminant<ModifierAction>;
}

impl ActionKey for Modifier {
    fn action_key(&self) -> std::mem::Discriminant<ModifierAction> {
        std::mem::discriminant(&self.action)
    }
}

fn to_provider_action(action: ModifierAction) -> ModifyAction {
    match action {
        ModifierAction::Read => ModifyAction::Read,
        ModifierAction::Unread => ModifyAction::Unread,
        ModifierAction::Star => ModifyAction::Star,
        ModifierAction::Unstar => ModifyAction::Unstar,
        ModifierAction::Archive => ModifyAction::Archive,
        // No provider exposes permanent delete through this contract; a
        // client-requested delete is applied as a trash, same as Trash.
        ModifierAction::Trash | ModifierAction::Delete => ModifyAction::Trash,
        ModifierAction::Move => ModifyAction::Move,
        ModifierAction::AddLabel | ModifierAction::RemoveLabel => ModifyAction::Labels,
    }
}

async fn apply_one(connection: &Connection, modifier: Modifier) -> MailFabricResult<()> {
    let Some(mail) = MailEntity::get(modifier.email_id).await? else {
        // The mail this modifier targets is gone: a semantic failure, acked rather than retried.
        return Modifier::mark_failed(modifier.id).await;
    };

    if let Some(current_version) = EmailVersionCounter::current(modifier.email_id).await? {
        if current_version > modifier.client_version {
            return handle_conflict(connection, &modifier, &mail).await;
        }
    }

    apply_against_provider(connection, &modifier, &mail).await
}

/// Sends `modifier`'s action to the provider and records the outcome. Shared
/// by the normal drain path and by `handle_conflict`'s `keep_local` re-apply.
async fn apply_against_provider(
    connection: &Connection,
    modifier: &Modifier,
    mail: &MailEntity,
) -> MailFabricResult<()> {
    let (add_labels, remove_labels) = match modifier.action {
        ModifierAction::AddLabel => (vec![modifier.payload.clone().unwrap_or_default()], vec![]),
        ModifierAction::RemoveLabel => (vec![], vec![modifier.payload.clone().unwrap_or_default()]),
        _ => (vec![], vec![]),
    };

    let access_token = valid_access_token(connection).await?;
    let client = PROVIDER_POOL.get(connection).await?;
    let result = client
        .modify(
            &access_token,
            &mail.external_id,
            to_provider_action(modifier.action),
            &add_labels,
            &remove_labels,
        )
        .await;

    match result {
        Ok(()) => {
            let server_version = EmailVersionCounter::bump(modifier.email_id).await?;
            Modifier::mark_applied(modifier.id, server_version).await?;
            Ok(())
        }
        Err(e) if e.retryable => {
            let retries = Modifier::increment_retry(modifier.id).await?;
            if retries as u32 >= SETTINGS.max_job_retries {
                Modifier::mark_failed(modifier.id).await?;
            } else {
                Modifier::reset_pending(modifier.id).await?;
            }
            Ok(())
        }
        Err(_) => Modifier::mark_failed(modifier.id).await,
    }
}

/// The server has moved on past what this modifier assumed: record an
/// unresolved conflict and, unless the user opted into `unresolved`-only
/// handling, re-apply the local mutation on top of whatever the server has now.
async fn handle_conflict(
    connection: &Connection,
    modifier: &Modifier,
    mail: &MailEntity,
) -> MailFabricResult<()> {
    let conflict = Conflict::new(modifier.id);
    conflict.save().await?;
    Modifier::mark_conflict(modifier.id, conflict.id).await?;

    REALTIME_BUS.publish(
        &modifier.user_id,
        RealtimeEvent::ModifierConflict {
            modifier_id: modifier.id,
            email_id: modifier.email_id,
        },
    );
    NotificationService::notify(
        &modifier.user_id,
        NotificationKind::ModifierConflict,
        "Sync conflict",
        "A change could not be applied cleanly and needs review",
    )
    .await?;

    if resolution_policy(&modifier.user_id).await == ConflictPolicy::KeepLocal {
        info!(
            "re-applying modifier {} for connection {} after conflict (keep_local)",
            modifier.id, connection.id
        );
        apply_against_provider(connection, modifier, mail).await?;
    }
    Ok(())
}

/// The effective conflict policy for `user_id`: their stored override, or the
/// `keep_local` default when none was ever set.
async fn resolution_policy(user_id: &str) -> ConflictPolicy {
    match ConflictSettings::get(user_id).await {
        Ok(Some(settings)) => settings.policy,
        Ok(None) => ConflictPolicy::KeepLocal,
        Err(e) => {
            warn!("failed to load conflict policy for user {}: {:?}", user_id, e);
            ConflictPolicy::KeepLocal
        }
    }
}

/// Sweeps `applied` modifiers older than the configured retention window.
pub async fn cleanup_applied() -> MailFabricResult<usize> {
    let max_age_secs = SETTINGS.modifier_cleanup_age_days * 24 * 60 * 60;
    Modifier::cleanup_applied(max_age_secs).await
}

pub struct ModifierCleanupTask;

impl RustMailTask for ModifierCleanupTask {
    fn start() {
        let periodic_task = PeriodicTask::new("modifier-cleanup-task");
        let task = move |_: Option<u64>| {
            Box::pin(async move {
                let removed = cleanup_applied().await?;
                if removed > 0 {
                    info!("modifier cleanup removed {} applied rows", removed);
                }
                Ok(())
            })
        };
        periodic_task.start(task, None, Duration::from_secs(6 * 60 * 60), false, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modifier(action: ModifierAction) -> Modifier {
        Modifier::new("user-1".to_owned(), 1, 1, action, None, 0)
    }

    #[test]
    fn groups_consecutive_same_action_runs() {
        let modifiers = vec![
            modifier(ModifierAction::Read),
            modifier(ModifierAction::Read),
            modifier(ModifierAction::Star),
            modifier(ModifierAction::Read),
        ];
        let groups = group_consecutive_by_action(modifiers);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
        assert_eq!(groups[2].len(), 1);
    }

    #[test]
    fn delete_maps_to_trash_without_a_provider_counterpart() {
        assert!(matches!(to_provider_action(ModifierAction::Delete), ModifyAction::Trash));
        assert!(matches!(to_provider_action(ModifierAction::Trash), ModifyAction::Trash));
    }
}
