// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::{
    id,
    modules::{
        database::{
            async_find_impl, filter_by_secondary_key_impl, insert_impl, manager::DB_MANAGER,
            update_impl, upsert_impl,
        },
        error::{code::ErrorCode, MailFabricResult},
    },
    raise_error, utc_now,
};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ModifierAction {
    Read,
    Unread,
    Star,
    Unstar,
    Archive,
    Trash,
    Delete,
    Move,
    AddLabel,
    RemoveLabel,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum ModifierState {
    #[default]
    Pending,
    Applied,
    Failed,
    Conflict,
}

/// Per-user override of the default `keep_local` conflict policy.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConflictPolicy {
    #[default]
    KeepLocal,
    Unresolved,
}

/// The stored form of a user's [`ConflictPolicy`] override. Absence of a row
/// means the default (`keep_local`) applies.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 23, version = 1)]
#[native_db]
pub struct ConflictSettings {
    #[primary_key]
    pub user_id: String,
    pub policy: ConflictPolicy,
}

impl ConflictSettings {
    pub async fn get(user_id: &str) -> MailFabricResult<Option<ConflictSettings>> {
        async_find_impl(DB_MANAGER.meta_db(), user_id.to_owned()).await
    }

    pub async fn set(user_id: String, policy: ConflictPolicy) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.meta_db(), ConflictSettings { user_id, policy }).await
    }
}

/// A client-originated mutation, queued for offline-first delivery to the provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 20, version = 1)]
#[native_db]
pub struct Modifier {
    #[primary_key]
    pub id: u64,
    pub user_id: String,
    #[secondary_key]
    pub connection_id: u64,
    pub email_id: u64,
    pub action: ModifierAction,
    pub payload: Option<String>,
    pub client_version: i64,
    pub server_version: Option<i64>,
    #[secondary_key]
    pub state: u8,
    pub retry_count: u32,
    pub created_at: i64,
    pub applied_at: Option<i64>,
    pub conflict_id: Option<u64>,
}

impl Modifier {
    pub fn new(
        user_id: String,
        connection_id: u64,
        email_id: u64,
        action: ModifierAction,
        payload: Option<String>,
        client_version: i64,
    ) -> Self {
        Self {
            id: id!(64),
            user_id,
            connection_id,
            email_id,
            action,
            payload,
            client_version,
            server_version: None,
            state: ModifierState::Pending as u8,
            retry_count: 0,
            created_at: utc_now!(),
            applied_at: None,
            conflict_id: None,
        }
    }

    pub fn state(&self) -> ModifierState {
        match self.state {
            0 => ModifierState::Pending,
            1 => ModifierState::Applied,
            2 => ModifierState::Failed,
            _ => ModifierState::Conflict,
        }
    }

    pub async fn save(&self) -> MailFabricResult<()> {
        insert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    /// FIFO drain target: pending modifiers for a connection, oldest first.
    pub async fn list_pending_for_connection(connection_id: u64) -> MailFabricResult<Vec<Modifier>> {
        let mut pending: Vec<Modifier> = filter_by_secondary_key_impl(
            DB_MANAGER.meta_db(),
            ModifierKey::connection_id,
            connection_id,
        )
        .await?
        .into_iter()
        .filter(|m| m.state() == ModifierState::Pending)
        .collect();
        pending.sort_by_key(|m| m.created_at);
        Ok(pending)
    }

    pub async fn mark_applied(id: u64, server_version: i64) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(format!("modifier id={id} not found"), ErrorCode::ResourceNotFound)
                    })
            },
            move |current: &Modifier| {
                let mut updated = current.clone();
                updated.state = ModifierState::Applied as u8;
                updated.server_version = Some(server_version);
                updated.applied_at = Some(utc_now!());
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn increment_retry(id: u64) -> MailFabricResult<u32> {
        let updated = update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(format!("modifier id={id} not found"), ErrorCode::ResourceNotFound)
                    })
            },
            move |current: &Modifier| {
                let mut updated = current.clone();
                updated.retry_count += 1;
                Ok(updated)
            },
        )
        .await?;
        Ok(updated.retry_count + 1)
    }

    /// Puts a `conflict`-state modifier back into the FIFO drain, used after a
    /// `keep_local` re-apply that failed retryably.
    pub async fn reset_pending(id: u64) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(format!("modifier id={id} not found"), ErrorCode::ResourceNotFound)
                    })
            },
            move |current: &Modifier| {
                let mut updated = current.clone();
                updated.state = ModifierState::Pending as u8;
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn mark_failed(id: u64) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(format!("modifier id={id} not found"), ErrorCode::ResourceNotFound)
                    })
            },
            move |current: &Modifier| {
                let mut updated = current.clone();
                updated.state = ModifierState::Failed as u8;
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn mark_conflict(id: u64, conflict_id: u64) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(format!("modifier id={id} not found"), ErrorCode::ResourceNotFound)
                    })
            },
            move |current: &Modifier| {
                let mut updated = current.clone();
                updated.state = ModifierState::Conflict as u8;
                updated.conflict_id = Some(conflict_id);
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    /// Sweeps `applied` modifiers older than `max_age_secs`.
    pub async fn cleanup_applied(max_age_secs: i64) -> MailFabricResult<usize> {
        let cutoff = utc_now!() - max_age_secs;
        crate::modules::database::batch_delete_impl(DB_MANAGER.meta_db(), move |rw| {
            use itertools::Itertools;
            let all: Vec<Modifier> = rw
                .scan()
                .primary()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .all()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .try_collect()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            Ok(all
                .into_iter()
                .filter(|m| m.state() == ModifierState::Applied && m.applied_at.unwrap_or(0) < cutoff)
                .collect())
        })
        .await
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConflictResolution {
    KeepLocal,
    KeepRemote,
    Merged,
    #[default]
    Unresolved,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 21, version = 1)]
#[native_db]
pub struct Conflict {
    #[primary_key]
    pub id: u64,
    pub modifier_id: u64,
    pub resolution: ConflictResolution,
    pub resolved_at: Option<i64>,
}

impl Conflict {
    pub fn new(modifier_id: u64) -> Self {
        Self {
            id: id!(64),
            modifier_id,
            resolution: ConflictResolution::Unresolved,
            resolved_at: None,
        }
    }

    pub async fn save(&self) -> MailFabricResult<()> {
        insert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }
}

/// Strictly increasing per-email version counter, bumped on every server-applied change.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 22, version = 1)]
#[native_db]
pub struct EmailVersionCounter {
    #[primary_key]
    pub email_id: u64,
    pub version: i64,
    pub updated_at: i64,
}

impl EmailVersionCounter {
    /// Reads the current version without advancing it; `None` means the
    /// email has never had a server-applied modifier.
    pub async fn current(email_id: u64) -> MailFabricResult<Option<i64>> {
        let existing = crate::modules::database::async_find_impl::<EmailVersionCounter>(
            DB_MANAGER.meta_db(),
            email_id,
        )
        .await?;
        Ok(existing.map(|e| e.version))
    }

    pub async fn bump(email_id: u64) -> MailFabricResult<i64> {
        let existing = crate::modules::database::async_find_impl::<EmailVersionCounter>(
            DB_MANAGER.meta_db(),
            email_id,
        )
        .await?;
        match existing {
            Some(_) => {
                let updated = update_impl(
                    DB_MANAGER.meta_db(),
                    move |rw| {
                        rw.get()
                            .primary(email_id)
                            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                            .ok_or_else(|| {
                                raise_error!(
                                    format!("email version counter id={email_id} not found"),
                                    ErrorCode::ResourceNotFound
                                )
                            })
                    },
                    move |current: &EmailVersionCounter| {
                        let mut updated = current.clone();
                        updated.version += 1;
                        updated.updated_at = utc_now!();
                        Ok(updated)
                    },
                )
                .await?;
                Ok(updated.version + 1)
            }
            None => {
                let fresh = EmailVersionCounter {
                    email_id,
                    version: 1,
                    updated_at: utc_now!(),
                };
                upsert_impl(DB_MANAGER.meta_db(), fresh.clone()).await?;
                Ok(fresh.version)
            }
        }
    }
}
