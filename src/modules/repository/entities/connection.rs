// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::{
    encrypt, id,
    modules::{
        database::{
            delete_impl, insert_impl, manager::DB_MANAGER, paginate_query_primary_scan_all_impl,
            update_impl, Paginated,
        },
        error::{code::ErrorCode, MailFabricResult},
    },
    raise_error, utc_now,
};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// Which provider adapter owns this connection's sync lifecycle.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Provider {
    #[default]
    Gmail,
    Graph,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Gmail => write!(f, "gmail"),
            Provider::Graph => write!(f, "graph"),
        }
    }
}

/// A single mailbox (and, for Graph, calendar) a user has authorized us to sync.
///
/// Connections arrive already authorized: the owning application completes the
/// interactive OAuth consent flow and hands us the resulting tokens, so there is
/// no pending-authorization state to persist here.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[native_model(id = 1, version = 1)]
#[native_db(primary_key(pk -> String))]
pub struct Connection {
    #[secondary_key(unique)]
    pub id: u64,
    #[secondary_key]
    pub user_id: String,
    pub provider: Provider,
    #[secondary_key(unique)]
    pub email: String,
    pub display_name: Option<String>,
    pub enabled: bool,
    /// OAuth application the connection was issued under; BYOA per tenant.
    pub oauth_client_id: String,
    pub oauth_client_secret: String,
    pub access_token: Option<String>,
    pub refresh_token: String,
    pub token_expires_at: i64,
    pub calendar_enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Connection {
    fn pk(&self) -> String {
        format!("{}_{}", self.created_at, self.id)
    }

    pub fn new(request: ConnectionCreateRequest) -> MailFabricResult<Self> {
        let now = utc_now!();
        Ok(Self {
            id: id!(64),
            user_id: request.user_id,
            provider: request.provider,
            email: request.email,
            display_name: request.display_name,
            enabled: true,
            oauth_client_id: request.oauth_client_id,
            oauth_client_secret: encrypt!(&request.oauth_client_secret)?,
            access_token: request
                .access_token
                .as_deref()
                .map(|t| encrypt!(t))
                .transpose()?,
            refresh_token: encrypt!(&request.refresh_token)?,
            token_expires_at: request.token_expires_at.unwrap_or(now),
            calendar_enabled: request.calendar_enabled,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn save(&self) -> MailFabricResult<()> {
        insert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    pub async fn get(id: u64) -> MailFabricResult<Option<Connection>> {
        crate::modules::database::secondary_find_impl(DB_MANAGER.meta_db(), ConnectionKey::id, id)
            .await
    }

    pub async fn list_by_user(user_id: &str) -> MailFabricResult<Vec<Connection>> {
        crate::modules::database::filter_by_secondary_key_impl(
            DB_MANAGER.meta_db(),
            ConnectionKey::user_id,
            user_id.to_owned(),
        )
        .await
    }

    pub async fn list_enabled() -> MailFabricResult<Vec<Connection>> {
        let all: Vec<Connection> =
            crate::modules::database::list_all_impl(DB_MANAGER.meta_db()).await?;
        Ok(all.into_iter().filter(|c| c.enabled).collect())
    }

    pub async fn paginate(
        page: Option<u64>,
        page_size: Option<u64>,
        desc: Option<bool>,
    ) -> MailFabricResult<Paginated<Connection>> {
        paginate_query_primary_scan_all_impl(DB_MANAGER.meta_db(), page, page_size, desc).await
    }

    pub async fn update_tokens(
        id: u64,
        access_token: String,
        refresh_token: String,
        expires_at: i64,
    ) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .secondary::<Connection>(ConnectionKey::id, id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("connection id={id} not found"),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |current| {
                let mut updated = current.clone();
                updated.access_token = Some(encrypt!(&access_token)?);
                updated.refresh_token = encrypt!(&refresh_token)?;
                updated.token_expires_at = expires_at;
                updated.updated_at = utc_now!();
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn delete(id: u64) -> MailFabricResult<()> {
        delete_impl(DB_MANAGER.meta_db(), move |rw| {
            rw.get()
                .secondary::<Connection>(ConnectionKey::id, id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .ok_or_else(|| {
                    raise_error!(
                        format!("connection id={id} not found"),
                        ErrorCode::ResourceNotFound
                    )
                })
        })
        .await
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConnectionCreateRequest {
    pub user_id: String,
    pub provider: Provider,
    pub email: String,
    pub display_name: Option<String>,
    pub oauth_client_id: String,
    pub oauth_client_secret: String,
    pub access_token: Option<String>,
    pub refresh_token: String,
    pub token_expires_at: Option<i64>,
    pub calendar_enabled: bool,
}
