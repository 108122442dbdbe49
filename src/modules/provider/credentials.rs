// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! Per-connection OAuth token refresh, serialized behind a single-flight
//! lock so two concurrent jobs for the same connection never race the
//! provider's token endpoint.

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailFabricResult;
use crate::modules::repository::entities::connection::{Connection, Provider};
use crate::{decrypt, raise_error, utc_now};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const MICROSOFT_TOKEN_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Tokens expiring within this window are refreshed eagerly rather than on
/// first failure, so an in-flight job rarely observes a `token_expired` error.
const REFRESH_SKEW_SECS: i64 = 120;

static REFRESH_LOCKS: LazyLock<DashMap<u64, Arc<Mutex<()>>>> = LazyLock::new(DashMap::new);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

fn lock_for(connection_id: u64) -> Arc<Mutex<()>> {
    REFRESH_LOCKS
        .entry(connection_id)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Returns a valid decrypted bearer token for `connection`, refreshing it
/// first if it's expired or about to expire.
pub async fn valid_access_token(connection: &Connection) -> MailFabricResult<String> {
    let lock = lock_for(connection.id);
    let _guard = lock.lock().await;

    // Re-read after acquiring the lock: another task may have refreshed while we waited.
    let current = Connection::get(connection.id)
        .await?
        .ok_or_else(|| raise_error!("connection disappeared during refresh".into(), ErrorCode::ResourceNotFound))?;

    if current.token_expires_at > utc_now!() + REFRESH_SKEW_SECS * 1000 {
        if let Some(token) = &current.access_token {
            return decrypt!(token);
        }
    }

    refresh(&current).await
}

async fn refresh(connection: &Connection) -> MailFabricResult<String> {
    let token_url = match connection.provider {
        Provider::Gmail => GOOGLE_TOKEN_URL,
        Provider::Graph => MICROSOFT_TOKEN_URL,
    };

    let client_id = connection.oauth_client_id.clone();
    let client_secret = decrypt!(&connection.oauth_client_secret)?;
    let refresh_token = decrypt!(&connection.refresh_token)?;

    let client = reqwest::Client::new();
    let response = client
        .post(token_url)
        .form(&[
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await
        .map_err(|e| raise_error!(format!("token refresh request failed: {:#?}", e), ErrorCode::NetworkError))?;

    if !response.status().is_success() {
        return Err(raise_error!(
            format!("token refresh rejected with status {}", response.status()),
            ErrorCode::NetworkError
        ));
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| raise_error!(format!("malformed token response: {:#?}", e), ErrorCode::NetworkError))?;

    let expires_at = utc_now!() + body.expires_in * 1000;
    let next_refresh_token = body.refresh_token.unwrap_or(refresh_token);

    Connection::update_tokens(
        connection.id,
        body.access_token.clone(),
        next_refresh_token,
        expires_at,
    )
    .await?;

    Ok(body.access_token)
}
