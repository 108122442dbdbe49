// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! A single polymorphic surface over the providers a [`Connection`] can point
//! at. Each adapter normalizes the wire format of its own provider into
//! [`ProviderMailMessage`]; everything above this module (the sync engine,
//! the classification pipeline, the modifier queue) only ever sees that
//! shape, never a Gmail or Graph payload directly.

pub mod credentials;
pub mod gmail;
pub mod graph;
pub mod pool;

use serde::{Deserialize, Serialize};

/// RFC/provider headers the classification pipeline keys off. Gmail and
/// Graph both pass these through verbatim from the underlying message.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClassificationHeaders {
    pub list_unsubscribe: Option<String>,
    pub precedence: Option<String>,
    pub auto_submitted: Option<String>,
    pub list_id: Option<String>,
    pub x_github_reason: Option<String>,
    pub x_gitlab_project_path: Option<String>,
    pub x_jira_fingerprint: Option<String>,
    pub x_sentry_project: Option<String>,
    pub esp_flags: Vec<String>,
}

/// A message normalized from whatever the provider returned.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProviderMailMessage {
    pub external_id: String,
    pub thread_id: String,
    pub subject: String,
    pub from_addr: String,
    pub to_addrs: Vec<String>,
    pub cc_addrs: Vec<String>,
    pub internal_date: i64,
    pub snippet: String,
    pub labels: Vec<String>,
    pub headers: ClassificationHeaders,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
}

/// A page of id-only results from a list call, used to fan the init-plan sync out.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageIdPage {
    pub external_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// The result of a delta/history sync: additions by id, deletions by id, and
/// the opaque cursor to persist for the next call.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeltaResult {
    pub added_or_changed: Vec<String>,
    pub deleted: Vec<String>,
    pub next_cursor: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ProviderErrorCode {
    AuthError,
    TokenExpired,
    RateLimit,
    NotFound,
    NetworkError,
    ServerError,
    InvalidInput,
    FullSyncRequired,
}

#[derive(Debug)]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub retryable: bool,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        let retryable = matches!(
            code,
            ProviderErrorCode::RateLimit | ProviderErrorCode::NetworkError | ProviderErrorCode::ServerError
        );
        Self {
            code,
            retryable,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ProviderError {}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// The action a modifier applies, shared by both adapters' `modify` calls.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ModifyAction {
    Read,
    Unread,
    Star,
    Unstar,
    Archive,
    Trash,
    Move,
    Labels,
}

/// A renewed or freshly created push subscription.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: String,
    pub resource_id: String,
    pub expires_at: i64,
}
