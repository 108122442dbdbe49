// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! Gmail REST v1 adapter. Speaks JSON over `reqwest` (rustls, HTTP/2
//! preferred); every call takes a bearer token resolved by
//! [`super::credentials::valid_access_token`] and never caches it itself.

use super::{
    ClassificationHeaders, DeltaResult, MessageIdPage, ModifyAction, ProviderError,
    ProviderErrorCode, ProviderMailMessage, ProviderResult, Subscription,
};
use crate::utc_now;
use serde::Deserialize;
use serde_json::json;

const BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

pub struct GmailAdapter {
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ListMessagesResponse {
    messages: Option<Vec<MessageRef>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
struct GmailMessage {
    id: String,
    #[serde(rename = "threadId")]
    thread_id: String,
    snippet: Option<String>,
    #[serde(rename = "labelIds", default)]
    label_ids: Vec<String>,
    #[serde(rename = "internalDate")]
    internal_date: Option<String>,
    payload: Option<GmailPayload>,
}

#[derive(Deserialize)]
struct GmailPayload {
    headers: Vec<GmailHeader>,
    #[serde(default)]
    parts: Vec<GmailPayload>,
    body: Option<GmailBody>,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
}

#[derive(Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct GmailBody {
    data: Option<String>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    history: Option<Vec<HistoryRecord>>,
    #[serde(rename = "historyId")]
    history_id: Option<String>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct HistoryRecord {
    #[serde(rename = "messagesAdded", default)]
    messages_added: Vec<HistoryMessageRef>,
    #[serde(rename = "messagesDeleted", default)]
    messages_deleted: Vec<HistoryMessageRef>,
}

#[derive(Deserialize)]
struct HistoryMessageRef {
    message: MessageRef,
}

#[derive(Deserialize)]
struct WatchResponse {
    #[serde(rename = "historyId")]
    history_id: String,
    expiration: String,
}

impl GmailAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn map_transport_error(err: reqwest::Error) -> ProviderError {
        ProviderError::new(ProviderErrorCode::NetworkError, err.to_string())
    }

    async fn map_status_error(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let code = match status.as_u16() {
            401 => ProviderErrorCode::TokenExpired,
            403 | 429 => ProviderErrorCode::RateLimit,
            404 => ProviderErrorCode::NotFound,
            400 | 422 => ProviderErrorCode::InvalidInput,
            500..=599 => ProviderErrorCode::ServerError,
            _ => ProviderErrorCode::ServerError,
        };
        ProviderError::new(code, format!("gmail responded {}: {}", status, body))
    }

    pub async fn list_message_ids(
        &self,
        access_token: &str,
        query: &str,
        page_token: Option<&str>,
    ) -> ProviderResult<MessageIdPage> {
        let mut request = self
            .client
            .get(format!("{BASE_URL}/messages"))
            .bearer_auth(access_token)
            .query(&[("q", query), ("maxResults", "100")]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.map_err(Self::map_transport_error)?;
        if !response.status().is_success() {
            return Err(Self::map_status_error(response).await);
        }

        let body: ListMessagesResponse = response
            .json()
            .await
            .map_err(Self::map_transport_error)?;

        Ok(MessageIdPage {
            external_ids: body
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(|m| m.id)
                .collect(),
            next_page_token: body.next_page_token,
        })
    }

    pub async fn get_message(
        &self,
        access_token: &str,
        external_id: &str,
    ) -> ProviderResult<ProviderMailMessage> {
        let response = self
            .client
            .get(format!("{BASE_URL}/messages/{external_id}"))
            .bearer_auth(access_token)
            .query(&[("format", "full")])
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::map_status_error(response).await);
        }

        let message: GmailMessage = response.json().await.map_err(Self::map_transport_error)?;
        Ok(normalize_message(message))
    }

    pub async fn delta(
        &self,
        access_token: &str,
        history_id: &str,
    ) -> ProviderResult<DeltaResult> {
        let response = self
            .client
            .get(format!("{BASE_URL}/history"))
            .bearer_auth(access_token)
            .query(&[("startHistoryId", history_id)])
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if response.status().as_u16() == 404 {
            return Err(ProviderError::new(
                ProviderErrorCode::FullSyncRequired,
                "history id too old, gmail expired it".into(),
            ));
        }
        if !response.status().is_success() {
            return Err(Self::map_status_error(response).await);
        }

        let body: HistoryResponse = response.json().await.map_err(Self::map_transport_error)?;
        let mut added_or_changed = Vec::new();
        let mut deleted = Vec::new();
        for record in body.history.unwrap_or_default() {
            added_or_changed.extend(record.messages_added.into_iter().map(|m| m.message.id));
            deleted.extend(record.messages_deleted.into_iter().map(|m| m.message.id));
        }

        Ok(DeltaResult {
            added_or_changed,
            deleted,
            next_cursor: body.history_id,
        })
    }

    pub async fn modify(
        &self,
        access_token: &str,
        external_id: &str,
        action: ModifyAction,
        add_labels: &[String],
        remove_labels: &[String],
    ) -> ProviderResult<()> {
        let (add, remove) = match action {
            ModifyAction::Read => (vec![], vec!["UNREAD".to_string()]),
            ModifyAction::Unread => (vec!["UNREAD".to_string()], vec![]),
            ModifyAction::Star => (vec!["STARRED".to_string()], vec![]),
            ModifyAction::Unstar => (vec![], vec!["STARRED".to_string()]),
            ModifyAction::Archive => (vec![], vec!["INBOX".to_string()]),
            ModifyAction::Trash => (vec!["TRASH".to_string()], vec!["INBOX".to_string()]),
            ModifyAction::Move | ModifyAction::Labels => {
                (add_labels.to_vec(), remove_labels.to_vec())
            }
        };

        let response = self
            .client
            .post(format!("{BASE_URL}/messages/{external_id}/modify"))
            .bearer_auth(access_token)
            .json(&json!({ "addLabelIds": add, "removeLabelIds": remove }))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::map_status_error(response).await);
        }
        Ok(())
    }

    pub async fn watch(&self, access_token: &str, topic_name: &str) -> ProviderResult<Subscription> {
        let response = self
            .client
            .post(format!("{BASE_URL}/watch"))
            .bearer_auth(access_token)
            .json(&json!({ "topicName": topic_name, "labelFilterAction": "include" }))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::map_status_error(response).await);
        }

        let body: WatchResponse = response.json().await.map_err(Self::map_transport_error)?;
        let expires_at: i64 = body.expiration.parse().unwrap_or(utc_now!());
        Ok(Subscription {
            subscription_id: body.history_id,
            resource_id: topic_name.to_string(),
            expires_at,
        })
    }

    pub async fn unwatch(&self, access_token: &str) -> ProviderResult<()> {
        let response = self
            .client
            .post(format!("{BASE_URL}/stop"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(Self::map_status_error(response).await);
        }
        Ok(())
    }
}

fn normalize_message(message: GmailMessage) -> ProviderMailMessage {
    let headers = message
        .payload
        .as_ref()
        .map(|p| p.headers.as_slice())
        .unwrap_or(&[]);
    let header_value = |name: &str| {
        headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
    };

    let classification_headers = ClassificationHeaders {
        list_unsubscribe: header_value("List-Unsubscribe"),
        precedence: header_value("Precedence"),
        auto_submitted: header_value("Auto-Submitted"),
        list_id: header_value("List-Id"),
        x_github_reason: header_value("X-GitHub-Reason"),
        x_gitlab_project_path: header_value("X-Gitlab-Project-Path"),
        x_jira_fingerprint: header_value("X-JIRA-FingerPrint"),
        x_sentry_project: header_value("X-Sentry-Project"),
        esp_flags: Vec::new(),
    };

    let to_addrs = header_value("To")
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();
    let cc_addrs = header_value("Cc")
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let (html_body, text_body) = message
        .payload
        .map(extract_bodies)
        .unwrap_or((None, None));

    ProviderMailMessage {
        external_id: message.id,
        thread_id: message.thread_id,
        subject: header_value("Subject").unwrap_or_default(),
        from_addr: header_value("From").unwrap_or_default(),
        to_addrs,
        cc_addrs,
        internal_date: message
            .internal_date
            .and_then(|d| d.parse().ok())
            .unwrap_or_else(|| utc_now!()),
        snippet: message.snippet.unwrap_or_default(),
        labels: message.label_ids,
        headers: classification_headers,
        html_body,
        text_body,
    }
}

fn extract_bodies(payload: GmailPayload) -> (Option<String>, Option<String>) {
    let mut html = None;
    let mut text = None;
    decode_part(&payload, &mut html, &mut text);
    (html, text)
}

fn decode_part(part: &GmailPayload, html: &mut Option<String>, text: &mut Option<String>) {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    let decode = |data: &str| {
        URL_SAFE_NO_PAD
            .decode(data)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    };

    match part.mime_type.as_deref() {
        Some("text/html") => {
            if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
                *html = decode(data);
            }
        }
        Some("text/plain") => {
            if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
                *text = decode(data);
            }
        }
        _ => {}
    }

    for child in &part.parts {
        decode_part(child, html, text);
    }
}
