// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! Microsoft Graph adapter for Outlook mailboxes, built on `graph-rs-sdk`.
//! Graph has no history-id equivalent: incremental sync uses a delta link,
//! an opaque URL the service hands back and which we treat as
//! always-accepted (adapter-local monotonicity, see `SyncCursor`).

use super::{
    ClassificationHeaders, DeltaResult, MessageIdPage, ModifyAction, ProviderError,
    ProviderErrorCode, ProviderMailMessage, ProviderResult, Subscription,
};
use crate::utc_now;
use graph_rs_sdk::GraphClient;
use serde_json::{json, Value};

pub struct GraphAdapter {
    client: GraphClient,
}

impl GraphAdapter {
    pub fn new(access_token: &str) -> Self {
        Self {
            client: GraphClient::new(access_token),
        }
    }

    fn map_error(err: graph_rs_sdk::http::GraphFailure) -> ProviderError {
        let message = err.to_string();
        let code = match err {
            graph_rs_sdk::http::GraphFailure::GraphError(ref e) => match e.error_info() {
                info if info.contains("InvalidAuthenticationToken") => ProviderErrorCode::TokenExpired,
                info if info.contains("TooManyRequests") => ProviderErrorCode::RateLimit,
                info if info.contains("ItemNotFound") => ProviderErrorCode::NotFound,
                _ => ProviderErrorCode::ServerError,
            },
            _ => ProviderErrorCode::NetworkError,
        };
        ProviderError::new(code, message)
    }

    pub async fn list_message_ids(
        &self,
        folder: &str,
        skip_token: Option<&str>,
    ) -> ProviderResult<MessageIdPage> {
        let mut request = self
            .client
            .v1()
            .me()
            .mail_folder(folder)
            .messages()
            .list_messages()
            .select(&["id"])
            .top("100");
        if let Some(token) = skip_token {
            request = request.skip_token(token);
        }

        let response = request.send().await.map_err(Self::map_error)?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorCode::ServerError, e.to_string()))?;

        let external_ids = body["value"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let next_page_token = body["@odata.nextLink"]
            .as_str()
            .map(|s| s.to_string());

        Ok(MessageIdPage {
            external_ids,
            next_page_token,
        })
    }

    pub async fn get_message(&self, external_id: &str) -> ProviderResult<ProviderMailMessage> {
        let response = self
            .client
            .v1()
            .me()
            .message(external_id)
            .get_messages()
            .send()
            .await
            .map_err(Self::map_error)?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorCode::ServerError, e.to_string()))?;

        Ok(normalize_message(&body))
    }

    pub async fn delta(&self, delta_link: Option<&str>) -> ProviderResult<DeltaResult> {
        let response = match delta_link {
            Some(link) => self.client.url(link).get(&()).send().await,
            None => {
                self.client
                    .v1()
                    .me()
                    .mail_folder("inbox")
                    .messages()
                    .delta()
                    .send()
                    .await
            }
        }
        .map_err(Self::map_error)?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorCode::ServerError, e.to_string()))?;

        let mut added_or_changed = Vec::new();
        let mut deleted = Vec::new();
        for item in body["value"].as_array().unwrap_or(&Vec::new()) {
            let Some(id) = item["id"].as_str() else { continue };
            if item.get("@removed").is_some() {
                deleted.push(id.to_string());
            } else {
                added_or_changed.push(id.to_string());
            }
        }

        let next_cursor = body["@odata.deltaLink"]
            .as_str()
            .or_else(|| body["@odata.nextLink"].as_str())
            .map(|s| s.to_string());

        Ok(DeltaResult {
            added_or_changed,
            deleted,
            next_cursor,
        })
    }

    pub async fn modify(
        &self,
        external_id: &str,
        action: ModifyAction,
        add_labels: &[String],
    ) -> ProviderResult<()> {
        let body = match action {
            ModifyAction::Read => json!({ "isRead": true }),
            ModifyAction::Unread => json!({ "isRead": false }),
            ModifyAction::Star | ModifyAction::Unstar => {
                json!({ "flag": { "flagStatus": if matches!(action, ModifyAction::Star) { "flagged" } else { "notFlagged" } } })
            }
            ModifyAction::Archive => json!({ "categories": [] }),
            ModifyAction::Trash => return self.move_to_folder(external_id, "deleteditems").await,
            ModifyAction::Move => return self.move_to_folder(external_id, add_labels.first().map(String::as_str).unwrap_or("inbox")).await,
            ModifyAction::Labels => json!({ "categories": add_labels }),
        };

        self.client
            .v1()
            .me()
            .message(external_id)
            .update_messages(&body)
            .send()
            .await
            .map_err(Self::map_error)?;
        Ok(())
    }

    async fn move_to_folder(&self, external_id: &str, folder: &str) -> ProviderResult<()> {
        self.client
            .v1()
            .me()
            .message(external_id)
            .move_message(&json!({ "destinationId": folder }))
            .send()
            .await
            .map_err(Self::map_error)?;
        Ok(())
    }

    pub async fn watch(&self, notification_url: &str) -> ProviderResult<Subscription> {
        let expires_at = utc_now!() + 60 * 60 * 1000 * 24 * 3; // Graph caps mail subscriptions at ~3 days
        let response = self
            .client
            .v1()
            .subscriptions()
            .create_subscription(&json!({
                "changeType": "created,updated,deleted",
                "notificationUrl": notification_url,
                "resource": "me/mailFolders('inbox')/messages",
                "expirationDateTime": chrono::DateTime::from_timestamp_millis(expires_at)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default(),
            }))
            .send()
            .await
            .map_err(Self::map_error)?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorCode::ServerError, e.to_string()))?;

        Ok(Subscription {
            subscription_id: body["id"].as_str().unwrap_or_default().to_string(),
            resource_id: body["resource"].as_str().unwrap_or_default().to_string(),
            expires_at,
        })
    }

    pub async fn unwatch(&self, subscription_id: &str) -> ProviderResult<()> {
        self.client
            .v1()
            .subscription(subscription_id)
            .delete_subscription()
            .send()
            .await
            .map_err(Self::map_error)?;
        Ok(())
    }
}

fn normalize_message(body: &Value) -> ProviderMailMessage {
    let addrs = |key: &str| -> Vec<String> {
        body[key]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|a| a["emailAddress"]["address"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    };

    ProviderMailMessage {
        external_id: body["id"].as_str().unwrap_or_default().to_string(),
        thread_id: body["conversationId"].as_str().unwrap_or_default().to_string(),
        subject: body["subject"].as_str().unwrap_or_default().to_string(),
        from_addr: body["from"]["emailAddress"]["address"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        to_addrs: addrs("toRecipients"),
        cc_addrs: addrs("ccRecipients"),
        internal_date: chrono::DateTime::parse_from_rfc3339(
            body["receivedDateTime"].as_str().unwrap_or_default(),
        )
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|_| utc_now!()),
        snippet: body["bodyPreview"].as_str().unwrap_or_default().to_string(),
        labels: body["categories"]
            .as_array()
            .map(|items| items.iter().filter_map(|c| c.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        headers: ClassificationHeaders::default(),
        html_body: body["body"]["content"].as_str().map(str::to_string),
        text_body: None,
    }
}
