// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! Per-user fan-out for events clients want to observe live: sync progress,
//! new mail, classification results, modifier conflicts. A `DashMap` keyed by
//! user id holds one `broadcast` channel per subscriber population; publishing
//! to a user nobody is listening to is a cheap no-op (`send` on a channel with
//! no receivers just returns an error we ignore).

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

pub static REALTIME_BUS: LazyLock<RealtimeBus> = LazyLock::new(RealtimeBus::new);

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RealtimeEvent {
    SyncProgress {
        connection_id: u64,
        phase: String,
        synced_count: u64,
        total_count: u64,
    },
    MailReceived {
        connection_id: u64,
        mail_id: u64,
        subject: String,
    },
    MailClassified {
        mail_id: u64,
        category: Option<String>,
        priority: f32,
        is_urgent: bool,
    },
    ModifierConflict {
        modifier_id: u64,
        email_id: u64,
    },
    WebhookRenewed {
        connection_id: u64,
        expires_at: i64,
    },
    /// Generic fallback for anything routed through `NotificationService`
    /// that doesn't carry its own structured event above.
    Notification {
        kind: String,
        title: String,
        body: String,
    },
}

pub struct RealtimeBus {
    channels: DashMap<String, broadcast::Sender<RealtimeEvent>>,
}

impl RealtimeBus {
    fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Returns a receiver for `user_id`'s event stream, creating the channel
    /// on first subscription.
    pub fn subscribe(&self, user_id: &str) -> broadcast::Receiver<RealtimeEvent> {
        self.channels
            .entry(user_id.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publishes `event` to `user_id`'s subscribers, if any exist. Dropping
    /// the event when nobody is listening is the correct behavior: this bus
    /// is a live tap, not a durable queue.
    pub fn publish(&self, user_id: &str, event: RealtimeEvent) {
        if let Some(sender) = self.channels.get(user_id) {
            let _ = sender.send(event);
        }
    }
}
