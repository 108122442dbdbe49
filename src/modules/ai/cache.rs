// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! Two-tier cache for LLM responses. L1 is an in-process
//! [`TimedLruCache`], consulted first; L2 is a [`CacheEntry`] row shared
//! across instances. Both are keyed by the same `blake3` fingerprint of the
//! normalized prompt, so a classify-batch re-delivery never re-calls the LLM.

use crate::modules::common::lru::TimedLruCache;
use crate::modules::context::RustMailTask;
use crate::modules::error::MailFabricResult;
use crate::modules::repository::entities::ai_cache::CacheEntry;
use crate::modules::scheduler::periodic::PeriodicTask;
use crate::modules::utils::content_fingerprint;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::info;

const L1_CAPACITY: usize = 10_000;
const L1_TTL: Duration = Duration::from_secs(600);
const L2_TTL_SECS: i64 = 60 * 60 * 24 * 7;

static L1: LazyLock<TimedLruCache<String, String>> =
    LazyLock::new(|| TimedLruCache::new(L1_CAPACITY, L1_TTL));

/// Looks up `prompt_key`'s cached response, checking L1 before falling back
/// to L2. A L2 hit is promoted back into L1 so the next lookup is in-process.
pub async fn get<T: DeserializeOwned>(prompt_key: &str) -> MailFabricResult<Option<T>> {
    let fingerprint = content_fingerprint(prompt_key);

    if let Some(cached) = L1.get(&fingerprint).await {
        return Ok(serde_json::from_str(&cached).ok());
    }

    if let Some(entry) = CacheEntry::get(&fingerprint).await? {
        L1.set(fingerprint, Arc::new(entry.response_json.clone())).await;
        return Ok(serde_json::from_str(&entry.response_json).ok());
    }

    Ok(None)
}

/// Persists `value` under `prompt_key`'s fingerprint in both tiers.
pub async fn set<T: Serialize>(prompt_key: &str, value: &T) -> MailFabricResult<()> {
    let fingerprint = content_fingerprint(prompt_key);
    let response_json = serde_json::to_string(value)
        .map_err(|e| crate::raise_error!(format!("{:#?}", e), crate::modules::error::code::ErrorCode::SerializationError))?;

    L1.set(fingerprint.clone(), Arc::new(response_json.clone())).await;
    CacheEntry::new(fingerprint, response_json, L2_TTL_SECS)
        .upsert()
        .await
}

/// Sweeps expired L2 cache rows; L1 evicts on its own via `TimedLruCache`'s TTL.
pub struct AICacheCleanupTask;

impl RustMailTask for AICacheCleanupTask {
    fn start() {
        let periodic_task = PeriodicTask::new("ai-cache-cleanup-task");
        let task = move |_: Option<u64>| {
            Box::pin(async move {
                let removed = CacheEntry::delete_expired().await?;
                if removed > 0 {
                    info!("ai cache cleanup removed {} expired entries", removed);
                }
                Ok(())
            })
        };
        periodic_task.start(task, None, Duration::from_secs(60 * 60), false, false);
    }
}
