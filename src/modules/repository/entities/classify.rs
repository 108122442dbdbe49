// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::{
    modules::{
        database::{manager::DB_MANAGER, async_find_impl, upsert_impl},
        error::MailFabricResult,
    },
    utc_now,
};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// Per-user classification rules consulted first by the pipeline; a hit here
/// short-circuits the header/domain/LLM stages entirely.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[native_model(id = 30, version = 1)]
#[native_db]
pub struct ClassificationRulesEntity {
    #[primary_key]
    pub user_id: String,
    pub important_domains: Vec<String>,
    pub important_keywords: Vec<String>,
    pub ignore_senders: Vec<String>,
    pub ignore_keywords: Vec<String>,
    pub prompt_rules: Vec<String>,
    pub updated_at: i64,
}

impl ClassificationRulesEntity {
    pub fn matches_important(&self, from_domain: &str, subject: &str, body: &str) -> bool {
        self.important_domains.iter().any(|d| d == from_domain)
            || self
                .important_keywords
                .iter()
                .any(|k| subject.contains(k.as_str()) || body.contains(k.as_str()))
    }

    pub fn matches_ignore(&self, from_email: &str, subject: &str, body: &str) -> bool {
        self.ignore_senders.iter().any(|s| s == from_email)
            || self
                .ignore_keywords
                .iter()
                .any(|k| subject.contains(k.as_str()) || body.contains(k.as_str()))
    }

    pub async fn get(user_id: &str) -> MailFabricResult<Option<ClassificationRulesEntity>> {
        async_find_impl(DB_MANAGER.meta_db(), user_id.to_owned()).await
    }

    pub async fn upsert(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }
}

/// Learned category/priority for a single (user, from-email) pair, built up
/// from observed user actions (star, archive, read) over time.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 31, version = 1)]
#[native_db(primary_key(pk -> String))]
pub struct SenderProfile {
    #[secondary_key]
    pub user_id: String,
    pub from_email: String,
    pub learned_category: Option<String>,
    pub learned_priority: Option<f32>,
    pub observed_count: u32,
    pub updated_at: i64,
}

impl SenderProfile {
    fn pk(&self) -> String {
        format!("{}_{}", self.user_id, self.from_email)
    }

    pub fn new(user_id: String, from_email: String) -> Self {
        Self {
            user_id,
            from_email,
            learned_category: None,
            learned_priority: None,
            observed_count: 0,
            updated_at: utc_now!(),
        }
    }

    pub async fn get(user_id: &str, from_email: &str) -> MailFabricResult<Option<SenderProfile>> {
        async_find_impl(
            DB_MANAGER.meta_db(),
            format!("{user_id}_{from_email}"),
        )
        .await
    }

    pub async fn upsert(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }
}

/// Global domain → default category table, seeded independently of any user.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 32, version = 1)]
#[native_db]
pub struct KnownDomain {
    #[primary_key]
    pub domain: String,
    pub default_category: String,
}

impl KnownDomain {
    pub async fn get(domain: &str) -> MailFabricResult<Option<KnownDomain>> {
        async_find_impl(DB_MANAGER.meta_db(), domain.to_owned()).await
    }

    pub async fn upsert(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }
}
