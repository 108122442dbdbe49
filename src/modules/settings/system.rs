use crate::modules::database::manager::DB_MANAGER;
use crate::modules::database::{find_impl, upsert_impl};
use crate::modules::error::MailFabricResult;
use crate::utc_now;
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[native_model(id = 2, version = 1)]
#[native_db]
pub struct SystemSetting {
    #[primary_key]
    pub key: String,
    pub value: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SystemSetting {
    pub fn new(key: String, value: String) -> Self {
        Self {
            key,
            value,
            created_at: utc_now!(),
            updated_at: utc_now!(),
        }
    }

    pub async fn save(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    pub fn get(key: &str) -> MailFabricResult<Option<SystemSetting>> {
        find_impl(DB_MANAGER.meta_db(), key)
    }

    pub fn get_existing_value(key: &str) -> MailFabricResult<Option<String>> {
        let setting = Self::get(key)?;
        Ok(setting.map(|s| s.value))
    }

    pub async fn save_value(key: &str, value: String) -> MailFabricResult<()> {
        let setting = Self::new(key.to_string(), value);
        setting.save().await
    }
}
