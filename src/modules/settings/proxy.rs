use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

use crate::{
    id,
    modules::{
        database::{async_find_impl, delete_impl, insert_impl, list_all_impl, manager::DB_MANAGER, update_impl},
        error::{code::ErrorCode, MailFabricResult},
    },
    raise_error, utc_now,
};

/// An outbound proxy used when a connection's provider calls must be routed
/// through it (e.g. for IP allow-listing on corporate Gmail/Graph tenants).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[native_model(id = 15, version = 1)]
#[native_db]
pub struct Proxy {
    #[primary_key]
    pub id: u64,

    /// e.g. "socks5://127.0.0.1:1080" or "http://127.0.0.1:8080".
    pub url: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Proxy {
    pub fn new(url: String) -> Self {
        Self {
            id: id!(64),
            url,
            created_at: utc_now!(),
            updated_at: utc_now!(),
        }
    }

    pub async fn get(id: u64) -> MailFabricResult<Proxy> {
        async_find_impl(DB_MANAGER.meta_db(), id)
            .await?
            .ok_or_else(|| raise_error!(format!("Proxy with id={} not found", id), ErrorCode::ResourceNotFound))
    }

    pub async fn list_all() -> MailFabricResult<Vec<Proxy>> {
        list_all_impl(DB_MANAGER.meta_db()).await
    }

    pub async fn delete(id: u64) -> MailFabricResult<()> {
        delete_impl(DB_MANAGER.meta_db(), move |rw| {
            rw.get()
                .primary::<Proxy>(id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .ok_or_else(|| raise_error!("proxy missing".into(), ErrorCode::InternalError))
        })
        .await
    }

    pub async fn update(id: u64, url: String) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary::<Proxy>(id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| raise_error!(format!("Proxy with id={} not found", id), ErrorCode::ResourceNotFound))
            },
            move |current| {
                let mut updated = current.clone();
                updated.url = url;
                updated.updated_at = utc_now!();
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn save(self) -> MailFabricResult<()> {
        self.validate()?;
        insert_impl(DB_MANAGER.meta_db(), self).await
    }

    /// Accepts only the schemes reqwest::Proxy understands for provider calls.
    pub fn validate(&self) -> MailFabricResult<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| raise_error!(format!("Invalid proxy URL '{}': {}", self.url, e), ErrorCode::InvalidParameter))?;
        match parsed.scheme() {
            "http" | "https" | "socks5" | "socks5h" => Ok(()),
            other => Err(raise_error!(
                format!("Unsupported proxy scheme '{}': expected http, https or socks5", other),
                ErrorCode::InvalidParameter
            )),
        }
    }

    pub fn to_reqwest_proxy(&self) -> MailFabricResult<reqwest::Proxy> {
        reqwest::Proxy::all(&self.url)
            .map_err(|e| raise_error!(format!("Failed to build proxy: {}", e), ErrorCode::InvalidParameter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_proxy_urls() {
        let urls = vec!["socks5://127.0.0.1:1080", "http://127.0.0.1:8080"];
        for url in urls {
            let proxy = Proxy::new(url.to_string());
            assert!(proxy.validate().is_ok(), "URL should be valid: {}", url);
        }
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        let proxy = Proxy::new("ftp://127.0.0.1:21".to_string());
        assert!(proxy.validate().is_err());
    }
}
