use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::{config::SupabaseConfig, model::user_iot_account::UserIotAccount};

const LINK_TABLE: &str = "user_iot_accounts";

/// Persistence for link records.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Inserts the record or overwrites the one with the same
    /// `(user_id, provider)`.
    async fn upsert(&self, account: &UserIotAccount) -> Result<()>;

    async fn find(&self, user_id: &str, provider: &str) -> Result<Option<UserIotAccount>>;
}

/// Link store backed by Supabase's PostgREST interface.
pub struct SupabaseLinkStore {
    client: reqwest::Client,
    table_url: String,
}

impl SupabaseLinkStore {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&config.service_key)?);
        headers.insert(
            reqwest::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.service_key))?,
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            table_url: format!("{}/rest/v1/{LINK_TABLE}", config.url),
        })
    }
}

#[async_trait]
impl LinkStore for SupabaseLinkStore {
    async fn upsert(&self, account: &UserIotAccount) -> Result<()> {
        let response = self
            .client
            .post(&self.table_url)
            .query(&[("on_conflict", "user_id,provider")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[account])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("supabase upsert failed ({status}): {text}"));
        }
        Ok(())
    }

    async fn find(&self, user_id: &str, provider: &str) -> Result<Option<UserIotAccount>> {
        let response = self
            .client
            .get(&self.table_url)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("provider", format!("eq.{provider}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("supabase select failed ({status}): {text}"));
        }

        let rows: Vec<UserIotAccount> = response.json().await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;

    use tokio::sync::RwLock;

    use super::*;

    /// In-process stand-in with the same conflict key as the real table.
    #[derive(Default)]
    pub struct MemoryLinkStore {
        rows: RwLock<HashMap<(String, String), UserIotAccount>>,
    }

    impl MemoryLinkStore {
        pub async fn len(&self) -> usize {
            self.rows.read().await.len()
        }
    }

    #[async_trait]
    impl LinkStore for MemoryLinkStore {
        async fn upsert(&self, account: &UserIotAccount) -> Result<()> {
            let key = (account.user_id.clone(), account.provider.clone());
            self.rows.write().await.insert(key, account.clone());
            Ok(())
        }

        async fn find(&self, user_id: &str, provider: &str) -> Result<Option<UserIotAccount>> {
            let key = (user_id.to_string(), provider.to_string());
            Ok(self.rows.read().await.get(&key).cloned())
        }
    }
}
