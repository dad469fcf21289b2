use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// Upper bound on any token lifetime, vendor supplied or configured.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    fetched_at: DateTime<Utc>,
    ttl: Duration,
}

impl CachedToken {
    fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return true;
        };
        self.fetched_at
            .checked_add_signed(ttl)
            .map_or(true, |expiry| now < expiry)
    }
}

/// Holds at most one vendor access token for the lifetime of the process.
///
/// Reads and writes are not coordinated beyond the lock: two concurrent
/// misses may both fetch, and the later `store` wins.
#[derive(Debug)]
pub struct TokenCache {
    default_ttl: Duration,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            slot: RwLock::new(None),
        }
    }

    /// Returns the cached token if it has not outlived its TTL.
    pub async fn get(&self) -> Option<String> {
        self.get_at(Utc::now()).await
    }

    async fn get_at(&self, now: DateTime<Utc>) -> Option<String> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|cached| cached.is_fresh_at(now))
            .map(|cached| cached.token.clone())
    }

    /// Caches `token`, using the vendor supplied lifetime when there is one.
    /// Lifetimes are clamped to [`MAX_TOKEN_TTL`].
    pub async fn store(&self, token: String, ttl: Option<Duration>) {
        self.store_at(token, ttl, Utc::now()).await;
    }

    async fn store_at(&self, token: String, ttl: Option<Duration>, fetched_at: DateTime<Utc>) {
        let mut slot = self.slot.write().await;
        *slot = Some(CachedToken {
            token,
            fetched_at,
            ttl: ttl.unwrap_or(self.default_ttl).min(MAX_TOKEN_TTL),
        });
    }

    pub async fn invalidate(&self) {
        self.slot.write().await.take();
    }
}
