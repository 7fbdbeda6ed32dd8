//! `Dragonfly` (Redis-compatible) lease locks and hot report cache.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `lock:job:{name}` | String | Scheduler lease, value is the holder's token |
//! | `market:report:{zone}:{market}` | JSON | Last market report of a group |

use std::time::Duration;

use fred::interfaces::LuaInterface;
use fred::prelude::*;
use fred::types::{Expiration, SetOptions};
use serde::Serialize;
use serde::de::DeserializeOwned;
use syndicate_core::store::market_report_key;
use syndicate_core::{LeaseLock, LeaseToken, ReportCache, StoreError};
use syndicate_economy::MarketReport;
use syndicate_types::{MarketCategory, ZoneKey};

use crate::error::DbError;

/// Deletes the key only while it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Serialize `value` as JSON and store it at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if serialization fails.
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: () = self.client.set(key, json.as_str(), None, None, false).await?;
        Ok(())
    }

    /// Read the value at `key` and deserialize from JSON. `None` if unset.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if deserialization fails.
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        value
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(DbError::from)
    }

    /// Delete a key from `Dragonfly`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), DbError> {
        let _: u32 = self.client.del(key).await?;
        Ok(())
    }

    /// Flush all keys. Use only in tests.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), DbError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }

    /// Return a reference to the underlying `fred` client.
    pub const fn client(&self) -> &Client {
        &self.client
    }

    async fn acquire(&self, key: &str, lease: Duration) -> Result<Option<LeaseToken>, DbError> {
        let token = LeaseToken::generate();
        let millis = i64::try_from(lease.as_millis()).unwrap_or(i64::MAX).max(1);
        let reply: Option<String> = self
            .client
            .set(
                key,
                token.as_str(),
                Some(Expiration::PX(millis)),
                Some(SetOptions::NX),
                false,
            )
            .await?;
        Ok(reply.map(|_| token))
    }

    async fn release_if_held(&self, key: &str, token: &LeaseToken) -> Result<bool, DbError> {
        let removed: i64 = self
            .client
            .eval(
                RELEASE_SCRIPT,
                vec![key.to_owned()],
                vec![token.as_str().to_owned()],
            )
            .await?;
        Ok(removed > 0)
    }
}

impl std::fmt::Debug for DragonflyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragonflyPool").finish_non_exhaustive()
    }
}

impl LeaseLock for DragonflyPool {
    async fn try_acquire(&self, key: &str, lease: Duration) -> Result<Option<LeaseToken>, StoreError> {
        Ok(self.acquire(key, lease).await?)
    }

    async fn release(&self, key: &str, token: &LeaseToken) -> Result<bool, StoreError> {
        Ok(self.release_if_held(key, token).await?)
    }
}

impl ReportCache for DragonflyPool {
    async fn put_market_report(&self, report: &MarketReport) -> Result<(), StoreError> {
        let key = market_report_key(&report.zone, report.market);
        Ok(self.set_json(&key, report).await?)
    }

    async fn market_report(
        &self,
        zone: &ZoneKey,
        market: MarketCategory,
    ) -> Result<Option<MarketReport>, StoreError> {
        Ok(self.get_json(&market_report_key(zone, market)).await?)
    }
}
