//! Redis-backed store.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use url::Url;

use crate::config::DatabaseSettings;
use crate::store::StoreError;

/// Upper bound on the initial connect handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Open a connection and confirm the server answers `PING`.
    pub async fn connect(url: &Url) -> Result<Self, StoreError> {
        let client = redis::Client::open(url.as_str())?;

        let mut manager = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::ConnectTimeout(CONNECT_TIMEOUT))??;

        let _: String = redis::cmd("PING").query_async(&mut manager).await?;

        Ok(Self { manager })
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// `SET key value EX ttl`. Replaces the whole value.
    pub async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl_secs(ttl)).await?;
        Ok(())
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: () = conn.expire(key, expire_secs(ttl)).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

/// Redis rejects a zero expiry.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// `EXPIRE` takes a signed count.
fn expire_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl_secs(ttl)).unwrap_or(i64::MAX)
}

/// Build `redis://[user[:password]@]host:port` from the settings.
pub fn connection_url(settings: &DatabaseSettings) -> Result<Url, StoreError> {
    let mut url = Url::parse(&format!("redis://{}:{}", settings.url, settings.port))
        .map_err(|e| StoreError::InvalidTarget(e.to_string()))?;

    if !settings.user.is_empty() {
        url.set_username(&settings.user)
            .map_err(|_| StoreError::InvalidTarget("user cannot be set".into()))?;
    }
    if !settings.password.is_empty() {
        url.set_password(Some(&settings.password))
            .map_err(|_| StoreError::InvalidTarget("password cannot be set".into()))?;
    }

    Ok(url)
}

/// The connection URL with any password masked, for logs.
pub fn redacted_url(settings: &DatabaseSettings) -> String {
    match connection_url(settings) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => format!("redis://{}:{}", settings.url, settings.port),
    }
}
