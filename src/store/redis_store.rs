use async_trait::async_trait;
use log::info;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use super::{KeyValueStore, StoreError, StoreResult};

/// `KeyValueStore` backed by a Redis server.
///
/// Holds a `ConnectionManager`, which multiplexes commands over one connection and
/// transparently reconnects after the connection drops. Cloning is cheap and every
/// clone shares the same underlying connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Opens a connection to the Redis server at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis");
        Ok(Self { conn })
    }
}

impl From<RedisError> for StoreError {
    fn from(error: RedisError) -> StoreError {
        if error.is_io_error()
            || error.is_connection_refusal()
            || error.is_connection_dropped()
            || error.is_timeout()
        {
            StoreError::Unavailable(error.to_string())
        } else {
            StoreError::Command(error.to_string())
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        match ttl {
            // SET EX rejects zero, so anything under a second rounds up.
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn list_push(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn list_pop(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.rpop(key, None::<NonZeroUsize>).await?)
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, start, stop).await?)
    }

    async fn list_len(&self, key: &str) -> StoreResult<usize> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(key).await?)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.keys(format!("{}*", prefix)).await?)
    }

    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.hset_multiple::<_, _, _, ()>(key, fields).await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        Ok(conn.hgetall(key).await?)
    }
}
