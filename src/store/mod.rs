//!
//! # Key-Value Store
//!
//! Every record the application keeps (users, posts, and the email outbox) lives in a
//! key-value store addressed by string keys. Keys are namespaced by prefix:
//! `user:{email}`, `post:{id}`, `posts:list`, `email:{id}`, `email:queue`.
//!
//! The `KeyValueStore` trait is the seam between the application and the backing
//! store. `RedisStore` is used in production; `MemoryStore` keeps everything in
//! process and is what the test suites run against.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Errors raised by a `KeyValueStore` implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (connection refused, dropped, timed out).
    Unavailable(String),
    /// The store was reachable but rejected the command (e.g. a key holds the wrong type).
    Command(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
            StoreError::Command(msg) => write!(f, "Store command failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// The operations the application needs from its datastore.
///
/// List operations follow Redis semantics: `list_push` inserts at the head,
/// `list_pop` removes from the tail, and `list_range` accepts negative indices
/// counting back from the tail (`-1` is the last element). A pop must be atomic:
/// two concurrent callers never receive the same element.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value. With `ttl`, the key
    /// disappears once the duration has elapsed.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Removes `key`. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    async fn list_push(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn list_pop(&self, key: &str) -> StoreResult<Option<String>>;

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>>;

    async fn list_len(&self, key: &str) -> StoreResult<usize>;

    /// Returns every live key starting with `prefix`, in no particular order.
    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()>;

    /// Returns all fields of the hash at `key`; an empty map when the key is absent.
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;
}
