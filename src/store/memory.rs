use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{KeyValueStore, StoreError, StoreResult};

enum Value {
    Text(String),
    List(VecDeque<String>),
    Hash(HashMap<String, String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process `KeyValueStore` with Redis-compatible semantics.
///
/// Every operation runs under a single mutex, so list pops are atomic across
/// concurrent callers. Expired keys are dropped lazily on access.
/// `set_offline(true)` makes every call fail with `StoreError::Unavailable`,
/// which lets tests exercise the connectivity-loss paths.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    offline: AtomicBool,
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Command(format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value: {}",
        key
    ))
}

/// Resolves Redis-style inclusive, possibly negative, bounds against `len`.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Time left before `key` expires. `None` for a missing key or one without a TTL.
    pub fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let entries = self.lock()?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Entry>>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(entries)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.lock()?;
        match entries.get(key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(Value::Text(text)) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.lock()?;
        Ok(entries.remove(key).is_some())
    }

    async fn list_push(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.lock()?;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::List(VecDeque::new())));
        match &mut entry.value {
            Value::List(list) => {
                list.push_front(value.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn list_pop(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.lock()?;
        let (popped, now_empty) = match entries.get_mut(key).map(|entry| &mut entry.value) {
            None => return Ok(None),
            Some(Value::List(list)) => {
                let popped = list.pop_back();
                (popped, list.is_empty())
            }
            Some(_) => return Err(wrong_type(key)),
        };
        // Redis removes a list key once its last element is gone.
        if now_empty {
            entries.remove(key);
        }
        Ok(popped)
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        let entries = self.lock()?;
        match entries.get(key).map(|entry| &entry.value) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(match resolve_range(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            }),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_len(&self, key: &str) -> StoreResult<usize> {
        let entries = self.lock()?;
        match entries.get(key).map(|entry| &entry.value) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let entries = self.lock()?;
        Ok(entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        let mut entries = self.lock()?;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Hash(HashMap::new())));
        match &mut entry.value {
            Value::Hash(hash) => {
                for (field, value) in fields {
                    hash.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let entries = self.lock()?;
        match entries.get(key).map(|entry| &entry.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }
}
