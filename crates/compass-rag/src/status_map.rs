//! Keyed embedding-status table.
//!
//! Exactly one [`EmbeddingStatus`] per key. Every write is a single
//! read-modify-write under the table lock, so concurrent job completions
//! never interleave partial updates for the same key.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::RwLock;

use compass_core::EmbeddingStatus;

/// Shared status table. Clones share the same entries.
#[derive(Debug)]
pub struct StatusMap<K> {
    inner: Arc<RwLock<HashMap<K, EmbeddingStatus>>>,
}

impl<K> Clone for StatusMap<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K> Default for StatusMap<K> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K> StatusMap<K>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `pending` for every key not yet present and return the keys
    /// that were inserted. Keys already tracked, in any state, are skipped.
    pub async fn claim_new<I>(&self, keys: I) -> Vec<K>
    where
        I: IntoIterator<Item = K>,
    {
        let mut map = self.inner.write().await;
        let mut claimed = Vec::new();
        for key in keys {
            if !map.contains_key(&key) {
                map.insert(key.clone(), EmbeddingStatus::pending());
                claimed.push(key);
            }
        }
        claimed
    }

    /// Upsert the status for `key`.
    pub async fn set(&self, key: K, status: EmbeddingStatus) {
        self.inner.write().await.insert(key, status);
    }

    pub async fn get(&self, key: &K) -> Option<EmbeddingStatus> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &K) -> bool {
        self.inner.read().await.contains_key(key)
    }

    /// Copy of the whole table.
    pub async fn snapshot(&self) -> HashMap<K, EmbeddingStatus> {
        self.inner.read().await.clone()
    }

    /// Remove a terminal entry so the key can be claimed again.
    ///
    /// Returns `false` when the key is absent or still in flight.
    pub async fn invalidate(&self, key: &K) -> bool {
        let mut map = self.inner.write().await;
        match map.get(key) {
            Some(status) if !status.is_in_flight() => {
                map.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Remove an entry regardless of state.
    pub async fn remove(&self, key: &K) -> Option<EmbeddingStatus> {
        self.inner.write().await.remove(key)
    }

    /// Keep only the entries for which `keep` returns true. Returns the
    /// number removed.
    pub async fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&K, &EmbeddingStatus) -> bool,
    {
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|key, status| keep(key, status));
        before - map.len()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
