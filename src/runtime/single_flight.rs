// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Keyed load-once cache.
//!
//! Lookup and first-load are serialized per key: concurrent callers for the
//! same key block on the one in-flight load instead of instantiating
//! duplicates. A failed load is not cached, so a later call can retry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub struct SingleFlightCache<V> {
    entries: RwLock<HashMap<String, V>>,
    /// Per-key guards; holding a key's inner mutex means a load for that key
    /// is in flight.
    guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    loads_performed: AtomicUsize,
}

impl<V> Default for SingleFlightCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            guards: Mutex::new(HashMap::new()),
            loads_performed: AtomicUsize::new(0),
        }
    }
}

impl<V: Clone> SingleFlightCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }

    /// Return the cached value for `key`, or run `load` exactly once even
    /// under concurrent callers and cache its result.
    pub async fn get_or_load<E, F, Fut>(&self, key: &str, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let key_guard = {
            let mut guards = self.guards.lock().await;
            guards
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _held = key_guard.lock().await;

        // Re-check after acquiring the guard: another caller may have won
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = load().await?;
        self.loads_performed.fetch_add(1, Ordering::Relaxed);
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(value)
    }

    /// Drop the cached value for `key`. Returns whether one was held.
    pub async fn remove(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drop every cached value, returning how many were held.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        count
    }

    /// Cached keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of underlying loads performed so far.
    pub fn loads_performed(&self) -> usize {
        self.loads_performed.load(Ordering::Relaxed)
    }
}
