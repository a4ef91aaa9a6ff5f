//! Process-wide cache of fetched result sets.
//!
//! Entries are keyed by connection name, the fully substituted SQL and the
//! fetch operation, so the same statement fetched as records and as rows is
//! stored twice. Writes issued through a builder invalidate every entry of
//! their connection.

use crate::record::Record;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Fetch flavor, part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Plain records (`fetch_all`).
    FetchAll,
    /// Hydrated rows (`fetch_rows`).
    FetchRows,
}

/// Query cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached result sets; `0` disables storage.
    pub capacity: usize,
    /// Whether lookups and stores are active.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Set the capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Enable or disable the cache.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    connection: String,
    sql: String,
    operation: Operation,
}

/// LRU cache of result sets.
#[derive(Debug)]
pub struct QueryCache {
    inner: Mutex<QueryCacheInner>,
    enabled: AtomicBool,
}

#[derive(Debug)]
struct QueryCacheInner {
    capacity: usize,
    map: HashMap<CacheKey, Arc<Vec<Record>>>,
    order: VecDeque<CacheKey>,
}

static GLOBAL: OnceLock<QueryCache> = OnceLock::new();

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl QueryCache {
    /// Create a standalone cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(QueryCacheInner {
                capacity: config.capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            enabled: AtomicBool::new(config.enabled),
        }
    }

    /// The process-wide cache used by query builders.
    pub fn global() -> &'static QueryCache {
        GLOBAL.get_or_init(QueryCache::default)
    }

    fn lock(&self) -> MutexGuard<'_, QueryCacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the cache is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turn the cache on or off. Disabling keeps existing entries.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Apply new settings, evicting entries beyond the new capacity.
    pub fn configure(&self, config: CacheConfig) {
        let mut inner = self.lock();
        inner.capacity = config.capacity;
        inner.evict_if_needed();
        self.enabled.store(config.enabled, Ordering::Relaxed);
    }

    /// Look up a cached result set.
    pub fn get(&self, connection: &str, sql: &str, operation: Operation) -> Option<Arc<Vec<Record>>> {
        if !self.is_enabled() {
            return None;
        }
        let key = CacheKey {
            connection: connection.to_string(),
            sql: sql.to_string(),
            operation,
        };
        let mut inner = self.lock();
        let rows = inner.map.get(&key).cloned()?;
        inner.touch(&key);
        tracing::trace!(target: "tabula.cache", connection, ?operation, "cache hit");
        Some(rows)
    }

    /// Store a result set, evicting the least recently used entries.
    pub fn put(
        &self,
        connection: &str,
        sql: &str,
        operation: Operation,
        rows: Vec<Record>,
    ) -> Arc<Vec<Record>> {
        let rows = Arc::new(rows);
        if !self.is_enabled() {
            return rows;
        }
        let key = CacheKey {
            connection: connection.to_string(),
            sql: sql.to_string(),
            operation,
        };
        let mut inner = self.lock();
        if inner.map.insert(key.clone(), Arc::clone(&rows)).is_some() {
            inner.touch(&key);
        } else {
            inner.order.push_back(key);
        }
        inner.evict_if_needed();
        rows
    }

    /// Drop every entry for `connection`. Returns the number removed.
    pub fn invalidate_connection(&self, connection: &str) -> usize {
        let mut inner = self.lock();
        let before = inner.map.len();
        inner.map.retain(|k, _| k.connection != connection);
        inner.order.retain(|k| k.connection != connection);
        let removed = before - inner.map.len();
        if removed > 0 {
            tracing::debug!(target: "tabula.cache", connection, removed, "cache invalidated");
        }
        removed
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
    }

    /// Number of cached result sets.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QueryCacheInner {
    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn evict_if_needed(&mut self) {
        if self.capacity == 0 {
            self.map.clear();
            self.order.clear();
            return;
        }

        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            let _ = self.map.remove(&oldest);
        }
    }
}
