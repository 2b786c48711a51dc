//! Per-engine memoisation of query results.
//!
//! Values are stored type-erased behind `Arc` and keyed by the query
//! signature `(subject, task, sorted features, kind)`. Computation runs
//! outside the lock, so two threads racing on the same key may both compute;
//! results are deterministic and the last write wins.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gait_core::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;

/// What was computed for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Cycles,
    MeanPatterns,
    StdPatterns,
    Rom { by_cycle: bool },
    Summary,
    Correlations,
    Validity,
    OutlierScores,
}

/// Query signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub subject: String,
    pub task: String,
    /// Canonical (sorted, de-duplicated) feature list
    pub features: Vec<String>,
    pub kind: QueryKind,
}

impl CacheKey {
    pub fn new(subject: &str, task: &str, features: &[String], kind: QueryKind) -> Self {
        Self {
            subject: subject.to_string(),
            task: task.to_string(),
            features: features.to_vec(),
            kind,
        }
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

type Entry = Arc<dyn Any + Send + Sync>;

pub struct QueryCache {
    config: CacheConfig,
    entries: RwLock<HashMap<CacheKey, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get<T>(&self, key: &CacheKey) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let entry = self.entries.read().get(key).cloned()?;
        entry.downcast::<T>().ok()
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_compute<T, F>(&self, key: CacheKey, compute: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        if self.config.enabled {
            if let Some(value) = self.get::<T>(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(subject = %key.subject, task = %key.task, kind = ?key.kind, "Cache hit");
                return Ok(value);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(subject = %key.subject, task = %key.task, kind = ?key.kind, "Cache miss");
        let value = Arc::new(compute()?);

        if self.config.enabled {
            let mut entries = self.entries.write();
            if entries.len() < self.config.max_entries || entries.contains_key(&key) {
                entries.insert(key, value.clone() as Entry);
            }
        }

        Ok(value)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gait_core::Error;
    use std::cell::Cell;

    fn key(kind: QueryKind) -> CacheKey {
        CacheKey::new("SUB01", "walk", &["x".to_string()], kind)
    }

    #[test]
    fn test_second_lookup_hits() {
        let cache = QueryCache::new(CacheConfig::default());
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(vec![1.0, 2.0])
        };

        let a = cache.get_or_compute(key(QueryKind::Cycles), compute).unwrap();
        let b = cache
            .get_or_compute(key(QueryKind::Cycles), || -> Result<Vec<f64>> {
                calls.set(calls.get() + 1);
                Ok(vec![9.0])
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(*a, *b);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let cache = QueryCache::new(CacheConfig::default());
        cache.get_or_compute(key(QueryKind::MeanPatterns), || Ok(1u32)).unwrap();
        let std = cache.get_or_compute(key(QueryKind::StdPatterns), || Ok(2u32)).unwrap();
        assert_eq!(*std, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = QueryCache::new(CacheConfig::default());
        let err = cache.get_or_compute::<u32, _>(key(QueryKind::Cycles), || {
            Err(Error::invalid_input("boom"))
        });
        assert!(err.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_and_full_cache_still_compute() {
        let disabled = QueryCache::new(CacheConfig {
            enabled: false,
            max_entries: 10,
        });
        assert_eq!(*disabled.get_or_compute(key(QueryKind::Summary), || Ok(3u8)).unwrap(), 3);
        assert!(disabled.is_empty());

        let tiny = QueryCache::new(CacheConfig {
            enabled: true,
            max_entries: 1,
        });
        tiny.get_or_compute(key(QueryKind::Summary), || Ok(1u8)).unwrap();
        tiny.get_or_compute(key(QueryKind::Validity), || Ok(2u8)).unwrap();
        assert_eq!(tiny.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = QueryCache::new(CacheConfig::default());
        cache.get_or_compute(key(QueryKind::Cycles), || Ok(0i32)).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
