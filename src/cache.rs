// File: src/cache.rs
use crate::core::engine::Translation;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner {
    entries: Option<LruCache<String, (u64, Arc<Translation>)>>,
    stats: CacheStats,
}

/// Bounded LRU of finished translations keyed by input text.
///
/// Every entry carries the generation of the dataset it was computed
/// from; a lookup with a different generation is a miss, so a put that
/// races with a refresh can never serve stale text.
pub struct TranslationCache {
    inner: Mutex<Inner>,
}

impl TranslationCache {
    /// A capacity of 0 turns the cache off.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: NonZeroUsize::new(capacity).map(LruCache::new),
                stats: CacheStats { capacity, ..CacheStats::default() },
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().entries.is_some()
    }

    pub fn get(&self, text: &str, generation: u64) -> Option<Arc<Translation>> {
        let mut inner = self.inner.lock();
        let Inner { entries, stats } = &mut *inner;
        let entries = entries.as_mut()?;
        match entries.get(text) {
            Some((tag, translation)) if *tag == generation => {
                stats.hits += 1;
                Some(Arc::clone(translation))
            }
            Some(_) => {
                entries.pop(text);
                stats.misses += 1;
                None
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    pub fn put(&self, text: &str, generation: u64, translation: Arc<Translation>) {
        if let Some(entries) = self.inner.lock().entries.as_mut() {
            entries.put(text.to_string(), (generation, translation));
        }
    }

    /// Drops every entry.
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock();
        if let Some(entries) = inner.entries.as_mut() {
            entries.clear();
        }
        inner.stats.invalidations += 1;
        tracing::debug!("translation cache invalidated");
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats { entries: inner.entries.as_ref().map_or(0, LruCache::len), ..inner.stats }
    }
}
