// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Write-once memoization of per-page analysis artifacts.
//
// Entries are keyed by (documentId, pageIndex[, resourceId]) and never
// replaced once written, so concurrent workers racing on the same key all
// end up reading the first value stored. Degraded extractions are not
// cached; a later task may still succeed.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use docdelta_analysis::{ImageSignature, PageFingerprint};
use docdelta_core::{FontInfo, PageGeometry, TextRun};

use crate::extraction::Outcome;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub document_id: String,
    pub page_index: u32,
}

impl PageKey {
    pub fn new(document_id: impl Into<String>, page_index: u32) -> Self {
        Self {
            document_id: document_id.into(),
            page_index,
        }
    }

    pub fn resource(&self, resource_id: impl Into<String>) -> ResourceKey {
        ResourceKey {
            page: self.clone(),
            resource_id: resource_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub page: PageKey,
    pub resource_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// A map whose entries can be written once and then only read.
#[derive(Debug)]
pub struct WriteOnceCache<K, V> {
    entries: Mutex<HashMap<K, Arc<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> Default for WriteOnceCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl<K: Eq + Hash + Clone, V> WriteOnceCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let found = self
            .entries
            .lock()
            .map(|entries| entries.get(key).cloned())
            .unwrap_or(None);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store `value` unless the key is already present. Returns whichever
    /// value the cache holds afterwards.
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.entry(key).or_insert_with(|| Arc::new(value)).clone()
    }

    /// Cached value for `key`, computing it with `compute` on a miss.
    ///
    /// `compute` runs without the lock held, so two workers may compute the
    /// same entry; only the first result is kept.
    pub fn get_or_try_insert_with(&self, key: &K, compute: impl FnOnce() -> Outcome<V>) -> Outcome<Arc<V>> {
        if let Some(value) = self.get(key) {
            return Outcome::Ok(value);
        }
        compute().map(|value| self.insert(key.clone(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// All memoized artifacts, shared by every worker of an orchestrator and
/// reusable across comparisons of the same documents.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    pub geometry: WriteOnceCache<PageKey, PageGeometry>,
    pub text_runs: WriteOnceCache<PageKey, Vec<TextRun>>,
    pub fonts: WriteOnceCache<PageKey, Vec<FontInfo>>,
    pub image_signatures: WriteOnceCache<ResourceKey, ImageSignature>,
    pub fingerprints: WriteOnceCache<PageKey, PageFingerprint>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn first_write_wins() {
        let cache: WriteOnceCache<PageKey, u32> = WriteOnceCache::new();
        let key = PageKey::new("doc", 0);
        assert_eq!(*cache.insert(key.clone(), 1), 1);
        assert_eq!(*cache.insert(key.clone(), 2), 1);
        assert_eq!(cache.get(&key).as_deref(), Some(&1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn degraded_results_are_not_cached() {
        let cache: WriteOnceCache<PageKey, u32> = WriteOnceCache::new();
        let key = PageKey::new("doc", 3);
        let first = cache.get_or_try_insert_with(&key, || Outcome::Degraded("unreadable".into()));
        assert!(first.is_degraded());
        assert!(cache.is_empty());

        let second = cache.get_or_try_insert_with(&key, || Outcome::Ok(7));
        assert_eq!(second.ok().as_deref(), Some(&7));
        let third = cache.get_or_try_insert_with(&key, || panic!("already cached"));
        assert_eq!(third.ok().as_deref(), Some(&7));
    }

    #[test]
    fn resource_keys_are_scoped_to_their_page() {
        let page0 = PageKey::new("doc", 0);
        let page1 = PageKey::new("doc", 1);
        assert_ne!(page0.resource("Im1"), page1.resource("Im1"));
        assert_eq!(page0.resource("Im1"), PageKey::new("doc", 0).resource("Im1"));
    }

    #[test]
    fn concurrent_writers_agree_on_one_value() {
        let cache: Arc<WriteOnceCache<PageKey, usize>> = Arc::new(WriteOnceCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || *cache.insert(PageKey::new("doc", 0), i))
            })
            .collect();
        let seen: Vec<usize> = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect();
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn stats_count_hits_and_misses() {
        let cache: WriteOnceCache<PageKey, u32> = WriteOnceCache::new();
        let key = PageKey::new("doc", 0);
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), 5);
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }
}
