// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use lruk::LruKCache;
use parking_lot::Mutex;

use crate::{
    ByteView, Error,
    builder::TierConfig,
    stats::{TierKind, TierStats, bump},
};

#[derive(Debug, Default)]
struct Counters {
    bytes: AtomicU64,
    gets: AtomicU64,
    hits: AtomicU64,
    evictions: AtomicU64,
}

fn entry_size(key: &str, value: &ByteView) -> u64 {
    (key.len() + value.len()) as u64
}

/// One locked LRU-K cache with byte accounting.
///
/// Bytes are the sum of key and value lengths of resident entries. The
/// eviction listener keeps the count exact for evictions the cache performs on
/// its own as well as for [`remove_oldest`](Self::remove_oldest).
pub(crate) struct CacheTier {
    kind: TierKind,
    cache: Mutex<LruKCache<String, ByteView>>,
    counters: Arc<Counters>,
}

impl Debug for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheTier")
            .field("kind", &self.kind)
            .field("bytes", &self.bytes())
            .finish_non_exhaustive()
    }
}

impl CacheTier {
    pub(crate) fn new(kind: TierKind, config: &TierConfig) -> Result<Self, Error> {
        let counters = Arc::new(Counters::default());
        let listener = Arc::clone(&counters);

        let mut builder = LruKCache::builder()
            .k(config.k)
            .max_items(config.max_items)
            .on_evict(move |key: &String, value: &ByteView| {
                listener.bytes.fetch_sub(entry_size(key, value), Ordering::Relaxed);
                bump(&listener.evictions);
            });
        if let Some(inactive_limit) = config.inactive_limit {
            builder = builder.inactive_limit(inactive_limit);
        }

        Ok(Self {
            kind,
            cache: Mutex::new(builder.build()?),
            counters,
        })
    }

    pub(crate) fn get(&self, key: &str) -> Option<ByteView> {
        bump(&self.counters.gets);
        let value = self.cache.lock().get(key).cloned();
        if value.is_some() {
            bump(&self.counters.hits);
        }
        value
    }

    /// Looks up `key` without counting a get or a visit.
    pub(crate) fn peek(&self, key: &str) -> Option<ByteView> {
        self.cache.lock().peek(key).cloned()
    }

    pub(crate) fn set(&self, key: String, value: ByteView) {
        let key_len = key.len() as u64;
        let added = entry_size(&key, &value);

        let mut cache = self.cache.lock();
        self.counters.bytes.fetch_add(added, Ordering::Relaxed);
        if let Some(replaced) = cache.set(key, value) {
            self.counters.bytes.fetch_sub(key_len + replaced.len() as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn remove(&self, key: &str) -> Option<ByteView> {
        let mut cache = self.cache.lock();
        let removed = cache.remove(key)?;
        self.counters.bytes.fetch_sub(entry_size(key, &removed), Ordering::Relaxed);
        Some(removed)
    }

    /// Evicts the oldest entry. Returns `false` when the tier is empty.
    pub(crate) fn remove_oldest(&self) -> bool {
        self.cache.lock().remove_oldest().is_some()
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.counters.bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn stats(&self) -> TierStats {
        let items = self.cache.lock().len() as u64;
        TierStats {
            bytes: self.bytes(),
            items,
            gets: self.counters.gets.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn clear(&self) {
        let mut cache = self.cache.lock();
        cache.clear();
        self.counters.bytes.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier() -> CacheTier {
        CacheTier::new(TierKind::Main, &TierConfig::default()).expect("default config is valid")
    }

    #[test]
    fn counts_key_and_value_bytes() {
        let tier = tier();
        tier.set("key1".to_string(), ByteView::from("good case"));
        assert_eq!(tier.bytes(), 4 + 9);

        tier.set("k".to_string(), ByteView::from("v"));
        assert_eq!(tier.bytes(), 13 + 2);
    }

    #[test]
    fn overwrite_replaces_the_old_size() {
        let tier = tier();
        tier.set("key".to_string(), ByteView::from("a long first value"));
        tier.set("key".to_string(), ByteView::from("short"));

        assert_eq!(tier.bytes(), 3 + 5);
        assert_eq!(tier.stats().items, 1);
    }

    #[test]
    fn remove_oldest_goes_through_the_listener() {
        let tier = tier();
        tier.set("a".to_string(), ByteView::from("1"));
        tier.set("b".to_string(), ByteView::from("22"));

        assert!(tier.remove_oldest());
        let stats = tier.stats();
        assert_eq!(stats.bytes, 3);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.items, 1);
        assert!(tier.get("a").is_none());

        assert!(tier.remove_oldest());
        assert!(!tier.remove_oldest());
        assert_eq!(tier.bytes(), 0);
    }

    #[test]
    fn bounded_tier_keeps_bytes_exact() {
        let config = TierConfig {
            max_items: 4,
            inactive_limit: Some(2),
            ..TierConfig::default()
        };
        let tier = CacheTier::new(TierKind::Hot, &config).expect("valid config");

        for i in 0..10 {
            tier.set(format!("key{i}"), ByteView::from("value"));
        }

        let stats = tier.stats();
        assert_eq!(stats.items, 2);
        assert_eq!(stats.bytes, 2 * (4 + 5));
        assert_eq!(stats.evictions, 8);
    }

    #[test]
    fn get_tracks_hits() {
        let tier = tier();
        tier.set("key".to_string(), ByteView::from("value"));

        assert_eq!(tier.get("key").as_deref(), Some(&b"value"[..]));
        assert!(tier.get("missing").is_none());

        let stats = tier.stats();
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn peek_leaves_counters_and_recency_alone() {
        let tier = tier();
        tier.set("a".to_string(), ByteView::from("1"));
        tier.set("b".to_string(), ByteView::from("2"));

        for _ in 0..3 {
            assert_eq!(tier.peek("a"), Some(ByteView::from("1")));
        }
        assert!(tier.peek("missing").is_none());
        assert_eq!(tier.stats().gets, 0);

        // "a" is still the oldest entry.
        assert!(tier.remove_oldest());
        assert!(tier.peek("a").is_none());
        assert!(tier.peek("b").is_some());
    }

    #[test]
    fn remove_and_clear_reset_bytes() {
        let tier = tier();
        tier.set("a".to_string(), ByteView::from("1"));
        tier.set("b".to_string(), ByteView::from("2"));

        assert_eq!(tier.remove("a"), Some(ByteView::from("1")));
        assert_eq!(tier.remove("a"), None);
        assert_eq!(tier.bytes(), 2);

        tier.clear();
        assert_eq!(tier.bytes(), 0);
        assert_eq!(tier.stats().items, 0);
        assert_eq!(tier.stats().evictions, 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = TierConfig {
            k: 1,
            ..TierConfig::default()
        };
        assert!(matches!(CacheTier::new(TierKind::Main, &config), Err(Error::Config(_))));
    }
}
