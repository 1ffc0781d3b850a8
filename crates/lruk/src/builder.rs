// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder and validation for [`LruKCache`].

use std::fmt::Debug;

use crate::cache::{EvictionListener, LruKCache};

/// Smallest accepted promotion threshold.
pub const MIN_K: usize = 2;

/// A configuration problem detected by [`LruKCacheBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The promotion threshold is below [`MIN_K`].
    #[error("k must be at least {MIN_K}, got {0}")]
    KTooSmall(usize),

    /// A bounded cache needs an inactive limit in `1..max_items`.
    #[error("inactive limit must be within 1..{max_items}, got {inactive_limit}")]
    InactiveLimitOutOfRange {
        /// The configured inactive list limit.
        inactive_limit: usize,
        /// The configured total item limit.
        max_items: usize,
    },
}

/// Builder for an [`LruKCache`].
///
/// # Examples
///
/// ```
/// use lruk::LruKCache;
///
/// let mut evicted = Vec::new();
/// let mut cache = LruKCache::<String, u32>::builder()
///     .max_items(4)
///     .inactive_limit(2)
///     .on_evict(move |key: &String, _: &u32| evicted.push(key.clone()))
///     .build()?;
///
/// cache.set("a".to_string(), 1);
/// assert_eq!(cache.get("a"), Some(&1));
/// # Ok::<(), lruk::ConfigError>(())
/// ```
pub struct LruKCacheBuilder<K, V> {
    k: usize,
    max_items: usize,
    inactive_limit: Option<usize>,
    on_evict: Option<EvictionListener<K, V>>,
}

impl<K, V> Debug for LruKCacheBuilder<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruKCacheBuilder")
            .field("k", &self.k)
            .field("max_items", &self.max_items)
            .field("inactive_limit", &self.inactive_limit)
            .field("on_evict", &self.on_evict.is_some())
            .finish()
    }
}

impl<K, V> Default for LruKCacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> LruKCacheBuilder<K, V> {
    /// Creates a builder for an unbounded cache with `k = 2`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            k: MIN_K,
            max_items: 0,
            inactive_limit: None,
            on_evict: None,
        }
    }

    /// Sets the number of visits after which an entry is promoted to the active list.
    #[must_use]
    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Sets the total number of entries kept across both lists.
    ///
    /// Zero means unbounded: only [`LruKCache::remove_oldest`] and
    /// [`LruKCache::remove`] shrink the cache.
    #[must_use]
    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Sets how many entries the inactive list may hold.
    ///
    /// The active list gets the remaining `max_items - inactive_limit` entries.
    /// Defaults to half of `max_items`. Ignored for unbounded caches.
    #[must_use]
    pub fn inactive_limit(mut self, inactive_limit: usize) -> Self {
        self.inactive_limit = Some(inactive_limit);
        self
    }

    /// Registers a listener that observes every evicted entry.
    ///
    /// The listener runs synchronously inside the mutating call, so it must not
    /// call back into the cache.
    #[must_use]
    pub fn on_evict<F>(mut self, listener: F) -> Self
    where
        F: FnMut(&K, &V) + Send + 'static,
    {
        self.on_evict = Some(Box::new(listener));
        self
    }

    /// Validates the configuration and creates the cache.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::KTooSmall`] when `k < 2` and
    /// [`ConfigError::InactiveLimitOutOfRange`] when a bounded cache has an
    /// inactive limit that is zero or not below `max_items`.
    pub fn build(self) -> Result<LruKCache<K, V>, ConfigError> {
        if self.k < MIN_K {
            return Err(ConfigError::KTooSmall(self.k));
        }

        let inactive_limit = if self.max_items == 0 {
            0
        } else {
            let inactive_limit = self.inactive_limit.unwrap_or(self.max_items / 2);
            if inactive_limit == 0 || inactive_limit >= self.max_items {
                return Err(ConfigError::InactiveLimitOutOfRange {
                    inactive_limit,
                    max_items: self.max_items,
                });
            }
            inactive_limit
        };

        Ok(LruKCache::from_parts(self.k, self.max_items, inactive_limit, self.on_evict))
    }
}
