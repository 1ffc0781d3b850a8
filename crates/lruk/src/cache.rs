// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The LRU-K cache proper.

use std::{
    borrow::Borrow,
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
};

use crate::{
    builder::{LruKCacheBuilder, MIN_K},
    list::{List, Slot},
};

/// Observer invoked with every entry the cache evicts.
pub type EvictionListener<K, V> = Box<dyn FnMut(&K, &V) + Send>;

/// Which recency list currently holds a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Residency {
    /// Seen fewer than `k` times.
    Inactive,
    /// Seen at least `k` times.
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Inactive(Slot),
    Active(Slot),
}

impl Location {
    fn residency(self) -> Residency {
        match self {
            Self::Inactive(_) => Residency::Inactive,
            Self::Active(_) => Residency::Active,
        }
    }
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    visits: usize,
}

/// A two-list LRU-K cache.
///
/// New keys land in the *inactive* list. Once a key has been read or overwritten
/// `k` times it is promoted to the *active* list. Both lists are ordered by
/// recency, and [`remove_oldest`](Self::remove_oldest) drains the inactive list
/// before touching the active one, so a burst of one-shot keys cannot flush the
/// keys that proved to be hot.
///
/// The cache is not synchronized; wrap it in a lock to share it.
///
/// # Examples
///
/// ```
/// use lruk::{LruKCache, Residency};
///
/// let mut cache = LruKCache::<String, &str>::new();
/// cache.set("config".to_string(), "v1");
/// assert_eq!(cache.residency("config"), Some(Residency::Inactive));
///
/// cache.get("config");
/// cache.get("config");
/// assert_eq!(cache.residency("config"), Some(Residency::Active));
/// ```
pub struct LruKCache<K, V> {
    k: usize,
    max_items: usize,
    inactive_limit: usize,
    index: HashMap<K, Location>,
    inactive: List<Entry<K, V>>,
    active: List<Entry<K, V>>,
    on_evict: Option<EvictionListener<K, V>>,
}

impl<K, V> Debug for LruKCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruKCache")
            .field("k", &self.k)
            .field("max_items", &self.max_items)
            .field("inactive_limit", &self.inactive_limit)
            .field("inactive_len", &self.inactive.len())
            .field("active_len", &self.active.len())
            .finish_non_exhaustive()
    }
}

impl<K, V> Default for LruKCache<K, V>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> LruKCache<K, V> {
    /// Creates a builder to configure limits and an eviction listener.
    #[must_use]
    pub fn builder() -> LruKCacheBuilder<K, V> {
        LruKCacheBuilder::new()
    }

    pub(crate) fn from_parts(k: usize, max_items: usize, inactive_limit: usize, on_evict: Option<EvictionListener<K, V>>) -> Self {
        Self {
            k,
            max_items,
            inactive_limit,
            index: HashMap::new(),
            inactive: List::default(),
            active: List::default(),
            on_evict,
        }
    }

    /// Returns the promotion threshold.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the total item limit, zero when unbounded.
    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Returns the inactive list limit, zero when unbounded.
    #[must_use]
    pub fn inactive_limit(&self) -> usize {
        self.inactive_limit
    }

    /// Returns the number of entries across both lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the number of entries that have not been promoted yet.
    #[must_use]
    pub fn inactive_len(&self) -> usize {
        self.inactive.len()
    }

    /// Returns the number of promoted entries.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Drops every entry. The eviction listener is not notified.
    pub fn clear(&mut self) {
        self.index.clear();
        self.inactive.clear();
        self.active.clear();
    }

    fn active_capacity(&self) -> usize {
        self.max_items - self.inactive_limit
    }

    fn is_bounded(&self) -> bool {
        self.max_items != 0
    }

    fn entry(&self, location: Location) -> Option<&Entry<K, V>> {
        match location {
            Location::Inactive(slot) => self.inactive.get(slot),
            Location::Active(slot) => self.active.get(slot),
        }
    }

    fn entry_mut(&mut self, location: Location) -> Option<&mut Entry<K, V>> {
        match location {
            Location::Inactive(slot) => self.inactive.get_mut(slot),
            Location::Active(slot) => self.active.get_mut(slot),
        }
    }
}

impl<K, V> LruKCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Creates an unbounded cache with `k = 2` and no eviction listener.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(MIN_K, 0, 0, None)
    }

    /// Looks up `key`, counting the access as a visit.
    ///
    /// A visit may promote the entry to the active list, which in a bounded
    /// cache can evict the oldest active entry.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let location = self.visit(key)?;
        self.entry(location).map(|entry| &entry.value)
    }

    /// Looks up `key` without counting a visit or changing recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let location = *self.index.get(key)?;
        self.entry(location).map(|entry| &entry.value)
    }

    /// Returns which list holds `key`, if any.
    pub fn residency<Q>(&self, key: &Q) -> Option<Residency>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|location| location.residency())
    }

    /// Returns `true` if `key` is cached. Does not count as a visit.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Inserts or overwrites `key`, returning the replaced value.
    ///
    /// Overwriting counts as a visit. A brand new key starts in the inactive list
    /// with no visits; in a bounded cache that may evict the oldest inactive entry.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        if let Some(location) = self.index.get(&key).copied() {
            let previous = self.entry_mut(location).map(|entry| std::mem::replace(&mut entry.value, value));
            self.visit(&key);
            return previous;
        }

        let slot = self.inactive.push_front(Entry {
            key: key.clone(),
            value,
            visits: 0,
        });
        self.index.insert(key, Location::Inactive(slot));

        if self.is_bounded() && self.inactive.len() > self.inactive_limit {
            self.evict_back(Residency::Inactive);
        }
        None
    }

    /// Removes `key` and returns its value. This is not an eviction, so the
    /// listener is not notified.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = match self.index.remove(key)? {
            Location::Inactive(slot) => self.inactive.remove(slot),
            Location::Active(slot) => self.active.remove(slot),
        };
        entry.map(|entry| entry.value)
    }

    /// Evicts the oldest inactive entry, or the oldest active entry when no
    /// inactive entries remain. The listener observes the evicted entry.
    pub fn remove_oldest(&mut self) -> Option<(K, V)> {
        if self.inactive.len() > 0 {
            self.evict_back(Residency::Inactive)
        } else {
            self.evict_back(Residency::Active)
        }
    }

    /// Records a visit and returns where the entry lives afterwards.
    fn visit<Q>(&mut self, key: &Q) -> Option<Location>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let location = *self.index.get(key)?;
        match location {
            Location::Inactive(slot) => {
                let entry = self.inactive.get_mut(slot)?;
                entry.visits += 1;
                if entry.visits >= self.k {
                    self.promote(slot)
                } else {
                    self.inactive.move_to_front(slot);
                    Some(location)
                }
            }
            Location::Active(slot) => {
                self.active.move_to_front(slot);
                Some(location)
            }
        }
    }

    fn promote(&mut self, slot: Slot) -> Option<Location> {
        let entry = self.inactive.remove(slot)?;
        let key = entry.key.clone();
        let location = Location::Active(self.active.push_front(entry));
        self.index.insert(key, location);

        if self.is_bounded() && self.active.len() > self.active_capacity() {
            self.evict_back(Residency::Active);
        }
        Some(location)
    }

    fn evict_back(&mut self, residency: Residency) -> Option<(K, V)> {
        let list = match residency {
            Residency::Inactive => &mut self.inactive,
            Residency::Active => &mut self.active,
        };
        let entry = list.remove(list.back()?)?;
        self.index.remove(&entry.key);

        if let Some(listener) = self.on_evict.as_mut() {
            listener(&entry.key, &entry.value);
        }
        Some((entry.key, entry.value))
    }
}
