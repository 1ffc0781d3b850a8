// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    fmt::Debug,
    sync::{Arc, OnceLock},
};

use flight::Coalescer;
use tracing::{debug, info, warn};

use crate::{
    ByteView, Error,
    builder::{GroupBuilder, GroupConfig},
    getter::Getter,
    peers::PeerPicker,
    stats::{Stats, StatsSnapshot, TierKind, TierStats, bump},
    tier::CacheTier,
};

/// A namespace of cached values with one source of truth.
///
/// A group answers [`get`](Self::get) from its local tiers when it can. On a
/// miss it loads the value once, however many callers ask concurrently: from
/// the peer that owns the key if there is one, otherwise from its getter.
///
/// Values this process owns live in the *main* tier. A sample of the values
/// fetched from peers is kept in the *hot* tier so popular remote keys do not
/// cost a round trip every time. Both tiers share one byte budget.
pub struct Group {
    name: String,
    config: GroupConfig,
    getter: Arc<dyn Getter>,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    main: CacheTier,
    hot: CacheTier,
    fills: Coalescer<String, Result<ByteView, Error>>,
    stats: Stats,
}

impl Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("main", &self.main)
            .field("hot", &self.hot)
            .field("has_peers", &self.peers.get().is_some())
            .finish_non_exhaustive()
    }
}

impl Group {
    /// Starts building a group called `name`.
    pub fn builder(name: impl Into<String>) -> GroupBuilder {
        GroupBuilder::new(name)
    }

    pub(crate) fn new(name: String, config: GroupConfig, getter: Arc<dyn Getter>) -> Result<Self, Error> {
        Ok(Self {
            main: CacheTier::new(TierKind::Main, &config.main)?,
            hot: CacheTier::new(TierKind::Hot, &config.hot)?,
            fills: Coalescer::with_max_waiters(config.max_waiters),
            name,
            config,
            getter,
            peers: OnceLock::new(),
            stats: Stats::default(),
        })
    }

    /// Returns the group's namespace.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the budget for cached bytes across both tiers. Zero means
    /// nothing is cached.
    #[must_use]
    pub fn byte_budget(&self) -> u64 {
        self.config.byte_budget
    }

    /// Returns a copy of the group's counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns a copy of one tier's counters.
    #[must_use]
    pub fn tier_stats(&self, kind: TierKind) -> TierStats {
        self.tier(kind).stats()
    }

    /// Installs the peer picker used to find the owners of keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PeersAlreadySet`] if a picker was installed before.
    pub fn set_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<(), Error> {
        if self.peers.set(peers).is_err() {
            return Err(Error::PeersAlreadySet(self.name.clone()));
        }
        info!(group = %self.name, "peer picker installed");
        Ok(())
    }

    /// Drops `key` from both local tiers. Returns `true` if it was cached.
    ///
    /// Copies held by other peers are not affected.
    pub fn remove(&self, key: &str) -> bool {
        let main = self.main.remove(key).is_some();
        let hot = self.hot.remove(key).is_some();
        main || hot
    }

    /// Drops every value cached in both local tiers. Counters are kept.
    pub fn clear(&self) {
        self.main.clear();
        self.hot.clear();
        debug!(group = %self.name, "tiers cleared");
    }

    /// Logs the group's counters and tier sizes at info level.
    pub fn log_stats(&self) {
        let main = self.main.stats();
        let hot = self.hot.stats();
        info!(
            group = %self.name,
            stats = %self.stats(),
            main_bytes = main.bytes,
            main_items = main.items,
            hot_bytes = hot.bytes,
            hot_items = hot.items,
            evictions = main.evictions + hot.evictions,
            "group stats"
        );
    }

    /// Returns the value of `key`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyKey`] if `key` is empty.
    /// - [`Error::Busy`] if too many callers are already waiting for `key`.
    /// - [`Error::Getter`] if the value had to be loaded and the getter failed.
    ///   Every caller waiting on the same fill receives the same error.
    pub async fn get(&self, key: &str) -> Result<ByteView, Error> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        bump(&self.stats.gets);

        if let Some(value) = self.lookup(key) {
            bump(&self.stats.cache_hits);
            debug!(group = %self.name, key, "cache hit");
            return Ok(value);
        }

        self.fills.run(key.to_owned(), || self.load(key)).await?
    }

    pub(crate) fn record_server_request(&self) {
        bump(&self.stats.server_requests);
    }

    fn tier(&self, kind: TierKind) -> &CacheTier {
        match kind {
            TierKind::Main => &self.main,
            TierKind::Hot => &self.hot,
        }
    }

    fn caching_enabled(&self) -> bool {
        self.config.byte_budget > 0
    }

    fn lookup(&self, key: &str) -> Option<ByteView> {
        if !self.caching_enabled() {
            return None;
        }
        self.main.get(key).or_else(|| self.hot.get(key))
    }

    fn peek(&self, key: &str) -> Option<ByteView> {
        if !self.caching_enabled() {
            return None;
        }
        self.main.peek(key).or_else(|| self.hot.peek(key))
    }

    async fn load(&self, key: &str) -> Result<ByteView, Error> {
        // A fill that finished between the first lookup and joining this one
        // has already populated the tiers.
        if let Some(value) = self.peek(key) {
            bump(&self.stats.cache_hits);
            return Ok(value);
        }

        if let Some(peer) = self.peers.get().and_then(|peers| peers.pick_peer(key)) {
            match peer.fetch(&self.name, key).await {
                Ok(bytes) => {
                    bump(&self.stats.peer_loads);
                    let value = ByteView::from(bytes);
                    if self.sample_hot() {
                        self.populate(TierKind::Hot, key, value.clone());
                    }
                    debug!(group = %self.name, key, bytes = value.len(), "loaded from peer");
                    return Ok(value);
                }
                Err(error) => {
                    bump(&self.stats.peer_errors);
                    warn!(group = %self.name, key, error = %error, "peer fetch failed, falling back to getter");
                }
            }
        }

        match self.getter.get(key).await {
            Ok(bytes) => {
                bump(&self.stats.getter_loads);
                let value = ByteView::from(bytes);
                self.populate(TierKind::Main, key, value.clone());
                debug!(group = %self.name, key, bytes = value.len(), "loaded from getter");
                Ok(value)
            }
            Err(source) => {
                bump(&self.stats.getter_failures);
                debug!(group = %self.name, key, error = %source, "getter failed");
                Err(Error::getter(key, source))
            }
        }
    }

    fn sample_hot(&self) -> bool {
        match self.config.hot_sample_rate {
            0 => false,
            rate => fastrand::u32(..rate) == 0,
        }
    }

    fn populate(&self, kind: TierKind, key: &str, value: ByteView) {
        if !self.caching_enabled() {
            return;
        }
        self.tier(kind).set(key.to_owned(), value);
        self.enforce_budget();
    }

    /// Evicts until both tiers fit the byte budget. The hot tier gives way
    /// first while it holds more than an eighth of the main tier's bytes.
    fn enforce_budget(&self) {
        let mut evicted = 0_u64;
        loop {
            let main_bytes = self.main.bytes();
            let hot_bytes = self.hot.bytes();
            if main_bytes + hot_bytes <= self.config.byte_budget {
                break;
            }

            let (victim, other) = if hot_bytes > main_bytes / 8 {
                (&self.hot, &self.main)
            } else {
                (&self.main, &self.hot)
            };
            if !victim.remove_oldest() && !other.remove_oldest() {
                break;
            }
            evicted += 1;
        }

        if evicted > 0 {
            debug!(
                group = %self.name,
                evicted,
                main_bytes = self.main.bytes(),
                hot_bytes = self.hot.bytes(),
                "eviction sweep"
            );
        }
    }
}
