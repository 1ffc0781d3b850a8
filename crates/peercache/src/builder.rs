// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Group configuration and the builder that turns it into a [`Group`].

use std::{fmt::Debug, sync::Arc};

use serde::Deserialize;

use crate::{
    BoxError, Error, Group, Registry,
    getter::{Getter, GetterFn},
    peers::PeerPicker,
};

/// Cached bytes per group unless configured otherwise: 64 MiB.
pub const DEFAULT_BYTE_BUDGET: u64 = 64 << 20;

/// One in this many peer fetches is copied into the hot tier by default.
pub const DEFAULT_HOT_SAMPLE_RATE: u32 = 10;

/// Configuration of one cache tier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Visits after which an entry is protected from one-shot traffic.
    pub k: usize,
    /// Entry limit, zero for none. The byte budget applies either way.
    pub max_items: usize,
    /// Entries allowed in the inactive list of a bounded tier. Defaults to
    /// half of `max_items`.
    pub inactive_limit: Option<usize>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            k: lruk::MIN_K,
            max_items: 0,
            inactive_limit: None,
        }
    }
}

/// Configuration of a [`Group`].
///
/// Deserializable so it can live in the embedding application's config file;
/// missing fields take their defaults.
///
/// ```
/// use peercache::GroupConfig;
///
/// let config: GroupConfig = serde_json::from_str(r#"{ "byte_budget": 1048576, "max_waiters": 32 }"#)?;
/// assert_eq!(config.byte_budget, 1 << 20);
/// assert_eq!(config.hot_sample_rate, 10);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Ceiling on the bytes held by both tiers together. Zero disables caching.
    pub byte_budget: u64,
    /// One in this many values fetched from peers is kept in the hot tier.
    /// Zero never keeps any.
    pub hot_sample_rate: u32,
    /// Callers allowed to wait on one in-flight fill besides the one that
    /// started it. Zero means no limit.
    pub max_waiters: usize,
    /// The tier for values this process owns.
    pub main: TierConfig,
    /// The tier for sampled values owned by peers.
    pub hot: TierConfig,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            byte_budget: DEFAULT_BYTE_BUDGET,
            hot_sample_rate: DEFAULT_HOT_SAMPLE_RATE,
            max_waiters: 0,
            main: TierConfig::default(),
            hot: TierConfig::default(),
        }
    }
}

/// Builder for [`Group`].
///
/// # Example
///
/// ```
/// use peercache::{Group, Registry};
///
/// let registry = Registry::new();
/// let group = Group::builder("scores")
///     .byte_budget(2 << 20)
///     .getter_fn(|key: String| async move { Ok::<_, std::io::Error>(key.into_bytes()) })
///     .register_in(&registry)?;
///
/// assert_eq!(group.name(), "scores");
/// assert!(registry.get("scores").is_some());
/// # Ok::<(), peercache::Error>(())
/// ```
pub struct GroupBuilder {
    name: String,
    config: GroupConfig,
    getter: Option<Arc<dyn Getter>>,
    peers: Option<Arc<dyn PeerPicker>>,
}

impl Debug for GroupBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("has_getter", &self.getter.is_some())
            .field("has_peers", &self.peers.is_some())
            .finish()
    }
}

impl GroupBuilder {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: GroupConfig::default(),
            getter: None,
            peers: None,
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: GroupConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the byte budget shared by both tiers. Zero disables caching.
    #[must_use]
    pub fn byte_budget(mut self, bytes: u64) -> Self {
        self.config.byte_budget = bytes;
        self
    }

    /// Keeps one in `rate` peer-fetched values in the hot tier. Zero keeps none.
    #[must_use]
    pub fn hot_sample_rate(mut self, rate: u32) -> Self {
        self.config.hot_sample_rate = rate;
        self
    }

    /// Limits the callers waiting on one fill. Zero means no limit.
    #[must_use]
    pub fn max_waiters(mut self, max_waiters: usize) -> Self {
        self.config.max_waiters = max_waiters;
        self
    }

    /// Configures the main tier.
    #[must_use]
    pub fn main_tier(mut self, tier: TierConfig) -> Self {
        self.config.main = tier;
        self
    }

    /// Configures the hot tier.
    #[must_use]
    pub fn hot_tier(mut self, tier: TierConfig) -> Self {
        self.config.hot = tier;
        self
    }

    /// Sets the source of truth. Required.
    #[must_use]
    pub fn getter(mut self, getter: impl Getter + 'static) -> Self {
        self.getter = Some(Arc::new(getter));
        self
    }

    /// Sets the source of truth from an async closure. See [`GetterFn`].
    #[must_use]
    pub fn getter_fn<F, Fut, E>(self, func: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        self.getter(GetterFn::new(func))
    }

    /// Installs a peer picker right away instead of through [`Group::set_peers`].
    #[must_use]
    pub fn peers(mut self, peers: Arc<dyn PeerPicker>) -> Self {
        self.peers = Some(peers);
        self
    }

    /// Creates the group without registering it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the name is empty, no getter was set or a
    /// tier configuration is invalid.
    pub fn build(self) -> Result<Group, Error> {
        if self.name.is_empty() {
            return Err(Error::Config("group name must not be empty".to_string()));
        }
        let getter = self
            .getter
            .ok_or_else(|| Error::Config(format!("group {:?} requires a getter", self.name)))?;

        let group = Group::new(self.name, self.config, getter)?;
        if let Some(peers) = self.peers {
            group.set_peers(peers)?;
        }
        Ok(group)
    }

    /// Builds the group and registers it in the process-wide registry.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`build`](Self::build), and
    /// [`Error::DuplicateGroup`] when the name is taken.
    pub fn register(self) -> Result<Arc<Group>, Error> {
        self.register_in(Registry::global())
    }

    /// Builds the group and registers it in `registry`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`build`](Self::build), and
    /// [`Error::DuplicateGroup`] when the name is taken.
    pub fn register_in(self, registry: &Registry) -> Result<Arc<Group>, Error> {
        registry.register(self.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> GroupBuilder {
        GroupBuilder::new("builder-tests").getter_fn(|key: String| async move { Ok::<_, BoxError>(key.into_bytes()) })
    }

    #[test]
    fn defaults() {
        let config = GroupConfig::default();
        assert_eq!(config.byte_budget, 64 * 1024 * 1024);
        assert_eq!(config.hot_sample_rate, 10);
        assert_eq!(config.max_waiters, 0);
        assert_eq!(config.main.k, 2);
        assert_eq!(config.hot.max_items, 0);
    }

    #[test]
    fn setters_land_in_config() {
        let group = builder()
            .byte_budget(1024)
            .hot_sample_rate(3)
            .max_waiters(7)
            .build()
            .expect("valid group");
        assert_eq!(group.byte_budget(), 1024);
        assert_eq!(group.name(), "builder-tests");
    }

    #[test]
    fn requires_name_and_getter() {
        assert!(matches!(GroupBuilder::new("").build(), Err(Error::Config(_))));
        assert!(matches!(GroupBuilder::new("no-getter").build(), Err(Error::Config(_))));
    }

    #[test]
    fn invalid_tier_is_a_config_error() {
        let result = builder()
            .hot_tier(TierConfig {
                max_items: 4,
                inactive_limit: Some(4),
                ..TierConfig::default()
            })
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn nested_config_deserializes() {
        let config: GroupConfig =
            serde_json::from_str(r#"{ "byte_budget": 0, "hot": { "max_items": 100 } }"#).expect("valid json");
        assert_eq!(config.byte_budget, 0);
        assert_eq!(config.hot.max_items, 100);
        assert_eq!(config.hot.k, 2);
        assert_eq!(config.main, TierConfig::default());
    }
}
