// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The peer pool: a consistent hash ring of peer addresses and the fetchers
//! that reach them.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use futures::{Stream, StreamExt};
use hashring::HashRing;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    BoxError, Error,
    codec::{BincodeCodec, WireCodec},
    discovery::{Discovery, DiscoveryEvent, EventKind},
    peers::{PeerFetcher, PeerPicker, RemotePeer, Transport},
};

/// Virtual nodes per peer unless configured otherwise.
pub const DEFAULT_REPLICAS: usize = 50;

/// Configuration of a [`PeerPool`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PeerPoolConfig {
    /// Address of this process as the other peers know it. Keys that hash to
    /// this address are loaded locally.
    pub self_address: String,
    /// Virtual nodes per peer on the hash ring.
    pub replicas: usize,
}

impl Default for PeerPoolConfig {
    fn default() -> Self {
        Self {
            self_address: String::new(),
            replicas: DEFAULT_REPLICAS,
        }
    }
}

/// Builder for [`PeerPool`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use peercache::{BoxError, BoxFuture, PeerPool, Transport};
///
/// #[derive(Debug)]
/// struct NoNetwork;
///
/// impl Transport for NoNetwork {
///     fn round_trip<'a>(&'a self, _: &'a str, _: Vec<u8>) -> BoxFuture<'a, Result<Vec<u8>, BoxError>> {
///         Box::pin(async { Err(BoxError::from("offline")) })
///     }
/// }
///
/// let pool = PeerPool::builder("10.0.0.1:8000").replicas(100).transport(NoNetwork).build()?;
/// pool.set_peers(["10.0.0.1:8000", "10.0.0.2:8000"]);
/// assert_eq!(pool.peers().len(), 2);
/// # Ok::<(), peercache::Error>(())
/// ```
pub struct PeerPoolBuilder {
    config: PeerPoolConfig,
    transport: Option<Arc<dyn Transport>>,
    codec: Arc<dyn WireCodec>,
}

impl Debug for PeerPoolBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerPoolBuilder")
            .field("config", &self.config)
            .field("codec", &self.codec.name())
            .finish_non_exhaustive()
    }
}

impl PeerPoolBuilder {
    fn new(self_address: String) -> Self {
        Self {
            config: PeerPoolConfig {
                self_address,
                ..PeerPoolConfig::default()
            },
            transport: None,
            codec: Arc::new(BincodeCodec),
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: PeerPoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of virtual nodes per peer.
    #[must_use]
    pub fn replicas(mut self, replicas: usize) -> Self {
        self.config.replicas = replicas;
        self
    }

    /// Sets the transport used to reach peers. Required.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the wire codec. Defaults to [`BincodeCodec`].
    #[must_use]
    pub fn codec(mut self, codec: impl WireCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Creates the pool with no peers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no transport was set or `replicas` is zero.
    pub fn build(self) -> Result<PeerPool, Error> {
        let transport = self
            .transport
            .ok_or_else(|| Error::Config("peer pool requires a transport".to_string()))?;
        if self.config.replicas == 0 {
            return Err(Error::Config("peer pool replicas must be at least 1".to_string()));
        }

        Ok(PeerPool {
            membership: Mutex::new(Membership {
                ring: HashRing::new(self.config.replicas),
                fetchers: HashMap::new(),
            }),
            config: self.config,
            transport,
            codec: self.codec,
        })
    }
}

struct Membership {
    ring: HashRing,
    fetchers: HashMap<String, Arc<dyn PeerFetcher>>,
}

/// A [`PeerPicker`] over a consistent hash ring of peer addresses.
///
/// The ring usually includes this process's own address; keys that land on it
/// are loaded locally, so the pool never picks itself. Membership can be
/// replaced wholesale with [`set_peers`](Self::set_peers) or changed
/// incrementally from a [`Discovery`] source.
pub struct PeerPool {
    config: PeerPoolConfig,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn WireCodec>,
    membership: Mutex<Membership>,
}

impl Debug for PeerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerPool")
            .field("config", &self.config)
            .field("peers", &self.peers())
            .finish_non_exhaustive()
    }
}

impl PeerPool {
    /// Starts building a pool for a process reachable at `self_address`.
    pub fn builder(self_address: impl Into<String>) -> PeerPoolBuilder {
        PeerPoolBuilder::new(self_address.into())
    }

    /// Returns this process's address.
    #[must_use]
    pub fn self_address(&self) -> &str {
        &self.config.self_address
    }

    /// Returns the known peer addresses in sorted order, including this process
    /// if it is on the ring.
    #[must_use]
    pub fn peers(&self) -> Vec<String> {
        self.membership.lock().ring.members().map(str::to_owned).collect()
    }

    /// Replaces the membership with `addresses`.
    pub fn set_peers<I, S>(&self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ring = HashRing::new(self.config.replicas);
        let mut membership = self.membership.lock();
        let mut fetchers = HashMap::new();
        for address in addresses {
            let address = address.as_ref();
            ring.add([address]);
            if address != self.config.self_address && !fetchers.contains_key(address) {
                let fetcher = membership
                    .fetchers
                    .remove(address)
                    .unwrap_or_else(|| self.remote(address));
                fetchers.insert(address.to_owned(), fetcher);
            }
        }
        debug!(peers = ring.len(), "peer set replaced");
        *membership = Membership { ring, fetchers };
    }

    /// Adds peers. Known addresses are left alone.
    pub fn add_peers<I, S>(&self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut membership = self.membership.lock();
        for address in addresses {
            let address = address.as_ref();
            if membership.ring.contains(address) {
                continue;
            }
            membership.ring.add([address]);
            if address != self.config.self_address {
                let fetcher = self.remote(address);
                membership.fetchers.insert(address.to_owned(), fetcher);
            }
            debug!(peer = address, "peer added");
        }
    }

    /// Removes peers. Unknown addresses are ignored.
    pub fn remove_peers<I, S>(&self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut membership = self.membership.lock();
        for address in addresses {
            let address = address.as_ref();
            if !membership.ring.contains(address) {
                continue;
            }
            membership.ring.remove([address]);
            membership.fetchers.remove(address);
            debug!(peer = address, "peer removed");
        }
    }

    /// Applies one membership change.
    pub fn apply(&self, event: &DiscoveryEvent) {
        if event.address.is_empty() {
            warn!(kind = ?event.kind, "ignoring discovery event without an address");
            return;
        }
        match event.kind {
            EventKind::Added => self.add_peers([&event.address]),
            EventKind::Removed => self.remove_peers([&event.address]),
        }
    }

    /// Applies every event of `events` until the stream ends.
    pub async fn follow<S>(&self, events: S)
    where
        S: Stream<Item = DiscoveryEvent>,
    {
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            self.apply(&event);
        }
    }

    /// Loads the current membership from `discovery`, then follows its changes
    /// until the watch stream ends.
    ///
    /// # Errors
    ///
    /// Returns the discovery source's error if the initial listing fails. The
    /// pool is left unchanged in that case.
    pub async fn sync_with(&self, discovery: &dyn Discovery) -> Result<(), BoxError> {
        let peers = discovery.peers().await?;
        self.set_peers(&peers);
        self.follow(discovery.watch()).await;
        Ok(())
    }

    fn remote(&self, address: &str) -> Arc<dyn PeerFetcher> {
        Arc::new(RemotePeer::new(address, Arc::clone(&self.transport), Arc::clone(&self.codec)))
    }
}

impl PeerPicker for PeerPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>> {
        let membership = self.membership.lock();
        let owner = membership.ring.route(key)?;
        if owner == self.config.self_address {
            return None;
        }
        debug!(key, peer = owner, "picked peer");
        membership.fetchers.get(owner).map(Arc::clone)
    }
}
