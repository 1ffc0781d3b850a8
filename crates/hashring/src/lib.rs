// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Consistent hash ring for routing keys to peers.
//!
//! Every peer is placed on a 32-bit ring at `replicas` positions ("virtual
//! nodes"), each hashed from the replica index followed by the peer id. A key
//! belongs to the first virtual node at or after the key's own hash, wrapping
//! around to the start of the ring. Adding or removing a peer only moves the
//! keys adjacent to that peer's virtual nodes, about `1/P` of all keys for `P`
//! peers, where modulo hashing would move nearly all of them.
//!
//! # Example
//!
//! ```
//! use hashring::HashRing;
//!
//! let mut ring = HashRing::new(50);
//! ring.add(["10.0.0.1:8000", "10.0.0.2:8000", "10.0.0.3:8000"]);
//!
//! let owner = ring.route("user:42").expect("ring has peers");
//! assert!(owner.starts_with("10.0.0."));
//!
//! ring.remove(["10.0.0.2:8000"]);
//! assert_ne!(ring.route("user:42"), Some("10.0.0.2:8000"));
//! ```

use std::collections::{BTreeSet, HashMap};

/// Hash function used to place virtual nodes and keys on the ring.
pub type HashFn = fn(&[u8]) -> u32;

/// The default ring hash: 32-bit xxHash with seed zero.
#[must_use]
pub fn default_hash(data: &[u8]) -> u32 {
    xxhash_rust::xxh32::xxh32(data, 0)
}

/// A consistent hash ring of peer ids.
#[derive(Debug, Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    ring: Vec<u32>,
    owners: HashMap<u32, String>,
    members: BTreeSet<String>,
}

impl HashRing {
    /// Creates an empty ring using [`default_hash`].
    ///
    /// # Panics
    ///
    /// Panics if `replicas` is 0.
    #[must_use]
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, default_hash)
    }

    /// Creates an empty ring with a custom hash function.
    ///
    /// # Panics
    ///
    /// Panics if `replicas` is 0.
    #[must_use]
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        assert!(replicas > 0, "replicas must be at least 1");
        Self {
            hash,
            replicas,
            ring: Vec::new(),
            owners: HashMap::new(),
            members: BTreeSet::new(),
        }
    }

    /// Returns the number of virtual nodes per peer.
    #[must_use]
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Returns the number of peers on the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if no peers are on the ring.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns the peer ids in sorted order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    /// Returns `true` if `peer` is on the ring.
    #[must_use]
    pub fn contains(&self, peer: &str) -> bool {
        self.members.contains(peer)
    }

    /// Adds peers to the ring. Peers already present are skipped.
    ///
    /// When two virtual nodes hash to the same point, the one added last owns it.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            if !self.members.insert(peer.to_owned()) {
                continue;
            }
            for replica in 0..self.replicas {
                let point = self.virtual_node(replica, peer);
                self.ring.push(point);
                self.owners.insert(point, peer.to_owned());
            }
        }
        self.ring.sort_unstable();
        self.ring.dedup();
    }

    /// Removes peers and their virtual nodes from the ring. Unknown peers are ignored.
    ///
    /// A point the removed peer won in a collision stays on the ring if another
    /// member also hashes to it.
    pub fn remove<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut changed = false;
        let mut orphaned = BTreeSet::new();
        for peer in peers {
            let peer = peer.as_ref();
            if !self.members.remove(peer) {
                continue;
            }
            changed = true;
            for replica in 0..self.replicas {
                let point = self.virtual_node(replica, peer);
                if self.owners.get(&point).is_some_and(|owner| owner == peer) {
                    self.owners.remove(&point);
                    orphaned.insert(point);
                }
            }
        }

        if !orphaned.is_empty() {
            self.reclaim(&orphaned);
        }
        if changed {
            let owners = &self.owners;
            self.ring.retain(|point| owners.contains_key(point));
        }
    }

    /// Returns the peer that owns `key`, or `None` if the ring is empty.
    #[must_use]
    pub fn route(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let index = self.ring.partition_point(|point| *point < hash);
        let point = self.ring.get(index).or_else(|| self.ring.first())?;
        self.owners.get(point).map(String::as_str)
    }

    /// Hands points left without an owner back to remaining members that
    /// collided on them. The last member in sorted order wins.
    fn reclaim(&mut self, orphaned: &BTreeSet<u32>) {
        for peer in &self.members {
            for replica in 0..self.replicas {
                let point = self.virtual_node(replica, peer);
                if orphaned.contains(&point) {
                    self.owners.insert(point, peer.clone());
                }
            }
        }
    }

    fn virtual_node(&self, replica: usize, peer: &str) -> u32 {
        (self.hash)(format!("{replica}{peer}").as_bytes())
    }
}
