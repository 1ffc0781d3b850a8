// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Peer-to-peer in-process cache groups.
//!
//! A [`Group`] is a named cache in front of one source of truth, its
//! [`Getter`]. Every process in a cluster registers the same groups. Keys are
//! spread across the processes with a consistent hash ring, so each key has one
//! owner that loads it from the getter and caches it; the other processes ask
//! the owner instead of hitting the source themselves.
//!
//! On the way to a value a group tries, in order:
//!
//! 1. its local tiers: the *main* tier of values it owns and the *hot* tier of
//!    sampled values owned by peers,
//! 2. the peer that owns the key, through a [`PeerPicker`] such as [`PeerPool`],
//! 3. its getter.
//!
//! Concurrent misses for the same key share one load, and the number of callers
//! that may wait on it can be capped ([`Error::Busy`]). Both tiers evict with
//! LRU-K, so one-shot keys do not push out reused ones, and together they stay
//! within the group's byte budget.
//!
//! # Example
//!
//! ```
//! use peercache::{Group, Registry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), peercache::Error> {
//! let registry = Registry::new();
//! let scores = Group::builder("scores")
//!     .byte_budget(2 << 20)
//!     .getter_fn(|key: String| async move {
//!         match key.as_str() {
//!             "Tom" => Ok(b"630".to_vec()),
//!             _ => Err(format!("{key} not exist")),
//!         }
//!     })
//!     .register_in(&registry)?;
//!
//! assert_eq!(scores.get("Tom").await?, "630");
//! assert_eq!(scores.get("Tom").await?, "630");
//! assert_eq!(scores.stats().cache_hits, 1);
//! assert!(scores.get("Jack").await.is_err());
//! # Ok(())
//! # }
//! ```
//!
//! # Peers
//!
//! Networking stays outside the crate. A [`Transport`] carries encoded requests
//! to a peer address, and on the other end the transport hands them to a
//! [`PeerServer`]. [`PeerPool`] combines a hash ring of addresses with a
//! transport and a [`WireCodec`], and can follow a [`Discovery`] source as
//! peers come and go.
//!
//! # Logging
//!
//! The crate logs through `tracing` and never installs a subscriber. Loads and
//! evictions are logged at debug level, registration and
//! [`Group::log_stats`] at info level, failed peer fetches at warn level.

mod builder;
mod byteview;
mod codec;
mod discovery;
mod error;
mod getter;
mod group;
mod peers;
mod pool;
mod registry;
mod server;
mod stats;
mod tier;

#[doc(inline)]
pub use builder::{DEFAULT_BYTE_BUDGET, DEFAULT_HOT_SAMPLE_RATE, GroupBuilder, GroupConfig, TierConfig};
pub use byteview::ByteView;
#[doc(inline)]
pub use codec::{BincodeCodec, CodecError, FetchRequest, FetchResponse, JsonCodec, WireCodec};
pub use discovery::{Discovery, DiscoveryEvent, EventKind};
pub use error::{BoxError, Error};
pub use futures::{future::BoxFuture, stream::BoxStream};
pub use getter::{Getter, GetterFn};
pub use group::Group;
pub use peers::{PeerFetcher, PeerPicker, RemotePeer, Transport};
#[doc(inline)]
pub use pool::{DEFAULT_REPLICAS, PeerPool, PeerPoolBuilder, PeerPoolConfig};
pub use registry::Registry;
pub use server::PeerServer;
#[doc(inline)]
pub use stats::{StatsSnapshot, TierKind, TierStats};
