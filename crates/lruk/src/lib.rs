// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Two-list LRU-K eviction cache.
//!
//! [`LruKCache`] keeps keys that were seen fewer than `k` times in an *inactive*
//! list and keys seen at least `k` times in an *active* list. Eviction drains
//! the inactive list first, so a scan over many cold keys cannot push out the
//! keys that are actually reused. This is the classic LRU-K defense against
//! cache pollution, with `k = 2` by default.
//!
//! # Bounds
//!
//! A cache built with [`max_items`](LruKCacheBuilder::max_items) evicts on its
//! own: the inactive list is capped at
//! [`inactive_limit`](LruKCacheBuilder::inactive_limit) entries and the active
//! list at `max_items - inactive_limit`. An unbounded cache (the default) only
//! shrinks through [`LruKCache::remove_oldest`] and [`LruKCache::remove`],
//! which lets an owner drive eviction from its own budget, such as a byte count.
//!
//! # Example
//!
//! ```
//! use lruk::LruKCache;
//!
//! let mut cache = LruKCache::<String, u64>::builder().max_items(4).inactive_limit(2).build()?;
//!
//! cache.set("hot".to_string(), 1);
//! cache.get("hot");
//! cache.get("hot");
//!
//! // A scan of one-shot keys only churns the inactive list.
//! for i in 0..10 {
//!     cache.set(format!("scan-{i}"), i);
//! }
//! assert!(cache.contains("hot"));
//! # Ok::<(), lruk::ConfigError>(())
//! ```
//!
//! # Thread Safety
//!
//! The cache takes `&mut self` for every operation that touches recency and does
//! no locking of its own. Share it behind a mutex.

mod builder;
mod cache;
mod list;

#[doc(inline)]
pub use builder::{ConfigError, LruKCacheBuilder, MIN_K};
#[doc(inline)]
pub use cache::{EvictionListener, LruKCache, Residency};
