// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Based on singleflight-async by ihciah
// Original: https://github.com/ihciah/singleflight-async
// Licensed under MIT/Apache-2.0

//! Coalesces concurrent fills of the same key into a single execution.
//!
//! [`Coalescer`] guards expensive, keyed work such as loading a cache entry from
//! its source of truth. While a call for a key is in flight, further callers for
//! that key do not start their own work; they attach to the running call and
//! receive a clone of its result, errors included. Once the call completes its
//! record is dropped, so the next call for the key starts fresh. This bounds
//! concurrency, it does not cache.
//!
//! # Example
//!
//! ```
//! use flight::Coalescer;
//!
//! # async fn example() -> Result<(), flight::Busy> {
//! let fills: Coalescer<String, String> = Coalescer::new();
//!
//! let value = fills
//!     .run("user:123".to_string(), || async { "loaded".to_string() })
//!     .await?;
//! assert_eq!(value, "loaded");
//! # Ok(())
//! # }
//! ```
//!
//! # Admission Control
//!
//! A hot key with a slow loader can pile up an unbounded number of waiting
//! tasks. [`Coalescer::with_max_waiters`] caps how many callers may attach to
//! one in-flight call; callers beyond the cap fail fast with [`Busy`] and can
//! retry later.
//!
//! ```
//! use flight::Coalescer;
//!
//! let fills: Coalescer<String, Vec<u8>> = Coalescer::with_max_waiters(64);
//! assert_eq!(fills.max_waiters(), 64);
//! ```
//!
//! # Cancellation and Panics
//!
//! The result is shared per call, not per caller. If the caller that is running
//! the work is cancelled or panics, one of the attached callers runs its own
//! work function instead, so at most one execution is in flight per key at any
//! time. An attached caller that gives up does not cancel the shared work.

use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::{
        Arc, Weak,
        atomic::{AtomicUsize, Ordering},
    },
};

use parking_lot::Mutex;
use tokio::sync::OnceCell;

type SharedMapping<K, T> = Arc<Mutex<HashMap<K, Weak<Call<T>>>>>;

/// Returned when a key already has the maximum number of attached callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("too many callers are waiting on the same key, retry later")]
pub struct Busy;

/// Represents a class of keyed work and suppresses duplicate concurrent executions.
pub struct Coalescer<K, T> {
    mapping: SharedMapping<K, T>,
    max_waiters: usize,
}

impl<K, T> Debug for Coalescer<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalescer")
            .field("in_flight", &self.mapping.lock().len())
            .field("max_waiters", &self.max_waiters)
            .finish()
    }
}

impl<K, T> Default for Coalescer<K, T> {
    fn default() -> Self {
        Self {
            mapping: Arc::default(),
            max_waiters: 0,
        }
    }
}

/// One in-flight execution shared by every attached caller.
struct Call<T> {
    result: OnceCell<T>,
    waiters: AtomicUsize,
}

impl<T> Call<T> {
    fn new() -> Self {
        Self {
            result: OnceCell::new(),
            waiters: AtomicUsize::new(0),
        }
    }
}

/// A caller's handle on a call. Detaches on drop and retires the call's record
/// once the result is in or the last handle goes away.
struct Attachment<K, T>
where
    K: Hash + Eq,
{
    call: Arc<Call<T>>,
    counted: bool,
    key: K,
    mapping: SharedMapping<K, T>,
}

impl<K, T> Drop for Attachment<K, T>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        if self.counted {
            self.call.waiters.fetch_sub(1, Ordering::AcqRel);
        }

        // Upgrades only happen under the mapping lock, so the strong count is stable here.
        let mut mapping = self.mapping.lock();
        let finished = self.call.result.initialized() || Arc::strong_count(&self.call) == 1;
        let is_ours = mapping
            .get(&self.key)
            .is_some_and(|entry| std::ptr::eq(entry.as_ptr(), Arc::as_ptr(&self.call)));
        if finished && is_ours {
            mapping.remove(&self.key);
        }
    }
}

impl<K, T> Coalescer<K, T>
where
    K: Hash + Eq + Clone,
{
    /// Creates a coalescer with no limit on attached callers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a coalescer that lets at most `max_waiters` callers attach to an
    /// in-flight call, in addition to the caller that started it.
    ///
    /// Zero means no limit.
    #[inline]
    #[must_use]
    pub fn with_max_waiters(max_waiters: usize) -> Self {
        Self {
            mapping: Arc::default(),
            max_waiters,
        }
    }

    /// Returns the attached-caller limit, zero when unlimited.
    #[must_use]
    pub fn max_waiters(&self) -> usize {
        self.max_waiters
    }

    /// Returns the number of keys with a call in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.mapping.lock().len()
    }

    /// Runs `func` for `key` unless a call for `key` is already in flight, in
    /// which case the returned future resolves to a clone of that call's result.
    ///
    /// The caller is registered when `run` is called, before the returned future
    /// is first polled, so calls issued back to back always coalesce.
    ///
    /// # Errors
    ///
    /// Resolves to [`Busy`] when the in-flight call already has `max_waiters`
    /// attached callers. `func` is not invoked in that case.
    pub fn run<F, Fut>(&self, key: K, func: F) -> impl Future<Output = Result<T, Busy>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        T: Clone,
    {
        let attachment = self.attach(key);
        async move {
            let attachment = attachment?;
            let value = attachment.call.result.get_or_init(func).await.clone();
            drop(attachment);
            Ok(value)
        }
    }

    fn attach(&self, key: K) -> Result<Attachment<K, T>, Busy> {
        let mut mapping = self.mapping.lock();

        if let Some(call) = mapping.get(&key).and_then(Weak::upgrade) {
            if self.max_waiters > 0 && call.waiters.load(Ordering::Acquire) >= self.max_waiters {
                return Err(Busy);
            }
            call.waiters.fetch_add(1, Ordering::AcqRel);
            return Ok(Attachment {
                call,
                counted: true,
                key,
                mapping: Arc::clone(&self.mapping),
            });
        }

        // No call in flight, or every caller of the previous one went away.
        let call = Arc::new(Call::new());
        mapping.insert(key.clone(), Arc::downgrade(&call));
        Ok(Attachment {
            call,
            counted: false,
            key,
            mapping: Arc::clone(&self.mapping),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_is_retired_after_completion() {
        let fills: Coalescer<&str, u32> = Coalescer::new();
        let fut = fills.run("key", || async { 7 });
        assert_eq!(fills.in_flight(), 1);

        assert_eq!(fut.await, Ok(7));
        assert_eq!(fills.in_flight(), 0);
    }

    #[tokio::test]
    async fn dropped_unpolled_call_is_retired() {
        let fills: Coalescer<&str, u32> = Coalescer::new();
        let fut = fills.run("key", || async { 7 });
        drop(fut);
        assert_eq!(fills.in_flight(), 0);
    }

    #[tokio::test]
    async fn busy_callers_are_not_counted() {
        let fills: Coalescer<&str, u32> = Coalescer::with_max_waiters(1);
        let leader = fills.run("key", || async { 1 });
        let follower = fills.run("key", || async { 2 });
        let rejected = fills.run("key", || async { 3 });

        assert_eq!(rejected.await, Err(Busy));
        assert_eq!(leader.await, Ok(1));
        assert_eq!(follower.await, Ok(1));
    }

    #[test]
    fn debug_reports_configuration() {
        let fills: Coalescer<String, String> = Coalescer::with_max_waiters(3);
        let debug = format!("{fills:?}");
        assert!(debug.contains("Coalescer"));
        assert!(debug.contains("max_waiters: 3"));
    }

    #[test]
    fn busy_displays_retry_hint() {
        assert!(Busy.to_string().contains("retry later"));
    }
}
