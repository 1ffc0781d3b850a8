// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Group and tier statistics.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::Serialize;

/// Per-group counters, updated without locking.
#[derive(Debug, Default)]
pub(crate) struct Stats {
    pub(crate) gets: AtomicU64,
    pub(crate) cache_hits: AtomicU64,
    pub(crate) peer_loads: AtomicU64,
    pub(crate) peer_errors: AtomicU64,
    pub(crate) getter_loads: AtomicU64,
    pub(crate) getter_failures: AtomicU64,
    pub(crate) server_requests: AtomicU64,
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Stats {
    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            getter_loads: self.getter_loads.load(Ordering::Relaxed),
            getter_failures: self.getter_failures.load(Ordering::Relaxed),
            server_requests: self.server_requests.load(Ordering::Relaxed),
        }
    }
}

/// A copy of a group's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Calls to `Group::get` with a non-empty key.
    pub gets: u64,
    /// Gets answered from the main or hot tier.
    pub cache_hits: u64,
    /// Values fetched from a remote peer.
    pub peer_loads: u64,
    /// Failed remote fetches. Each one fell back to the getter.
    pub peer_errors: u64,
    /// Values produced by the getter.
    pub getter_loads: u64,
    /// Getter calls that returned an error.
    pub getter_failures: u64,
    /// Requests served to other peers.
    pub server_requests: u64,
}

impl StatsSnapshot {
    /// Fraction of gets answered locally, zero before the first get.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        ratio(self.cache_hits, self.gets)
    }

    /// Fraction of gets answered by a remote peer.
    #[must_use]
    pub fn peer_load_rate(&self) -> f64 {
        ratio(self.peer_loads, self.gets)
    }

    /// Requests served to peers relative to local gets.
    #[must_use]
    pub fn server_request_rate(&self) -> f64 {
        ratio(self.server_requests, self.gets)
    }
}

#[expect(clippy::cast_precision_loss, reason = "rates are approximate")]
fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 { 0.0 } else { part as f64 / total as f64 }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gets={} hits={} ({:.1}%) peer_loads={} ({:.1}%) peer_errors={} getter_loads={} getter_failures={} server_requests={} ({:.1}%)",
            self.gets,
            self.cache_hits,
            self.hit_rate() * 100.0,
            self.peer_loads,
            self.peer_load_rate() * 100.0,
            self.peer_errors,
            self.getter_loads,
            self.getter_failures,
            self.server_requests,
            self.server_request_rate() * 100.0,
        )
    }
}

/// Which of a group's two tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// Values this process owns, filled by the getter.
    Main,
    /// Sampled copies of values owned by other peers.
    Hot,
}

/// A copy of one tier's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    /// Sum of key and value lengths of the resident entries.
    pub bytes: u64,
    /// Number of resident entries.
    pub items: u64,
    /// Lookups against the tier.
    pub gets: u64,
    /// Lookups that found an entry.
    pub hits: u64,
    /// Entries evicted to make room.
    pub evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_before_any_get_are_zero() {
        let snapshot = Stats::default().snapshot();
        assert!(snapshot.hit_rate().abs() < f64::EPSILON);
        assert!(snapshot.peer_load_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn display_summarizes_counters() {
        let snapshot = StatsSnapshot {
            gets: 4,
            cache_hits: 3,
            getter_loads: 1,
            ..StatsSnapshot::default()
        };
        let text = snapshot.to_string();
        assert!(text.contains("gets=4"), "{text}");
        assert!(text.contains("hits=3 (75.0%)"), "{text}");
        assert!(text.contains("getter_loads=1"), "{text}");
    }

    #[test]
    fn snapshot_serializes_as_json_object() {
        let stats = Stats::default();
        bump(&stats.gets);
        let json = serde_json::to_value(stats.snapshot()).expect("serializable");
        assert_eq!(json["gets"], 1);
        assert_eq!(json["cache_hits"], 0);
    }
}
