// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `LruKCache` eviction behavior.

use std::sync::{Arc, Mutex};

use lruk::{LruKCache, Residency};

type Evicted = Arc<Mutex<Vec<String>>>;

fn recording_cache(max_items: usize, inactive_limit: usize) -> (LruKCache<String, u32>, Evicted) {
    let evicted = Evicted::default();
    let sink = Arc::clone(&evicted);
    let cache = LruKCache::builder()
        .max_items(max_items)
        .inactive_limit(inactive_limit)
        .on_evict(move |key: &String, _: &u32| sink.lock().unwrap().push(key.clone()))
        .build()
        .expect("valid configuration");
    (cache, evicted)
}

fn unbounded_recording_cache() -> (LruKCache<String, u32>, Evicted) {
    let evicted = Evicted::default();
    let sink = Arc::clone(&evicted);
    let cache = LruKCache::builder()
        .on_evict(move |key: &String, _: &u32| sink.lock().unwrap().push(key.clone()))
        .build()
        .expect("valid configuration");
    (cache, evicted)
}

fn evicted_keys(evicted: &Evicted) -> Vec<String> {
    evicted.lock().unwrap().clone()
}

#[test]
fn get_hits_and_misses() {
    let mut cache = LruKCache::new();
    cache.set("myKey".to_string(), 1234);

    for _ in 0..4 {
        assert_eq!(cache.get("myKey"), Some(&1234));
    }
    assert_eq!(cache.get("nonsense"), None);
}

#[test]
fn set_once_get_once_stays_inactive_and_second_get_promotes() {
    let mut cache = LruKCache::new();
    cache.set("k".to_string(), 1);

    cache.get("k");
    assert_eq!(cache.residency("k"), Some(Residency::Inactive));

    cache.get("k");
    assert_eq!(cache.residency("k"), Some(Residency::Active));
}

#[test]
fn promoted_keys_survive_pressure_that_evicts_single_touch_keys() {
    let (mut cache, evicted) = recording_cache(40, 20);
    for i in 0..20 {
        cache.set(format!("myKey{i}"), 1234);
    }

    for _ in 0..10 {
        cache.get("myKey1");
        cache.get("myKey0");
    }
    for i in 20..22 {
        cache.set(format!("myKey{i}"), 1234);
    }
    while cache.len() > 20 {
        cache.remove_oldest();
    }

    assert_eq!(evicted_keys(&evicted), vec!["myKey2", "myKey3"]);
    assert_eq!(cache.residency("myKey0"), Some(Residency::Active));
    assert_eq!(cache.residency("myKey1"), Some(Residency::Active));
}

#[test]
fn hot_key_outlives_recently_touched_cold_keys() {
    let (mut cache, evicted) = unbounded_recording_cache();
    for i in 0..20 {
        cache.set(format!("myKey{i}"), 1234);
    }

    for _ in 0..100 {
        assert!(cache.get("myKey2").is_some());
    }
    for i in 0..20 {
        assert!(cache.get(format!("myKey{i}").as_str()).is_some(), "myKey{i} should be cached");
    }
    for i in 20..22 {
        cache.set(format!("myKey{i}"), 1234);
    }
    while cache.len() > 20 {
        cache.remove_oldest();
    }

    assert_eq!(evicted_keys(&evicted), vec!["myKey0", "myKey1"]);
    assert!(cache.contains("myKey2"));
}

#[test]
fn inactive_overflow_evicts_oldest_inactive_entry() {
    let (mut cache, evicted) = recording_cache(4, 2);
    cache.set("a".to_string(), 1);
    cache.set("b".to_string(), 2);
    cache.set("c".to_string(), 3);

    assert_eq!(evicted_keys(&evicted), vec!["a"]);
    assert_eq!(cache.inactive_len(), 2);
}

#[test]
fn active_overflow_reports_the_evicted_entry() {
    let (mut cache, evicted) = recording_cache(4, 2);
    for key in ["a", "b", "c"] {
        cache.set(key.to_string(), 0);
        cache.get(key);
        cache.get(key);
    }

    // The active list holds two entries, so promoting "c" pushes out "a".
    assert_eq!(evicted_keys(&evicted), vec!["a"]);
    assert_eq!(cache.active_len(), 2);
    assert!(cache.contains("b"));
    assert!(cache.contains("c"));
}

#[test]
fn remove_oldest_falls_back_to_active_list() {
    let (mut cache, evicted) = unbounded_recording_cache();
    cache.set("cold".to_string(), 1);
    cache.set("hot".to_string(), 2);
    cache.get("hot");
    cache.get("hot");

    assert_eq!(cache.remove_oldest(), Some(("cold".to_string(), 1)));
    assert_eq!(cache.remove_oldest(), Some(("hot".to_string(), 2)));
    assert_eq!(cache.remove_oldest(), None);
    assert_eq!(evicted_keys(&evicted), vec!["cold", "hot"]);
}

#[test]
fn overwrite_returns_previous_value_and_counts_as_visit() {
    let mut cache = LruKCache::new();
    assert_eq!(cache.set("k".to_string(), 1), None);
    assert_eq!(cache.set("k".to_string(), 2), Some(1));
    assert_eq!(cache.residency("k"), Some(Residency::Inactive));

    assert_eq!(cache.set("k".to_string(), 3), Some(2));
    assert_eq!(cache.residency("k"), Some(Residency::Active));
    assert_eq!(cache.peek("k"), Some(&3));
}

#[test]
fn peek_does_not_promote() {
    let mut cache = LruKCache::new();
    cache.set("k".to_string(), 1);
    for _ in 0..5 {
        assert_eq!(cache.peek("k"), Some(&1));
    }
    assert_eq!(cache.residency("k"), Some(Residency::Inactive));
}

#[test]
fn remove_and_clear_do_not_notify_listener() {
    let (mut cache, evicted) = unbounded_recording_cache();
    cache.set("a".to_string(), 1);
    cache.set("b".to_string(), 2);

    assert_eq!(cache.remove("a"), Some(1));
    assert_eq!(cache.remove("a"), None);
    cache.clear();

    assert!(cache.is_empty());
    assert!(evicted_keys(&evicted).is_empty());

    cache.set("c".to_string(), 3);
    assert_eq!(cache.get("c"), Some(&3));
}
