// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `Coalescer::run()`.

use std::{
    sync::{
        Arc,
        atomic::{
            AtomicUsize,
            Ordering::{AcqRel, Acquire},
        },
    },
    time::Duration,
};

use flight::{Busy, Coalescer};
use futures_util::{StreamExt, stream::FuturesUnordered};

fn unreachable_future() -> std::future::Pending<String> {
    std::future::pending()
}

#[tokio::test]
async fn direct_call() {
    let fills = Coalescer::new();
    let result = fills
        .run("key", || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "Result".to_string()
        })
        .await;
    assert_eq!(result, Ok("Result".to_string()));
}

#[tokio::test]
async fn parallel_call_executes_once() {
    let executions = AtomicUsize::default();

    let fills = Coalescer::new();
    let callers = FuturesUnordered::new();
    for _ in 0..10 {
        callers.push(fills.run("key", || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            executions.fetch_add(1, AcqRel);
            "Result".to_string()
        }));
    }

    let results: Vec<_> = callers.collect().await;
    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|out| out.as_deref() == Ok("Result")));
    assert_eq!(executions.load(Acquire), 1);
}

#[tokio::test]
async fn shared_error_reaches_every_waiter() {
    let executions = AtomicUsize::default();

    let fills: Coalescer<&str, Result<String, String>> = Coalescer::new();
    let callers = FuturesUnordered::new();
    for _ in 0..5 {
        callers.push(fills.run("key", || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            executions.fetch_add(1, AcqRel);
            Err("source unavailable".to_string())
        }));
    }

    let results: Vec<_> = callers.collect().await;
    assert!(results.iter().all(|out| *out == Ok(Err("source unavailable".to_string()))));
    assert_eq!(executions.load(Acquire), 1);
}

#[tokio::test]
async fn distinct_keys_run_independently() {
    let executions = AtomicUsize::default();

    let fills = Coalescer::new();
    let callers = FuturesUnordered::new();
    for i in 0..4 {
        let counter = &executions;
        callers.push(fills.run(i, move || async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            counter.fetch_add(1, AcqRel);
            i * 10
        }));
    }

    let mut results: Vec<_> = callers.map(|out| out.expect("no admission limit")).collect().await;
    results.sort_unstable();
    assert_eq!(results, vec![0, 10, 20, 30]);
    assert_eq!(executions.load(Acquire), 4);
}

#[tokio::test]
async fn sequential_calls_start_fresh_executions() {
    let executions = AtomicUsize::default();
    let fills = Coalescer::new();

    for expected in 1..=3 {
        let value = fills
            .run("key", || async { executions.fetch_add(1, AcqRel) + 1 })
            .await
            .expect("no admission limit");
        assert_eq!(value, expected);
    }
    assert_eq!(fills.in_flight(), 0);
}

#[tokio::test]
async fn late_wait_receives_the_shared_result() {
    let fills = Coalescer::new();
    let fut_early = fills.run("key".to_string(), || async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        "Result".to_string()
    });
    let fut_late = fills.run("key".into(), unreachable_future);
    assert_eq!(fut_early.await, Ok("Result".to_string()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fut_late.await, Ok("Result".to_string()));
}

#[tokio::test]
async fn cancelled_runner_hands_over_to_waiter() {
    let fills = Coalescer::new();

    let fut_cancel = fills.run("key".to_string(), unreachable_future);
    let _ = tokio::time::timeout(Duration::from_millis(10), fut_cancel).await;
    let fut_late = fills.run("key".to_string(), || async { "Result2".to_string() });
    assert_eq!(fut_late.await, Ok("Result2".to_string()));

    // A slow runner that is not dropped keeps its result for everyone.
    let begin = tokio::time::Instant::now();
    let fut_1 = fills.run("key".to_string(), || async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        "Result1".to_string()
    });
    let fut_2 = fills.run("key".to_string(), unreachable_future);
    let (v1, v2) = tokio::join!(fut_1, fut_2);
    assert_eq!(v1, Ok("Result1".to_string()));
    assert_eq!(v2, Ok("Result1".to_string()));
    assert!(begin.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn waiter_deadline_does_not_cancel_shared_fill() {
    let executions = AtomicUsize::default();
    let fills = Coalescer::new();

    let runner = fills.run("key", || async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        executions.fetch_add(1, AcqRel);
        "Result".to_string()
    });
    let impatient = fills.run("key", unreachable_future);

    let (shared, gave_up) = tokio::join!(runner, tokio::time::timeout(Duration::from_millis(10), impatient));
    assert!(gave_up.is_err());
    assert_eq!(shared, Ok("Result".to_string()));
    assert_eq!(executions.load(Acquire), 1);
}

#[tokio::test]
async fn runner_panic_in_spawned_task_hands_over() {
    let executions = AtomicUsize::default();
    let fills: Arc<Coalescer<String, String>> = Arc::new(Coalescer::new());

    let shared_fills = Arc::clone(&fills);
    let handle = tokio::spawn(async move {
        shared_fills
            .run("key".to_string(), || async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                panic!("runner panicked in spawned task");
                #[expect(unreachable_code, reason = "Required to satisfy return type after panic")]
                "never".to_string()
            })
            .await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;

    let executions_ref = &executions;
    let fut_waiter = fills.run("key".to_string(), || async {
        executions_ref.fetch_add(1, AcqRel);
        "Result".to_string()
    });

    assert!(handle.await.is_err());
    assert_eq!(fut_waiter.await, Ok("Result".to_string()));
    assert_eq!(executions.load(Acquire), 1);
}

#[tokio::test]
async fn admission_limit_rejects_excess_waiters() {
    const MAX_WAITERS: usize = 3;
    let executions = AtomicUsize::default();

    let fills = Coalescer::with_max_waiters(MAX_WAITERS);
    let callers = FuturesUnordered::new();
    for _ in 0..MAX_WAITERS + 2 {
        callers.push(fills.run("key", || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            executions.fetch_add(1, AcqRel);
            "Result".to_string()
        }));
    }

    let results: Vec<_> = callers.collect().await;
    let busy = results.iter().filter(|out| **out == Err(Busy)).count();
    let served = results.iter().filter(|out| out.as_deref() == Ok("Result")).count();
    assert!(busy >= 1, "at least one caller must be turned away");
    assert_eq!(busy + served, MAX_WAITERS + 2);
    assert_eq!(served, MAX_WAITERS + 1);
    assert_eq!(executions.load(Acquire), 1);
}

#[tokio::test]
async fn admission_slots_free_up_after_completion() {
    let fills = Coalescer::with_max_waiters(1);

    let first = fills.run("key", || async { 1 });
    let second = fills.run("key", || async { 2 });
    assert_eq!(fills.run("key", || async { 3 }).await, Err(Busy));
    assert_eq!(tokio::join!(first, second), (Ok(1), Ok(1)));

    assert_eq!(fills.run("key", || async { 4 }).await, Ok(4));
}

#[tokio::test]
async fn spawned_callers_share_one_execution() {
    let executions = Arc::new(AtomicUsize::default());
    let fills: Arc<Coalescer<String, String>> = Arc::new(Coalescer::new());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let fills = Arc::clone(&fills);
        let counter = Arc::clone(&executions);
        handles.push(tokio::spawn(async move {
            fills
                .run("user:123".to_string(), || async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    counter.fetch_add(1, AcqRel);
                    "UserData".to_string()
                })
                .await
        }));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    for handle in handles {
        assert_eq!(handle.await.expect("task panicked"), Ok("UserData".to_string()));
    }
    assert_eq!(executions.load(Acquire), 1);
}
