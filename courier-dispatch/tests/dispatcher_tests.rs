//! Integration tests for the dispatcher
#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use std::{sync::Arc, time::Duration};

use courier_dispatch::{DispatchConfig, DispatchError, Dispatcher};
use pretty_assertions::assert_eq;
use support::{ScriptedProvider, message, providers};
use tokio::{task::JoinSet, time::Instant};

fn config() -> DispatchConfig {
    DispatchConfig {
        retry_base_delay_ms: 100,
        ..DispatchConfig::default()
    }
}

fn assert_gap(earlier: Instant, later: Instant, expected: Duration) {
    let gap = later - earlier;
    assert!(
        gap >= expected && gap < expected + Duration::from_millis(5),
        "expected a wait of {expected:?}, got {gap:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_identical_message_is_rejected_as_duplicate() {
    let provider = ScriptedProvider::always_ok("primary");
    let dispatcher = Dispatcher::new(config(), providers(&[&provider])).unwrap();

    let first = dispatcher.send(&message("hello")).await;
    let second = dispatcher.send(&message("hello")).await;

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), DispatchError::Duplicate);
    assert_eq!(provider.call_count(), 1);

    let key = message("hello").key();
    let successes = dispatcher
        .log()
        .iter()
        .filter(|outcome| outcome.succeeded && outcome.message.key() == key)
        .count();
    assert_eq!(successes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_dispatch_is_not_marked_sent() {
    let provider = ScriptedProvider::always_failing("primary");
    let dispatcher = Dispatcher::new(
        DispatchConfig {
            max_total_attempts: Some(2),
            ..config()
        },
        providers(&[&provider]),
    )
    .unwrap();

    let first = dispatcher.send(&message("hello")).await;
    let second = dispatcher.send(&message("hello")).await;

    assert_eq!(
        first.unwrap_err(),
        DispatchError::AllProvidersExhausted { attempts: 2 }
    );
    // Not a duplicate: the first dispatch never succeeded
    assert_eq!(
        second.unwrap_err(),
        DispatchError::AllProvidersExhausted { attempts: 2 }
    );
    assert_eq!(dispatcher.sent_count(), 0);
    assert_eq!(provider.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_window() {
    let provider = ScriptedProvider::always_ok("primary");
    let dispatcher = Dispatcher::new(
        DispatchConfig {
            rate_limit: 5,
            rate_window_ms: 60_000,
            ..config()
        },
        providers(&[&provider]),
    )
    .unwrap();

    for i in 0..5 {
        assert!(dispatcher.send(&message(&format!("first {i}"))).await.is_ok());
    }
    assert_eq!(
        dispatcher.send(&message("first 5")).await.unwrap_err(),
        DispatchError::RateLimited
    );

    tokio::time::advance(Duration::from_millis(60_001)).await;

    for i in 0..5 {
        assert!(dispatcher.send(&message(&format!("second {i}"))).await.is_ok());
    }
    assert_eq!(
        dispatcher.send(&message("second 5")).await.unwrap_err(),
        DispatchError::RateLimited
    );

    assert_eq!(provider.call_count(), 10);
    // Rate limited sends leave no trace in the audit log
    assert_eq!(dispatcher.log().len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_rotates_to_second_provider() {
    let failing = ScriptedProvider::always_failing("primary");
    let backup = ScriptedProvider::always_ok("backup");
    let dispatcher = Dispatcher::new(config(), providers(&[&failing, &backup])).unwrap();

    let delivered = dispatcher.send(&message("hello")).await.unwrap();

    assert_eq!(&*delivered.provider, "backup");
    assert_eq!(delivered.attempts, 4);
    assert_eq!(failing.call_count(), 3);
    assert_eq!(backup.call_count(), 1);

    let log = dispatcher.log();
    let failures: Vec<_> = log
        .iter()
        .filter(|outcome| !outcome.succeeded)
        .map(|outcome| outcome.provider.as_deref())
        .collect();
    assert_eq!(failures, vec![Some("primary"); 3]);
    assert!(log.iter().all(|outcome| outcome.dispatch_id == delivered.dispatch_id));
    assert_eq!(log.last().map(|outcome| outcome.succeeded), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_recovering_provider_is_kept() {
    let flaky = ScriptedProvider::flaky("primary", 2);
    let backup = ScriptedProvider::always_ok("backup");
    let dispatcher = Dispatcher::new(config(), providers(&[&flaky, &backup])).unwrap();

    let delivered = dispatcher.send(&message("hello")).await.unwrap();

    assert_eq!(&*delivered.provider, "primary");
    assert_eq!(backup.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_escalates_then_resets_on_rotation() {
    let failing = ScriptedProvider::always_failing("primary");
    let backup = ScriptedProvider::always_ok("backup");
    let dispatcher = Dispatcher::new(config(), providers(&[&failing, &backup])).unwrap();

    dispatcher.send(&message("hello")).await.unwrap();

    let primary = failing.call_times();
    let backup = backup.call_times();
    assert_eq!(primary.len(), 3);

    // Wait before attempt k on one provider is base * 2^(k-1)
    assert_gap(primary[0], primary[1], Duration::from_millis(200));
    assert_gap(primary[1], primary[2], Duration::from_millis(400));
    // Rotation resets the exponent
    assert_gap(primary[2], backup[0], Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_rotation_wraps_back_to_first_provider() {
    let first = ScriptedProvider::new(
        "first",
        (0..3).map(|_| Err(courier_dispatch::ProviderError::Other("busy".to_string()))),
        Ok(()),
    );
    let second = ScriptedProvider::always_failing("second");
    let dispatcher = Dispatcher::new(config(), providers(&[&first, &second])).unwrap();

    let delivered = dispatcher.send(&message("hello")).await.unwrap();

    assert_eq!(&*delivered.provider, "first");
    assert_eq!(delivered.attempts, 7);
    assert_eq!(second.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_log_reads_are_idempotent() {
    let dispatcher = Dispatcher::new(
        config(),
        providers(&[
            &ScriptedProvider::flaky("primary", 1),
            &ScriptedProvider::always_ok("backup"),
        ]),
    )
    .unwrap();

    dispatcher.send(&message("one")).await.unwrap();
    dispatcher.send(&message("two")).await.unwrap();

    let first = dispatcher.log();
    let second = dispatcher.log();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_identical_sends_dispatch_once() {
    let provider = ScriptedProvider::slow("primary", Duration::from_millis(100));
    let dispatcher = Arc::new(
        Dispatcher::new(
            DispatchConfig {
                rate_limit: 100,
                ..config()
            },
            providers(&[&provider]),
        )
        .unwrap(),
    );

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let dispatcher = Arc::clone(&dispatcher);
        tasks.spawn(async move { dispatcher.send(&message("same")).await });
    }

    let mut delivered = 0;
    let mut duplicates = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => delivered += 1,
            Err(DispatchError::Duplicate) => duplicates += 1,
            Err(other) => panic!("unexpected result {other:?}"),
        }
    }

    assert_eq!(delivered, 1);
    assert_eq!(duplicates, 9);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(dispatcher.rate_limit_stats().count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_messages_dispatch_concurrently() {
    let provider = ScriptedProvider::slow("primary", Duration::from_millis(100));
    let dispatcher = Arc::new(Dispatcher::new(config(), providers(&[&provider])).unwrap());
    let started = Instant::now();

    let mut tasks = JoinSet::new();
    for i in 0..3 {
        let dispatcher = Arc::clone(&dispatcher);
        tasks.spawn(async move { dispatcher.send(&message(&format!("message {i}"))).await });
    }
    while let Some(result) = tasks.join_next().await {
        assert!(result.unwrap().is_ok());
    }

    assert_gap(started, Instant::now(), Duration::from_millis(100));
    assert_eq!(dispatcher.sent_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_send_with_timeout() {
    let failing = ScriptedProvider::always_failing("primary");
    let dispatcher = Dispatcher::new(config(), providers(&[&failing])).unwrap();

    let result = dispatcher
        .send_with_timeout(&message("hello"), Duration::from_secs(1))
        .await;

    assert_eq!(
        result.unwrap_err(),
        DispatchError::TimedOut(Duration::from_secs(1))
    );
    assert_eq!(dispatcher.sent_count(), 0);
    assert!(failing.call_count() > 1);
    assert!(dispatcher.log().iter().all(|outcome| !outcome.succeeded));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_in_flight_dispatch() {
    let failing = ScriptedProvider::always_failing("primary");
    let dispatcher = Arc::new(Dispatcher::new(config(), providers(&[&failing])).unwrap());

    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.send(&message("hello")).await })
    };

    tokio::time::sleep(Duration::from_secs(5)).await;
    dispatcher.shutdown();

    assert_eq!(task.await.unwrap().unwrap_err(), DispatchError::Cancelled);
    assert_eq!(
        dispatcher.send(&message("later")).await.unwrap_err(),
        DispatchError::Cancelled
    );

    let log = dispatcher.log();
    assert!(log.last().is_some_and(|outcome| outcome.note.starts_with("cancelled")));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_queued_same_key_send_without_charge() {
    let failing = ScriptedProvider::always_failing("primary");
    let dispatcher = Arc::new(Dispatcher::new(config(), providers(&[&failing])).unwrap());

    let spawn_send = || {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.send(&message("same")).await })
    };

    // First send fails once and backs off for 200ms holding the key
    let running = spawn_send();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let queued = spawn_send();
    tokio::time::sleep(Duration::from_millis(10)).await;

    dispatcher.shutdown();

    assert_eq!(running.await.unwrap().unwrap_err(), DispatchError::Cancelled);
    assert_eq!(queued.await.unwrap().unwrap_err(), DispatchError::Cancelled);
    assert_eq!(failing.call_count(), 1);
    assert_eq!(dispatcher.rate_limit_stats().count, 1);

    let notes: Vec<_> = dispatcher.log().into_iter().map(|outcome| outcome.note).collect();
    assert_eq!(notes, vec!["unavailable: primary is down", "cancelled after 1 attempts"]);
}
