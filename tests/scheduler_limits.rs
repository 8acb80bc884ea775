//! Scheduling guarantees checked against an in-process transport under
//! paused tokio time.

mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use abatcher_core::{BatchConfig, BatchError, BatchOptions, Batcher, RequestItem};
use support::stub::{StubConnector, stub_url};
use tokio::time::Instant;

fn batcher(config: BatchConfig) -> (Batcher<StubConnector>, StubConnector) {
    let connector = StubConnector::default();
    let batcher = Batcher::with_connector(config, connector.clone()).unwrap();
    (batcher, connector)
}

fn ids(results: &[abatcher_core::DispatchResult]) -> Vec<String> {
    results
        .iter()
        .map(|r| r.data().unwrap()["id"].as_str().unwrap().to_string())
        .collect()
}

// ==================== Concurrency Tests ====================

#[tokio::test(start_paused = true)]
async fn test_in_flight_never_exceeds_max_concurrent() {
    let (batcher, stub) = batcher(BatchConfig::default().with_max_concurrent(3));
    let urls: Vec<String> = (0..20).map(|i| stub_url(i, 10 + (i % 4) * 5)).collect();

    let results = batcher
        .process_batch(urls, &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(results.len(), 20);
    assert_eq!(stub.probe.max_in_flight.load(Ordering::SeqCst), 3);
    assert_eq!(stub.probe.sends.load(Ordering::SeqCst), 20);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_starts_everything_at_once() {
    let (batcher, stub) = batcher(BatchConfig::default());
    let urls: Vec<String> = (0..8).map(|i| stub_url(i, 100)).collect();
    let started = Instant::now();

    batcher
        .process_batch(urls, &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(stub.probe.max_in_flight.load(Ordering::SeqCst), 8);
    assert!(started.elapsed() < Duration::from_millis(150));
}

// ==================== Rate Tests ====================

#[tokio::test(start_paused = true)]
async fn test_starts_within_any_second_bounded_by_rate() {
    let (batcher, stub) = batcher(BatchConfig::default().with_max_per_second(5.0));
    let urls: Vec<String> = (0..12).map(|i| stub_url(i, 0)).collect();
    let started = Instant::now();

    batcher
        .process_batch(urls, &BatchOptions::default())
        .await
        .unwrap();

    assert!(stub.probe.max_starts_within(Duration::from_secs(1)) <= 5);
    assert!(started.elapsed() >= Duration::from_millis(2200));
}

#[tokio::test(start_paused = true)]
async fn test_fractional_rate_bounds_starts_per_second() {
    let (batcher, stub) = batcher(BatchConfig::default().with_max_per_second(2.5));
    let urls: Vec<String> = (0..10).map(|i| stub_url(i, 0)).collect();
    let started = Instant::now();

    batcher
        .process_batch(urls, &BatchOptions::default())
        .await
        .unwrap();

    assert!(stub.probe.max_starts_within(Duration::from_secs(1)) <= 2);
    assert!(started.elapsed() >= Duration::from_millis(4500));
}

#[tokio::test(start_paused = true)]
async fn test_rate_and_concurrency_compose() {
    let (batcher, stub) = batcher(
        BatchConfig::default()
            .with_max_concurrent(2)
            .with_max_per_second(10.0),
    );
    let urls: Vec<String> = (0..10).map(|i| stub_url(i, 500)).collect();

    batcher
        .process_batch(urls, &BatchOptions::default())
        .await
        .unwrap();

    assert!(stub.probe.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert!(stub.probe.max_starts_within(Duration::from_secs(1)) <= 10);
}

// ==================== Ordering Tests ====================

#[tokio::test(start_paused = true)]
async fn test_results_follow_input_order_not_completion_order() {
    let (batcher, _) = batcher(BatchConfig::default().with_max_concurrent(4));
    let delays = [90, 10, 50, 0, 70, 30];
    let urls: Vec<String> = delays
        .iter()
        .enumerate()
        .map(|(i, d)| stub_url(i, *d))
        .collect();

    let results = batcher
        .process_batch(urls.clone(), &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(ids(&results), vec!["0", "1", "2", "3", "4", "5"]);
    let result_urls: Vec<&str> = results.iter().map(|r| r.url()).collect();
    assert_eq!(result_urls, urls);
}

#[tokio::test(start_paused = true)]
async fn test_failure_stays_at_its_index() {
    let (batcher, _) = batcher(BatchConfig::default());
    let results = batcher
        .process_batch(
            [stub_url("a", 20), stub_url("fail", 0), stub_url("c", 5)],
            &BatchOptions::default(),
        )
        .await
        .unwrap();

    assert!(results[0].is_success());
    assert!(results[1].error().unwrap().contains("500"));
    assert!(results[2].is_success());
}

// ==================== Lifecycle Tests ====================

#[tokio::test(start_paused = true)]
async fn test_empty_batch_sends_and_opens_nothing() {
    let (batcher, stub) = batcher(BatchConfig::default());
    let results = batcher
        .process_batch(Vec::<String>::new(), &BatchOptions::default())
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(stub.probe.opens.load(Ordering::SeqCst), 0);
    assert_eq!(stub.probe.sends.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_item_opens_nothing() {
    let (batcher, stub) = batcher(BatchConfig::default());
    let items = vec![
        RequestItem::from(stub_url(0, 0)),
        RequestItem::from(""),
    ];
    let err = batcher
        .process_batch(items, &BatchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BatchError::Validation(_)));
    assert_eq!(stub.probe.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_each_batch_opens_and_closes_one_transport() {
    let (batcher, stub) = batcher(BatchConfig::default().with_max_concurrent(2));
    for round in 0..3 {
        let urls: Vec<String> = (0..4).map(|i| stub_url(format!("{round}-{i}"), 5)).collect();
        batcher
            .process_batch(urls, &BatchOptions::default())
            .await
            .unwrap();
    }
    assert_eq!(stub.probe.opens.load(Ordering::SeqCst), 3);
    assert_eq!(stub.probe.drops.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_abort_cancels_outstanding_and_closes_transport() {
    let (batcher, stub) = batcher(
        BatchConfig::default()
            .with_max_concurrent(1)
            .with_raise_on_any_failure(true),
    );
    let urls = vec![
        stub_url("fail", 0),
        stub_url("b", 1000),
        stub_url("c", 1000),
    ];

    let err = batcher
        .process_batch(urls, &BatchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BatchError::Aborted { index: 0, .. }));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(stub.probe.sends.load(Ordering::SeqCst) < 3);
    assert_eq!(stub.probe.opens.load(Ordering::SeqCst), 1);
    assert_eq!(stub.probe.drops.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_stream_closes_transport() {
    use futures_util::StreamExt;

    let (batcher, stub) = batcher(BatchConfig::default());
    let mut dispatches = batcher
        .stream([stub_url(0, 1), stub_url(1, 10_000)], &BatchOptions::default())
        .unwrap();
    let (index, _) = dispatches.next().await.unwrap();
    assert_eq!(index, 0);
    drop(dispatches);

    assert_eq!(stub.probe.drops.load(Ordering::SeqCst), 1);
}
