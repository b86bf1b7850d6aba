mod support;

use std::time::{Duration, Instant};

use metrics::MetricsHandle;
use providers::Chain;
use support::{harness, harness_with, ScriptedProvider, ONE_ETH, ONE_SOL};
use tracker::{Scheduler, TickOutcome};

#[tokio::test]
async fn every_successful_tick_adds_one_row() {
    let h = harness().await;
    let recorder = h.tracker.recorder();

    for _ in 0..3 {
        let outcome = recorder.record_snapshot().await;
        assert!(matches!(outcome, TickOutcome::Recorded(_)));
    }

    assert_eq!(h.tracker.store.count().await.unwrap(), 3);
    let latest = h.tracker.store.latest().await.unwrap().expect("row");
    assert_eq!(latest.eth_balance, 1.0);
    assert_eq!(latest.sol_balance, 2.0);
    assert_eq!(latest.eth_usd, None);
    assert_eq!(latest.sol_usd, None);
}

#[tokio::test]
async fn one_failing_provider_writes_nothing() {
    let h = harness().await;
    let recorder = h.tracker.recorder();
    recorder.record_snapshot().await;

    h.sol.fail_balance(true);
    assert_eq!(recorder.record_snapshot().await, TickOutcome::ProviderFailed);
    assert_eq!(h.tracker.store.count().await.unwrap(), 1);

    // both calls were still issued; the abort happens after gathering
    assert_eq!(h.eth.balance_calls(), 2);
    assert_eq!(h.sol.balance_calls(), 2);
}

#[tokio::test]
async fn failing_gas_price_aborts_the_tick() {
    let h = harness().await;
    h.eth.fail_gas(true);

    assert_eq!(
        h.tracker.recorder().record_snapshot().await,
        TickOutcome::ProviderFailed
    );
    assert_eq!(h.tracker.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn recording_resumes_after_provider_recovers() {
    let h = harness().await;
    let recorder = h.tracker.recorder();

    h.eth.fail_balance(true);
    recorder.record_snapshot().await;
    recorder.record_snapshot().await;
    h.eth.fail_balance(false);
    h.eth.set_balance(3 * ONE_ETH / 2);
    recorder.record_snapshot().await;

    let rows = h.tracker.store.range_since(0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].eth_balance, 1.5);
}

#[tokio::test]
async fn slow_provider_hits_tick_timeout() {
    let h = harness_with(
        ScriptedProvider::new(Chain::Ethereum, ONE_ETH)
            .with_gas(1)
            .with_delay(Duration::from_millis(500)),
        ScriptedProvider::new(Chain::Solana, ONE_SOL),
    )
    .await;
    let recorder = h
        .tracker
        .recorder()
        .with_tick_timeout(Duration::from_millis(20));

    assert_eq!(recorder.record_snapshot().await, TickOutcome::ProviderFailed);
    assert_eq!(h.tracker.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn providers_are_queried_concurrently() {
    let delay = Duration::from_millis(200);
    let h = harness_with(
        ScriptedProvider::new(Chain::Ethereum, ONE_ETH)
            .with_gas(1)
            .with_delay(delay),
        ScriptedProvider::new(Chain::Solana, ONE_SOL).with_delay(delay),
    )
    .await;

    let started = Instant::now();
    let outcome = h.tracker.recorder().record_snapshot().await;
    let elapsed = started.elapsed();

    assert!(matches!(outcome, TickOutcome::Recorded(_)));
    assert!(elapsed >= delay);
    // sequential calls would take at least twice the delay
    assert!(
        elapsed < delay * 2 - Duration::from_millis(50),
        "tick took {elapsed:?}"
    );
}

#[tokio::test]
async fn storage_failure_is_reported_not_fatal() {
    let h = harness().await;
    h.tracker.store.pool().close().await;

    assert_eq!(
        h.tracker.recorder().record_snapshot().await,
        TickOutcome::StorageFailed
    );
}

#[tokio::test]
async fn scheduler_records_immediately_on_start() {
    let h = harness().await;
    let store = h.tracker.store.clone();
    let scheduler = Scheduler::new(h.tracker.recorder(), Duration::from_secs(3600));

    // The shutdown signal is only polled between ticks, so once the first
    // balance call is seen the first tick has already finished.
    let eth = h.eth.clone();
    let shutdown = async move {
        while eth.balance_calls() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), scheduler.run_until(shutdown))
        .await
        .expect("first tick should not wait for the interval");

    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn scheduler_keeps_ticking_through_failures() {
    let h = harness().await;
    let metrics = MetricsHandle::new();
    let scheduler = Scheduler::new(h.tracker.recorder(), Duration::from_millis(10))
        .with_metrics(metrics.clone());

    h.sol.fail_balance(true);
    let sol = h.sol.clone();
    let shutdown = async move {
        while sol.balance_calls() < 3 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        sol.fail_balance(false);
        // More than three failing ticks may have run by now; count two
        // ticks issued after the flip, both of which must succeed.
        let flipped_at = sol.balance_calls();
        while sol.balance_calls() < flipped_at + 2 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), scheduler.run_until(shutdown))
        .await
        .expect("scheduler should stop on shutdown");

    let rows = h.tracker.store.count().await.unwrap();
    assert!(rows >= 2);
    let text = String::from_utf8(metrics.render().unwrap()).unwrap();
    assert!(text.contains("tracker_tick_failures_total{reason=\"provider\"}"));
    assert!(text.contains(&format!("tracker_snapshots_recorded_total {rows}")));
}
