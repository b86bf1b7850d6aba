use std::future::Future;
use std::time::Duration;

use metrics::{MetricsHandle, REASON_PROVIDER, REASON_STORAGE};
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use crate::{Recorder, TickOutcome};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Drives the recorder: one tick right away, then one per interval.
///
/// Ticks run inline in a single task, so a slow tick delays the next one
/// instead of overlapping it. Missed ticks are skipped, not bursted.
pub struct Scheduler {
    recorder: Recorder,
    interval: Duration,
    metrics: Option<MetricsHandle>,
}

impl Scheduler {
    pub fn new(recorder: Recorder, interval: Duration) -> Self {
        Self {
            recorder,
            interval: interval.max(MIN_INTERVAL),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn tick(&self) -> TickOutcome {
        if let Some(metrics) = &self.metrics {
            metrics.tick_started();
        }
        let outcome = self.recorder.record_snapshot().await;
        if let Some(metrics) = &self.metrics {
            match outcome {
                TickOutcome::Recorded(_) => metrics.snapshot_recorded(),
                TickOutcome::ProviderFailed => metrics.tick_failed(REASON_PROVIDER),
                TickOutcome::StorageFailed => metrics.tick_failed(REASON_STORAGE),
            }
        }
        outcome
    }

    /// Runs until `shutdown` resolves. The signal is only checked between
    /// ticks, so an in-flight tick always completes.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "scheduler started");
        let mut tick: u64 = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            tick += 1;
            let outcome = self.tick().await;
            tracing::debug!(tick, ?outcome, "tick finished");
        }
        info!(ticks = tick, "scheduler stopped");
    }
}
