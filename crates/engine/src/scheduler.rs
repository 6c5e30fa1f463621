use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use common::{HealthStatus, KlineProvider, Notifier, RawKline, Result, SignalKey};
use dedup::{Admission, DedupStore};
use strategy::{AlertConfig, Evaluator, WatchlistConfig};

use crate::alert::format_alert;
use crate::normalizer::{normalize, NormalizeError};

/// What the scheduler polls and how.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub keys: Vec<SignalKey>,
    /// Delay between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
    pub kline_limit: usize,
    pub max_concurrent_fetches: usize,
    pub closed_bars_only: bool,
    pub alert: AlertConfig,
}

impl SchedulerSettings {
    pub fn from_watchlist(cfg: &WatchlistConfig) -> Self {
        Self {
            keys: cfg.keys(),
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            kline_limit: cfg.kline_limit,
            max_concurrent_fetches: cfg.max_concurrent_fetches.max(1),
            closed_bars_only: cfg.closed_bars_only,
            alert: cfg.alert,
        }
    }
}

/// Tally of one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Pairs whose series reached the evaluator.
    pub evaluated: usize,
    /// Pairs skipped on a fetch error or a rejected batch.
    pub failed: usize,
    /// Pairs with too few usable bars.
    pub insufficient: usize,
    pub decisions: usize,
    pub emitted: usize,
    pub suppressed: usize,
    pub delivery_failures: usize,
}

/// Drives fetch → normalize → evaluate → dedup → notify over every
/// configured key, forever.
///
/// This is the ONLY component that writes to the `DedupStore` and the only
/// caller of `Notifier::send`. A failure on one pair is logged and the cycle
/// moves on to the next.
pub struct Scheduler {
    provider: Arc<dyn KlineProvider>,
    notifier: Arc<dyn Notifier>,
    evaluator: Arc<dyn Evaluator>,
    settings: SchedulerSettings,
    health: Arc<RwLock<HealthStatus>>,
}

impl Scheduler {
    pub fn new(
        provider: Arc<dyn KlineProvider>,
        notifier: Arc<dyn Notifier>,
        evaluator: Arc<dyn Evaluator>,
        settings: SchedulerSettings,
        health: Arc<RwLock<HealthStatus>>,
    ) -> Self {
        Self {
            provider,
            notifier,
            evaluator,
            settings,
            health,
        }
    }

    /// Run the polling loop. Never returns; stop it by dropping the task.
    pub async fn run(self, mut store: DedupStore) {
        info!(
            keys = self.settings.keys.len(),
            interval = ?self.settings.poll_interval,
            evaluator = self.evaluator.name(),
            "Scheduler running"
        );
        loop {
            self.run_cycle(&mut store).await;
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    pub async fn run_cycle(&self, store: &mut DedupStore) -> CycleReport {
        self.run_cycle_at(store, Utc::now()).await
    }

    /// One pass over every key, with `now` deciding which trailing bars are
    /// still forming.
    pub async fn run_cycle_at(&self, store: &mut DedupStore, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();
        let limit = self.settings.kline_limit;

        // Each key appears once, so no two fetches for the same key overlap.
        let keys = self.settings.keys.clone();
        let fetched: Vec<(SignalKey, Result<Vec<RawKline>>)> = stream::iter(keys)
            .map(|key| {
                let provider = Arc::clone(&self.provider);
                async move {
                    let rows = provider.fetch_klines(&key.symbol, key.timeframe, limit).await;
                    (key, rows)
                }
            })
            .buffered(self.settings.max_concurrent_fetches)
            .collect()
            .await;

        let min_bars = self.evaluator.min_bars();

        for (key, rows) in fetched {
            let rows = match rows {
                Ok(rows) => rows,
                Err(e) => {
                    error!(key = %key, error = %e, "Kline fetch failed, skipping pair this cycle");
                    report.failed += 1;
                    continue;
                }
            };

            let mut series = match normalize(&rows, min_bars) {
                Ok(series) => series,
                Err(NormalizeError::InsufficientData { have, need }) => {
                    debug!(key = %key, have, need, "Not enough bars yet");
                    report.insufficient += 1;
                    continue;
                }
                Err(e @ NormalizeError::OutOfOrder { .. }) => {
                    warn!(key = %key, error = %e, "Rejected kline batch");
                    report.failed += 1;
                    continue;
                }
            };

            if self.settings.closed_bars_only {
                series = series.without_forming_bar(key.timeframe, now);
                if series.len() < min_bars {
                    debug!(
                        key = %key,
                        have = series.len(),
                        need = min_bars,
                        "Not enough closed bars yet"
                    );
                    report.insufficient += 1;
                    continue;
                }
            }

            report.evaluated += 1;
            let Some(decision) = self.evaluator.evaluate(&series) else {
                continue;
            };
            report.decisions += 1;

            match store.admit(&key, &decision) {
                Admission::Suppress => report.suppressed += 1,
                Admission::Emit => {
                    report.emitted += 1;
                    // Recorded before delivery: a failed send is not retried.
                    let text = format_alert(&key, &decision, &self.settings.alert);
                    match self.notifier.send(&text).await {
                        Ok(()) => info!(key = %key, direction = %decision.direction, "Alert sent"),
                        Err(e) => {
                            error!(key = %key, error = %e, "Alert delivery failed");
                            report.delivery_failures += 1;
                        }
                    }
                }
            }
        }

        {
            let mut health = self.health.write().await;
            health.cycles_completed += 1;
            health.last_cycle_at = Some(now);
            health.pairs_failed_last_cycle = report.failed;
            health.alerts_emitted_total += report.emitted as u64;
            health.tracked_keys = store.len();
        }

        info!(
            evaluated = report.evaluated,
            failed = report.failed,
            insufficient = report.insufficient,
            emitted = report.emitted,
            suppressed = report.suppressed,
            "Polling cycle complete"
        );
        report
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::{Bar, Direction, Timeframe};
    use dryrun::{LogNotifier, ReplayProvider};
    use strategy::{SignalParams, SweepWickVolume};

    const T0: i64 = 1_700_000_100; // aligned to 15m
    const STEP: i64 = 900;

    fn flat_bar(i: i64) -> Bar {
        Bar {
            open_time: Utc.timestamp_opt(T0 + i * STEP, 0).unwrap(),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.2,
            volume: 100.0,
        }
    }

    /// Quiet bar at `i` that sweeps the low with a long lower wick on
    /// double volume.
    fn hammer(i: i64) -> Bar {
        Bar {
            open_time: Utc.timestamp_opt(T0 + i * STEP, 0).unwrap(),
            open: 99.5,
            high: 100.2,
            low: 98.01,
            close: 100.0,
            volume: 200.0,
        }
    }

    fn long_setup() -> Vec<Bar> {
        let mut bars: Vec<Bar> = (0..24).map(flat_bar).collect();
        bars.push(hammer(24));
        bars
    }

    /// Long after the last bar in any test has closed.
    fn later() -> DateTime<Utc> {
        Utc.timestamp_opt(T0 + 1_000 * STEP, 0).unwrap()
    }

    fn settings(keys: Vec<SignalKey>, closed_bars_only: bool) -> SchedulerSettings {
        SchedulerSettings {
            keys,
            poll_interval: Duration::from_secs(60),
            kline_limit: 50,
            max_concurrent_fetches: 4,
            closed_bars_only,
            alert: AlertConfig::default(),
        }
    }

    struct Harness {
        provider: Arc<ReplayProvider>,
        notifier: Arc<LogNotifier>,
        health: Arc<RwLock<HealthStatus>>,
        scheduler: Scheduler,
    }

    fn harness(keys: Vec<SignalKey>, closed_bars_only: bool, notifier: LogNotifier) -> Harness {
        let provider = Arc::new(ReplayProvider::new());
        let notifier = Arc::new(notifier);
        let health = Arc::new(RwLock::new(HealthStatus::default()));
        let scheduler = Scheduler::new(
            provider.clone(),
            notifier.clone(),
            Arc::new(SweepWickVolume::new(SignalParams::default())),
            settings(keys, closed_bars_only),
            health.clone(),
        );
        Harness {
            provider,
            notifier,
            health,
            scheduler,
        }
    }

    fn sui() -> SignalKey {
        SignalKey::new("SUI_USDT", Timeframe::M15)
    }

    #[tokio::test]
    async fn signal_emits_once_across_repeated_polls() {
        let h = harness(vec![sui()], false, LogNotifier::new());
        h.provider.set_bars("SUI_USDT", Timeframe::M15, &long_setup()).await;
        let mut store = DedupStore::new();

        let first = h.scheduler.run_cycle_at(&mut store, later()).await;
        let second = h.scheduler.run_cycle_at(&mut store, later()).await;

        assert_eq!(first.emitted, 1);
        assert_eq!(second.emitted, 0);
        assert_eq!(second.suppressed, 1);

        let sent = h.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("🟢 LONG signal | SUI_USDT | 15m"), "got: {}", sent[0]);

        let record = store.get(&sui()).unwrap();
        assert_eq!(record.last_bar_time, hammer(24).open_time);
        assert_eq!(record.last_direction, Direction::Long);
    }

    #[tokio::test]
    async fn new_closing_bar_rearms() {
        let h = harness(vec![sui()], false, LogNotifier::new());
        h.provider.set_bars("SUI_USDT", Timeframe::M15, &long_setup()).await;
        let mut store = DedupStore::new();
        h.scheduler.run_cycle_at(&mut store, later()).await;

        // Another hammer on the next bar: the new low sweeps the prior one.
        let mut next = hammer(25);
        next.low = 97.0;
        next.open = 98.5;
        next.close = 99.0;
        next.high = 99.1;
        next.volume = 400.0;
        h.provider.push_bar("SUI_USDT", Timeframe::M15, &next).await;

        let report = h.scheduler.run_cycle_at(&mut store, later()).await;
        assert_eq!(report.emitted, 1);
        assert_eq!(h.notifier.sent().await.len(), 2);
        assert_eq!(store.get(&sui()).unwrap().last_bar_time, next.open_time);
    }

    #[tokio::test]
    async fn fetch_failure_is_isolated_to_its_pair() {
        let broken = SignalKey::new("BROKEN_USDT", Timeframe::M15);
        let h = harness(vec![broken.clone(), sui()], false, LogNotifier::new());
        h.provider.set_bars("SUI_USDT", Timeframe::M15, &long_setup()).await;
        h.provider.fail("BROKEN_USDT", Timeframe::M15).await;
        let mut store = DedupStore::new();

        let report = h.scheduler.run_cycle_at(&mut store, later()).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.emitted, 1);
        assert!(store.get(&broken).is_none());
        assert_eq!(h.health.read().await.pairs_failed_last_cycle, 1);
    }

    #[tokio::test]
    async fn rejected_batch_is_isolated_to_its_pair() {
        let jumbled = SignalKey::new("INJ_USDT", Timeframe::M15);
        let h = harness(vec![jumbled.clone(), sui()], false, LogNotifier::new());
        h.provider.set_bars("SUI_USDT", Timeframe::M15, &long_setup()).await;

        let mut rows: Vec<RawKline> = long_setup().iter().map(dryrun::kline_row).collect();
        rows.swap(10, 11);
        h.provider.set_rows("INJ_USDT", Timeframe::M15, rows).await;
        let mut store = DedupStore::new();

        let report = h.scheduler.run_cycle_at(&mut store, later()).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.insufficient, 0);
        assert_eq!(report.emitted, 1);
        assert!(store.get(&jumbled).is_none());
        assert!(store.get(&sui()).is_some());

        let sent = h.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("SUI_USDT"));
    }

    #[tokio::test]
    async fn unknown_symbol_is_a_failure_not_a_panic() {
        let h = harness(vec![sui()], false, LogNotifier::new());
        let mut store = DedupStore::new();
        let report = h.scheduler.run_cycle_at(&mut store, later()).await;
        assert_eq!(report.failed, 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn short_history_is_no_decision() {
        let h = harness(vec![sui()], false, LogNotifier::new());
        let bars: Vec<Bar> = long_setup().into_iter().skip(15).collect();
        h.provider.set_bars("SUI_USDT", Timeframe::M15, &bars).await;
        let mut store = DedupStore::new();

        let report = h.scheduler.run_cycle_at(&mut store, later()).await;
        assert_eq!(report.insufficient, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.emitted, 0);
        assert!(h.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_still_records_and_is_not_retried() {
        let h = harness(vec![sui()], false, LogNotifier::failing());
        h.provider.set_bars("SUI_USDT", Timeframe::M15, &long_setup()).await;
        let mut store = DedupStore::new();

        let first = h.scheduler.run_cycle_at(&mut store, later()).await;
        assert_eq!(first.emitted, 1);
        assert_eq!(first.delivery_failures, 1);
        assert!(store.get(&sui()).is_some());

        let second = h.scheduler.run_cycle_at(&mut store, later()).await;
        assert_eq!(second.emitted, 0);
        assert_eq!(second.suppressed, 1);
        assert_eq!(h.notifier.attempts(), 1);
    }

    #[tokio::test]
    async fn forming_bar_is_not_evaluated() {
        let h = harness(vec![sui()], true, LogNotifier::new());
        let mut bars = long_setup();
        bars.push(flat_bar(25));
        h.provider.set_bars("SUI_USDT", Timeframe::M15, &bars).await;
        let mut store = DedupStore::new();

        // Bar 25 opened but has not closed: the hammer at 24 is the latest closed bar.
        let mid_bar_25 = Utc.timestamp_opt(T0 + 25 * STEP + 300, 0).unwrap();
        let report = h.scheduler.run_cycle_at(&mut store, mid_bar_25).await;
        assert_eq!(report.emitted, 1);
        assert_eq!(store.get(&sui()).unwrap().last_bar_time, hammer(24).open_time);

        // Once 25 closes it becomes the bar under evaluation, and it is quiet.
        let after_25 = Utc.timestamp_opt(T0 + 26 * STEP, 0).unwrap();
        let report = h.scheduler.run_cycle_at(&mut store, after_25).await;
        assert_eq!(report.decisions, 0);
        assert_eq!(h.notifier.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn health_tracks_cycles_and_alerts() {
        let h = harness(vec![sui()], false, LogNotifier::new());
        h.provider.set_bars("SUI_USDT", Timeframe::M15, &long_setup()).await;
        let mut store = DedupStore::new();

        h.scheduler.run_cycle_at(&mut store, later()).await;
        h.scheduler.run_cycle_at(&mut store, later()).await;

        let health = h.health.read().await;
        assert_eq!(health.cycles_completed, 2);
        assert_eq!(health.alerts_emitted_total, 1);
        assert_eq!(health.tracked_keys, 1);
        assert_eq!(health.last_cycle_at, Some(later()));
    }

    #[tokio::test]
    async fn each_key_fetched_once_per_cycle() {
        let keys = vec![
            sui(),
            SignalKey::new("SUI_USDT", Timeframe::H1),
            SignalKey::new("INJ_USDT", Timeframe::M15),
        ];
        let h = harness(keys, false, LogNotifier::new());
        let mut store = DedupStore::new();
        h.scheduler.run_cycle_at(&mut store, later()).await;
        assert_eq!(h.provider.fetch_count(), 3);
    }
}
