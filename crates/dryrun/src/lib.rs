use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Bar, Error, KlineProvider, Notifier, RawKline, Result, Timeframe};

/// Alerts kept in memory by [`LogNotifier`].
const MAX_KEPT_ALERTS: usize = 100;

type Book = (String, Timeframe);

/// Encode a bar as a provider-order row: `time(ms), open, close, high, low, volume`.
pub fn kline_row(bar: &Bar) -> RawKline {
    vec![
        json!(bar.open_time.timestamp_millis()),
        json!(bar.open),
        json!(bar.close),
        json!(bar.high),
        json!(bar.low),
        json!(bar.volume),
    ]
}

/// In-memory market-data source.
///
/// Serves whatever rows were loaded for a symbol and timeframe, newest last,
/// trimmed to the requested limit. Nothing goes over the network.
#[derive(Default)]
pub struct ReplayProvider {
    books: Arc<RwLock<HashMap<Book, Vec<RawKline>>>>,
    /// Books that answer every fetch with an error.
    failing: Arc<RwLock<HashSet<Book>>>,
    fetches: AtomicUsize,
}

impl ReplayProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows served for a symbol and timeframe.
    pub async fn set_rows(&self, symbol: &str, timeframe: Timeframe, rows: Vec<RawKline>) {
        self.books
            .write()
            .await
            .insert((symbol.to_string(), timeframe), rows);
    }

    pub async fn set_bars(&self, symbol: &str, timeframe: Timeframe, bars: &[Bar]) {
        self.set_rows(symbol, timeframe, bars.iter().map(kline_row).collect())
            .await;
    }

    /// Append one bar, as if a new interval had closed.
    pub async fn push_bar(&self, symbol: &str, timeframe: Timeframe, bar: &Bar) {
        self.books
            .write()
            .await
            .entry((symbol.to_string(), timeframe))
            .or_default()
            .push(kline_row(bar));
    }

    /// Make every later fetch for this symbol and timeframe fail.
    pub async fn fail(&self, symbol: &str, timeframe: Timeframe) {
        self.failing
            .write()
            .await
            .insert((symbol.to_string(), timeframe));
    }

    /// Total fetches served or failed so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl KlineProvider for ReplayProvider {
    async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<RawKline>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let book = (symbol.to_string(), timeframe);

        if self.failing.read().await.contains(&book) {
            return Err(Error::Provider(format!(
                "replay: simulated failure for {symbol} {timeframe}"
            )));
        }

        let books = self.books.read().await;
        let rows = books.get(&book).ok_or_else(|| {
            Error::Provider(format!("replay: no klines loaded for {symbol} {timeframe}"))
        })?;
        let start = rows.len().saturating_sub(limit);
        debug!(symbol, timeframe = %timeframe, rows = rows.len() - start, "Replay fetch served");
        Ok(rows[start..].to_vec())
    }
}

/// Notifier that writes alerts to the log instead of a chat.
///
/// Used for `DELIVERY_MODE=log`. Keeps the most recent alerts in memory so
/// they can be inspected; `failing()` builds one that rejects every send.
#[derive(Default)]
pub struct LogNotifier {
    sent: Arc<RwLock<VecDeque<String>>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Alerts delivered so far, oldest first.
    pub async fn sent(&self) -> Vec<String> {
        self.sent.read().await.iter().cloned().collect()
    }

    /// Every call to `send`, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(Error::Notify("log notifier configured to fail".into()));
        }

        info!(alert = %text, "Alert (log delivery)");
        let mut sent = self.sent.write().await;
        if sent.len() == MAX_KEPT_ALERTS {
            sent.pop_front();
        }
        sent.push_back(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(i: i64) -> Bar {
        Bar {
            open_time: Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10.0,
        }
    }

    #[tokio::test]
    async fn serves_most_recent_rows_up_to_limit() {
        let provider = ReplayProvider::new();
        let bars: Vec<Bar> = (0..10).map(bar).collect();
        provider.set_bars("ETH_USDT", Timeframe::M1, &bars).await;

        let rows = provider.fetch_klines("ETH_USDT", Timeframe::M1, 3).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], kline_row(&bars[9]));
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn row_uses_provider_column_order() {
        let row = kline_row(&bar(0));
        assert_eq!(row[0], json!(1_700_000_000_000i64));
        assert_eq!(row[2], json!(1.5)); // close before high
        assert_eq!(row[3], json!(2.0));
    }

    #[tokio::test]
    async fn unknown_book_is_an_error() {
        let provider = ReplayProvider::new();
        assert!(provider.fetch_klines("X", Timeframe::H1, 10).await.is_err());
    }

    #[tokio::test]
    async fn push_bar_appends() {
        let provider = ReplayProvider::new();
        provider.push_bar("X", Timeframe::H1, &bar(0)).await;
        provider.push_bar("X", Timeframe::H1, &bar(1)).await;
        let rows = provider.fetch_klines("X", Timeframe::H1, 50).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn failing_book_errors() {
        let provider = ReplayProvider::new();
        provider.set_bars("X", Timeframe::H1, &[bar(0)]).await;
        provider.fail("X", Timeframe::H1).await;
        assert!(matches!(
            provider.fetch_klines("X", Timeframe::H1, 1).await,
            Err(Error::Provider(_))
        ));
    }

    #[tokio::test]
    async fn log_notifier_keeps_recent_alerts() {
        let notifier = LogNotifier::new();
        for i in 0..(MAX_KEPT_ALERTS + 5) {
            notifier.send(&format!("alert {i}")).await.unwrap();
        }
        let sent = notifier.sent().await;
        assert_eq!(sent.len(), MAX_KEPT_ALERTS);
        assert_eq!(sent[0], "alert 5");
        assert_eq!(notifier.attempts(), MAX_KEPT_ALERTS + 5);
    }

    #[tokio::test]
    async fn failing_notifier_counts_attempts() {
        let notifier = LogNotifier::failing();
        assert!(notifier.send("x").await.is_err());
        assert!(notifier.sent().await.is_empty());
        assert_eq!(notifier.attempts(), 1);
    }
}
