use async_trait::async_trait;
use serde_json::Value;

use crate::{Result, Timeframe};

/// One kline row exactly as the provider sent it.
///
/// Column order is provider-native: `time, open, close, high, low, volume, …`.
/// Cells may be JSON numbers or numeric strings. Nothing is parsed until the
/// row reaches the normalizer.
pub type RawKline = Vec<Value>;

/// Abstraction over the market-data source.
///
/// `MexcClient` implements this against the live contract REST API.
/// `ReplayProvider` implements this from in-memory rows for dry runs and tests.
///
/// Implementations own their own request timeouts. The scheduler never issues
/// two concurrent fetches for the same symbol and timeframe.
#[async_trait]
pub trait KlineProvider: Send + Sync {
    /// Fetch up to `limit` of the most recent bars, oldest first.
    async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<RawKline>>;
}
