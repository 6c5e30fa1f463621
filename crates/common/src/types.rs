use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One closed (or still forming) price bar, already parsed and validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Absolute size of the open-close body.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Full high-low range.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Distance from the bottom of the body down to the low.
    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// Distance from the top of the body up to the high.
    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    /// `high >= max(open, close)` and `low <= min(open, close)`.
    pub fn is_consistent(&self) -> bool {
        self.high >= self.open.max(self.close) && self.low <= self.open.min(self.close)
    }
}

/// Returned when a bar sequence does not strictly advance in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("bar {index} does not advance open_time")]
pub struct OutOfOrder {
    /// Index of the first bar whose `open_time` is not after its predecessor's.
    pub index: usize,
}

/// Time-ordered bars for one symbol and timeframe, most recent last.
///
/// `open_time` is strictly increasing. The only ways in are the normalizer
/// and [`BarSeries::from_bars`], both of which check that.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn from_bars(bars: Vec<Bar>) -> Result<Self, OutOfOrder> {
        if let Some(index) = bars
            .windows(2)
            .position(|w| w[1].open_time <= w[0].open_time)
        {
            return Err(OutOfOrder { index: index + 1 });
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Drop the trailing bar if its interval has not elapsed at `now`.
    ///
    /// Providers return the in-progress bar as the final row; its high, low
    /// and volume keep moving until the interval closes.
    pub fn without_forming_bar(mut self, timeframe: Timeframe, now: DateTime<Utc>) -> Self {
        if let Some(last) = self.bars.last() {
            if last.open_time + timeframe.duration() > now {
                self.bars.pop();
            }
        }
        self
    }
}

/// Bar interval. Serialized by its short label (`"15m"`, `"1h"`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Interval code understood by the MEXC contract kline endpoint.
    pub fn interval_code(self) -> &'static str {
        match self {
            Timeframe::M1 => "Min1",
            Timeframe::M5 => "Min5",
            Timeframe::M15 => "Min15",
            Timeframe::M30 => "Min30",
            Timeframe::H1 => "Min60",
            Timeframe::H4 => "Hour4",
            Timeframe::D1 => "Day1",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    pub fn duration(self) -> Duration {
        let minutes = match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        };
        Duration::minutes(minutes)
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Identifies one independent signal stream: a symbol on a timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl SignalKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl std::fmt::Display for SignalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timeframe)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// What the evaluator concluded about the most recent bar.
/// Lives for one cycle unless the dedup store accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalDecision {
    pub direction: Direction,
    /// `open_time` of the bar the decision was made on.
    pub bar_time: DateTime<Utc>,
    /// Close of that bar.
    pub price: f64,
}

/// Last signal emitted for a key. Overwritten on every accepted signal,
/// never removed while the process runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub key: SignalKey,
    pub last_bar_time: DateTime<Utc>,
    pub last_direction: Direction,
}

/// Liveness snapshot shared between the scheduler and the health endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    pub cycles_completed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub pairs_failed_last_cycle: usize,
    pub alerts_emitted_total: u64,
    /// Pairs holding a dedup record.
    pub tracked_keys: usize,
}
