use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use common::{Bar, BarSeries, RawKline};

// Provider-native column layout.
const TIME: usize = 0;
const OPEN: usize = 1;
const CLOSE: usize = 2;
const HIGH: usize = 3;
const LOW: usize = 4;
const VOLUME: usize = 5;
const MIN_COLUMNS: usize = 6;

/// Why a batch of rows did not become a usable series.
///
/// Neither case is fatal. The scheduler treats both as "no decision" for
/// the pair this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("insufficient data: {have} usable bars, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("rows out of order: bar {index} does not advance open_time")]
    OutOfOrder { index: usize },
}

/// Convert raw provider rows into a canonical, time-ordered series.
///
/// Malformed rows are dropped: too few columns, an unparseable or non-finite
/// number, an invalid timestamp, negative volume, or OHLC values that
/// contradict each other. Rows are not re-sorted. If what remains does not
/// strictly advance in time the whole batch is rejected.
pub fn normalize(rows: &[RawKline], min_len: usize) -> Result<BarSeries, NormalizeError> {
    let bars: Vec<Bar> = rows.iter().filter_map(parse_row).collect();

    let dropped = rows.len() - bars.len();
    if dropped > 0 {
        debug!(dropped, kept = bars.len(), "Dropped malformed kline rows");
    }

    let series =
        BarSeries::from_bars(bars).map_err(|e| NormalizeError::OutOfOrder { index: e.index })?;

    if series.len() < min_len {
        return Err(NormalizeError::InsufficientData {
            have: series.len(),
            need: min_len,
        });
    }
    Ok(series)
}

fn parse_row(row: &RawKline) -> Option<Bar> {
    if row.len() < MIN_COLUMNS {
        return None;
    }
    let bar = Bar {
        open_time: parse_time(&row[TIME])?,
        open: parse_number(&row[OPEN])?,
        high: parse_number(&row[HIGH])?,
        low: parse_number(&row[LOW])?,
        close: parse_number(&row[CLOSE])?,
        volume: parse_number(&row[VOLUME])?,
    };
    (bar.is_consistent() && bar.volume >= 0.0).then_some(bar)
}

/// JSON numbers and numeric strings; anything else counts as missing.
fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Milliseconds since the Unix epoch.
fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    let ms = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Utc.timestamp_millis_opt(ms).single()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
