use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use common::{Error, KlineProvider, RawKline, Result, Timeframe};

/// REST client for the MEXC contract kline endpoint.
///
/// Read-only and unauthenticated. Request timeouts are set on the HTTP
/// client; the scheduler never cancels a fetch itself.
pub struct MexcClient {
    base_url: String,
    http: Client,
}

impl MexcClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl KlineProvider for MexcClient {
    async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<RawKline>> {
        let url = format!("{}/kline/{symbol}", self.base_url);
        let limit = limit.to_string();

        debug!(symbol, interval = timeframe.interval_code(), "Fetching klines");
        let resp = self
            .http
            .get(&url)
            .query(&[("interval", timeframe.interval_code()), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Provider(format!("HTTP {status}: {body}")));
        }
        parse_kline_response(&body)
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

/// The endpoint answers either with a bare row array or with an envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum KlineResponse {
    Bare(Vec<RawKline>),
    Envelope(KlineEnvelope),
}

/// `success` is required. Rate-limit replies carry only `code` and `message`.
#[derive(Deserialize)]
struct KlineEnvelope {
    success: bool,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<KlineData>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KlineData {
    Rows(Vec<RawKline>),
    Columns(KlineColumns),
}

/// Column-per-field form. `time` is in seconds here.
#[derive(Deserialize)]
struct KlineColumns {
    time: Vec<Value>,
    #[serde(default)]
    open: Vec<Value>,
    #[serde(default)]
    close: Vec<Value>,
    #[serde(default)]
    high: Vec<Value>,
    #[serde(default)]
    low: Vec<Value>,
    #[serde(default)]
    vol: Vec<Value>,
}

impl KlineColumns {
    /// Transpose into provider-order rows with millisecond timestamps.
    /// Short columns leave `null` cells, which the normalizer drops.
    fn into_rows(self) -> Vec<RawKline> {
        let cell = |column: &[Value], i: usize| column.get(i).cloned().unwrap_or(Value::Null);
        (0..self.time.len())
            .map(|i| {
                vec![
                    seconds_to_millis(&self.time[i]),
                    cell(&self.open, i),
                    cell(&self.close, i),
                    cell(&self.high, i),
                    cell(&self.low, i),
                    cell(&self.vol, i),
                ]
            })
            .collect()
    }
}

fn seconds_to_millis(value: &Value) -> Value {
    let secs = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match secs.and_then(|s| s.checked_mul(1000)) {
        Some(ms) => Value::from(ms),
        None => Value::Null,
    }
}

pub(crate) fn parse_kline_response(body: &str) -> Result<Vec<RawKline>> {
    match serde_json::from_str::<KlineResponse>(body)? {
        KlineResponse::Bare(rows) => Ok(rows),
        KlineResponse::Envelope(envelope) => {
            if !envelope.success {
                return Err(Error::Provider(format!(
                    "code {}: {}",
                    envelope.code,
                    envelope.message.unwrap_or_default()
                )));
            }
            Ok(match envelope.data {
                None => Vec::new(),
                Some(KlineData::Rows(rows)) => rows,
                Some(KlineData::Columns(columns)) => columns.into_rows(),
            })
        }
    }
}
