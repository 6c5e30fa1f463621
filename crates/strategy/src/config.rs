use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use common::{SignalKey, Timeframe};

/// Watchlist and rule parameters (TOML).
///
/// Example `config/watchlist.toml`:
/// ```toml
/// poll_interval_secs = 60
/// kline_limit = 50
///
/// [signal]
/// sweep_lookback = 4
/// wick_multiplier = 1.5
/// volume_window = 20
/// volume_multiplier = 1.0
///
/// [alert]
/// take_profit_pct = 0.02
/// stop_loss_pct = 0.01
///
/// [[watch]]
/// timeframe = "15m"
/// symbols = ["SUI_USDT", "INJ_USDT"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchlistConfig {
    /// Delay between polling cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Bars requested from the provider per fetch.
    #[serde(default = "default_kline_limit")]
    pub kline_limit: usize,
    /// Upper bound on fetches in flight during one cycle.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Drop the still-forming trailing bar before evaluation.
    #[serde(default = "default_closed_bars_only")]
    pub closed_bars_only: bool,
    #[serde(default)]
    pub signal: SignalParams,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(rename = "watch")]
    pub watches: Vec<WatchGroup>,
}

/// Symbols polled on one timeframe.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchGroup {
    pub timeframe: Timeframe,
    pub symbols: Vec<String>,
}

/// Parameters of the sweep + wick + volume rule set.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalParams {
    /// Bars before the last one that define the swept range.
    pub sweep_lookback: usize,
    /// Wick must exceed `wick_multiplier * body`.
    pub wick_multiplier: f64,
    /// Bars before the last one averaged for volume confirmation.
    pub volume_window: usize,
    /// Last volume must exceed `volume_multiplier * mean`. Above 1.0 is stricter.
    pub volume_multiplier: f64,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            sweep_lookback: 4,
            wick_multiplier: 1.5,
            volume_window: 20,
            volume_multiplier: 1.0,
        }
    }
}

impl SignalParams {
    /// Shortest series both rolling windows can be computed on.
    pub fn min_bars(&self) -> usize {
        (self.volume_window + 1).max(self.sweep_lookback + 2)
    }
}

/// Take-profit / stop-loss distances quoted in alert text.
/// Informational only; never used by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    /// e.g. 0.02 = 2% beyond entry.
    pub take_profit_pct: f64,
    /// e.g. 0.01 = 1% against entry.
    pub stop_loss_pct: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            take_profit_pct: 0.02,
            stop_loss_pct: 0.01,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read watchlist config at '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse watchlist config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid watchlist config: {0}")]
    Invalid(String),
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_kline_limit() -> usize {
    50
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_closed_bars_only() -> bool {
    true
}

const DEFAULT_15M: &[&str] = &[
    "FLOKI_USDT", "SUI_USDT", "ONDO_USDT", "APT_USDT", "STORJ_USDT", "TAKE_USDT", "MOVE_USDT",
    "WLFI_USDT", "INJ_USDT", "WLD_USDT", "HYPE_USDT", "BNB_USDT", "TIA_USDT", "PUMPFUN_USDT",
    "HOLO_USDT", "ARB_USDT", "TONCOIN_USDT", "NEAR_USDT", "TAO_USDT", "ETHFI_USDT", "SLF_USDT",
    "MRLN_USDT", "STREAMER_USDT",
];

const DEFAULT_1H: &[&str] = &[
    "LTC_USDT", "XLM_USDT", "XRP_USDT", "APT_USDT", "TAO_USDT", "ONDO_USDT", "DOT_USDT",
    "NEAR_USDT", "HYPE_USDT", "MANA_USDT", "ARB_USDT", "INJ_USDT", "MOVE_USDT", "FLOKI_USDT",
];

impl Default for WatchlistConfig {
    fn default() -> Self {
        let group = |timeframe, symbols: &[&str]| WatchGroup {
            timeframe,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        };
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            kline_limit: default_kline_limit(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            closed_bars_only: default_closed_bars_only(),
            signal: SignalParams::default(),
            alert: AlertConfig::default(),
            watches: vec![
                group(Timeframe::M15, DEFAULT_15M),
                group(Timeframe::H1, DEFAULT_1H),
            ],
        }
    }
}

impl WatchlistConfig {
    /// Load and validate from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Like [`load`](Self::load), but falls back to the built-in watchlist
    /// when the file does not exist. A file that exists but is broken is
    /// still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Watchlist config not found, using built-in defaults");
            return Ok(Self::default());
        }
        let cfg = Self::load(path)?;
        info!(path = %path.display(), keys = cfg.keys().len(), "Loaded watchlist config");
        Ok(cfg)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.signal;
        if s.sweep_lookback < 1 {
            return Err(ConfigError::Invalid("signal.sweep_lookback must be >= 1".into()));
        }
        if s.wick_multiplier.is_nan() || s.wick_multiplier < 1.2 {
            return Err(ConfigError::Invalid(format!(
                "signal.wick_multiplier must be >= 1.2, got {}",
                s.wick_multiplier
            )));
        }
        if s.volume_window < 20 {
            return Err(ConfigError::Invalid(format!(
                "signal.volume_window must be >= 20, got {}",
                s.volume_window
            )));
        }
        if s.volume_multiplier.is_nan() || s.volume_multiplier <= 0.0 {
            return Err(ConfigError::Invalid("signal.volume_multiplier must be > 0".into()));
        }
        if self.poll_interval_secs < 1 {
            return Err(ConfigError::Invalid("poll_interval_secs must be >= 1".into()));
        }
        if self.max_concurrent_fetches < 1 {
            return Err(ConfigError::Invalid("max_concurrent_fetches must be >= 1".into()));
        }
        // One extra bar covers the forming bar dropped before evaluation.
        if self.kline_limit < s.min_bars() + 1 {
            return Err(ConfigError::Invalid(format!(
                "kline_limit must be at least {} for these signal windows",
                s.min_bars() + 1
            )));
        }
        let a = &self.alert;
        if !a.take_profit_pct.is_finite() || a.take_profit_pct < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "alert.take_profit_pct must be a non-negative number, got {}",
                a.take_profit_pct
            )));
        }
        // A stop at 100% or more puts the long stop price at or below zero.
        if !a.stop_loss_pct.is_finite() || a.stop_loss_pct < 0.0 || a.stop_loss_pct >= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "alert.stop_loss_pct must be in [0, 1), got {}",
                a.stop_loss_pct
            )));
        }
        if self.keys().is_empty() {
            return Err(ConfigError::Invalid("watchlist has no symbols".into()));
        }
        Ok(())
    }

    /// Every (symbol, timeframe) pair to poll, in file order, without duplicates.
    pub fn keys(&self) -> Vec<SignalKey> {
        let mut seen = HashSet::new();
        self.watches
            .iter()
            .flat_map(|group| {
                group
                    .symbols
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(move |s| SignalKey::new(s, group.timeframe))
            })
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }
}
