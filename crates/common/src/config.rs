use crate::{Error, Result};

const DEFAULT_MEXC_BASE_URL: &str = "https://contract.mexc.com/api/v1/contract";

/// Where alerts go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Telegram Bot API. Requires `TELEGRAM_TOKEN` and `TELEGRAM_CHAT_IDS`.
    Telegram,
    /// Log only. For dry runs against the live provider.
    Log,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Telegram => write!(f, "telegram"),
            DeliveryMode::Log => write!(f, "log"),
        }
    }
}

#[derive(Clone)]
pub struct TelegramCredentials {
    pub token: String,
    pub chat_ids: Vec<i64>,
}

impl std::fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("token", &"<redacted>")
            .field("chat_ids", &self.chat_ids)
            .finish()
    }
}

/// Process settings loaded from environment variables at startup.
///
/// Rule parameters and the watchlist live in the TOML file named by
/// `watchlist_config_path`, not here.
#[derive(Debug, Clone)]
pub struct Config {
    pub delivery_mode: DeliveryMode,
    /// Present whenever `delivery_mode` is `Telegram`.
    pub telegram: Option<TelegramCredentials>,

    pub watchlist_config_path: String,

    // Provider
    pub mexc_base_url: String,
    pub http_timeout_secs: u64,

    // Health endpoint
    pub health_port: u16,
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Missing or malformed required values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            optional(key).ok_or_else(|| {
                Error::Config(format!(
                    "Required environment variable '{key}' is not set. Check your .env file."
                ))
            })
        };

        let delivery_mode = match optional("DELIVERY_MODE")
            .unwrap_or_else(|| "telegram".to_string())
            .to_lowercase()
            .as_str()
        {
            "telegram" => DeliveryMode::Telegram,
            "log" => DeliveryMode::Log,
            other => {
                return Err(Error::Config(format!(
                    "DELIVERY_MODE must be 'telegram' or 'log', got: '{other}'"
                )))
            }
        };

        let telegram = match delivery_mode {
            DeliveryMode::Telegram => Some(TelegramCredentials {
                token: required("TELEGRAM_TOKEN")?,
                chat_ids: parse_chat_ids(&required("TELEGRAM_CHAT_IDS")?)?,
            }),
            DeliveryMode::Log => None,
        };

        Ok(Config {
            delivery_mode,
            telegram,
            watchlist_config_path: optional("WATCHLIST_CONFIG_PATH")
                .unwrap_or_else(|| "config/watchlist.toml".to_string()),
            mexc_base_url: optional("MEXC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MEXC_BASE_URL.to_string()),
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", optional("HTTP_TIMEOUT_SECS"), 10)?,
            health_port: parse_or("HEALTH_PORT", optional("HEALTH_PORT"), 8080)?,
        })
    }
}

fn parse_chat_ids(raw: &str) -> Result<Vec<i64>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                Error::Config(format!("TELEGRAM_CHAT_IDS contains non-numeric ID: '{s}'"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if ids.is_empty() {
        return Err(Error::Config("TELEGRAM_CHAT_IDS is empty".into()));
    }
    Ok(ids)
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: '{v}'"))),
    }
}
