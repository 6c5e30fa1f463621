pub mod config;
pub mod error;
pub mod notifier;
pub mod provider;
pub mod types;

pub use config::{Config, DeliveryMode, TelegramCredentials};
pub use error::{Error, Result};
pub use notifier::Notifier;
pub use provider::{KlineProvider, RawKline};
pub use types::*;
