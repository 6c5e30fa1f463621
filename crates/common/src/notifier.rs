use async_trait::async_trait;

use crate::Result;

/// Delivers alert text to a human.
///
/// Implementations own their delivery targets (chat IDs, log sink).
/// A failed delivery is reported once and never retried by the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}
