use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{debug, warn};

use common::{Error, Notifier, Result, TelegramCredentials};

/// Sends alerts through the Telegram Bot API to a fixed set of chats.
///
/// Every chat is attempted even if an earlier one fails. The caller sees a
/// single error naming how many deliveries failed.
pub struct TelegramNotifier {
    bot: Bot,
    chat_ids: Vec<ChatId>,
}

impl TelegramNotifier {
    pub fn new(creds: &TelegramCredentials) -> Self {
        Self {
            bot: Bot::new(&creds.token),
            chat_ids: creds.chat_ids.iter().map(|&id| ChatId(id)).collect(),
        }
    }

    /// Deliver to one chat.
    pub async fn send_to(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.bot
            .send_message(chat_id, text)
            .await
            .map(|_| ())
            .map_err(|e| Error::Notify(e.to_string()))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let mut failures = 0;
        for &chat_id in &self.chat_ids {
            match self.send_to(chat_id, text).await {
                Ok(()) => debug!(chat_id = ?chat_id, "Telegram alert delivered"),
                Err(e) => {
                    warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram alert");
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            return Err(Error::Notify(format!(
                "{failures} of {} Telegram deliveries failed",
                self.chat_ids.len()
            )));
        }
        Ok(())
    }
}
