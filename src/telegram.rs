//! Telegram client using teloxide.

use teloxide::prelude::*;
use teloxide::types::KeyboardMarkup;
use tracing::warn;

/// Thin wrapper over the teloxide bot: delivery, retries, and connection
/// lifecycle stay on teloxide's side of the line.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send a text message, optionally with a reply keyboard describing the
    /// next valid inputs.
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<KeyboardMarkup>,
    ) -> Result<i64, String> {
        let mut request = self.bot.send_message(chat_id, text);

        if let Some(kb) = keyboard {
            request = request.reply_markup(kb);
        }

        request.await.map(|msg| msg.id.0 as i64).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }
}
