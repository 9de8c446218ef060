//! Outbound chat gateway
//!
//! Handlers and delivery only ever talk to a [`ChatGateway`] bound to one
//! chat, which keeps them independent from the Telegram transport.

use crate::config::TELEGRAM_MESSAGE_LIMIT;
use crate::utils::{retry_telegram_operation, split_long_message};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, LinkPreviewOptions, ParseMode};
use tracing::debug;

/// Sends messages and files to a single chat
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send plain text. Long text is split across several messages.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Send HTML-formatted text with link previews disabled.
    async fn send_html(&self, html: &str) -> Result<()>;

    /// Send a local file as a document.
    async fn send_document(&self, path: &Path, caption: Option<String>) -> Result<()>;
}

/// Telegram implementation of [`ChatGateway`].
pub struct TelegramGateway {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramGateway {
    /// Create a gateway bound to a chat.
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    async fn send_chunks(&self, text: &str, parse_mode: Option<ParseMode>) -> Result<()> {
        for chunk in split_long_message(text, TELEGRAM_MESSAGE_LIMIT) {
            retry_telegram_operation(|| async {
                let mut req = self
                    .bot
                    .send_message(self.chat_id, chunk.clone())
                    .link_preview_options(no_preview());
                if let Some(pm) = parse_mode {
                    req = req.parse_mode(pm);
                }
                req.await
                    .map(|_| ())
                    .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
            })
            .await?;
        }
        Ok(())
    }
}

const fn no_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.send_chunks(text, None).await
    }

    async fn send_html(&self, html: &str) -> Result<()> {
        self.send_chunks(html, Some(ParseMode::Html)).await
    }

    async fn send_document(&self, path: &Path, caption: Option<String>) -> Result<()> {
        debug!(chat_id = self.chat_id.0, file = %path.display(), "Sending document");
        retry_telegram_operation(|| async {
            let mut req = self
                .bot
                .send_document(self.chat_id, InputFile::file(path.to_path_buf()));
            if let Some(caption) = &caption {
                req = req.caption(caption.clone());
            }
            req.await
                .map(|_| ())
                .map_err(|e| anyhow::anyhow!("Telegram error: {e}"))
        })
        .await
    }
}
