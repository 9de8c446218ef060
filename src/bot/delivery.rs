//! Delivery of staged media to the chat
//!
//! Every file is sent on its own and a failure is reported inline before
//! moving on to the next one.

use crate::bot::gateway::ChatGateway;
use crate::bot::views;
use crate::config::TELEGRAM_MESSAGE_LIMIT;
use crate::staging::MediaBundle;
use crate::utils::split_long_message;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Room left for the caption header and blockquote tags
const CAPTION_CHUNK: usize = TELEGRAM_MESSAGE_LIMIT - 200;

/// What happened to a delivery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Files sent successfully
    pub sent: usize,
    /// Names of files that failed to send
    pub failed: Vec<String>,
}

impl DeliveryReport {
    /// True when nothing failed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

async fn notify(gateway: &dyn ChatGateway, text: &str) {
    if let Err(e) = gateway.send_text(text).await {
        warn!(error = %e, "Failed to send notice");
    }
}

/// Split a raw caption into HTML-escaped chunks of at most `CAPTION_CHUNK` bytes.
///
/// Splitting happens before escaping so no entity is ever cut in half.
fn caption_chunks(caption: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    for part in split_long_message(caption.trim(), CAPTION_CHUNK) {
        push_escaped(&part, &mut chunks);
    }
    chunks
}

fn push_escaped(raw: &str, chunks: &mut Vec<String>) {
    if raw.is_empty() {
        return;
    }
    let escaped = html_escape::encode_text(raw);
    if escaped.len() <= CAPTION_CHUNK || raw.len() < 2 {
        chunks.push(escaped.into_owned());
        return;
    }
    // Escaping grew the chunk past the limit
    for part in split_long_message(raw, raw.len() / 2) {
        push_escaped(&part, chunks);
    }
}

async fn send_caption(gateway: &dyn ChatGateway, caption: &str) {
    for (i, chunk) in caption_chunks(caption).iter().enumerate() {
        if let Err(e) = gateway.send_html(&views::caption_block(chunk, i == 0)).await {
            warn!(error = %e, "Failed to send caption");
            return;
        }
    }
}

async fn send_files(
    gateway: &dyn ChatGateway,
    files: &[PathBuf],
    caption_for: impl Fn(&Path) -> Option<String>,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for path in files {
        let name = file_name(path);
        match gateway.send_document(path, caption_for(path)).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                warn!(file = %name, error = %e, "File delivery failed");
                notify(gateway, &views::file_send_failed(&name, &e.to_string())).await;
                report.failed.push(name);
            }
        }
    }
    report
}

/// Send an optional caption, then every file of the bundle in order.
///
/// An empty bundle produces a single "no media" notice.
#[must_use]
pub async fn deliver(
    gateway: &dyn ChatGateway,
    bundle: &MediaBundle,
    caption: Option<&str>,
) -> DeliveryReport {
    if let Some(caption) = caption.filter(|c| !c.trim().is_empty()) {
        send_caption(gateway, caption).await;
    }

    if bundle.is_empty() {
        notify(gateway, views::NO_MEDIA).await;
        return DeliveryReport::default();
    }

    send_files(gateway, bundle.files(), |_| None).await
}

/// Send highlight archives, each captioned with its folder name.
#[must_use]
pub async fn deliver_archives(gateway: &dyn ChatGateway, archives: &[PathBuf]) -> DeliveryReport {
    if archives.is_empty() {
        notify(gateway, views::NO_MEDIA).await;
        return DeliveryReport::default();
    }

    send_files(gateway, archives, |path| {
        path.file_stem().map(|s| s.to_string_lossy().into_owned())
    })
    .await
}
