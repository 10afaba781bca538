pub mod discord;
pub mod telegram;

use crate::config::{Credential, TransportConfig, TransportKind};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("транспорт отклонил токен: {0}")]
    Unauthorized(String),
    #[error("ошибка HTTP-запроса: {0}")]
    Http(#[from] reqwest::Error),
    #[error("сервер вернул HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("ошибка запроса Telegram: {0}")]
    Telegram(#[from] teloxide::RequestError),
    #[error("некорректный идентификатор канала '{0}'")]
    InvalidChannel(String),
}

/// Канал доставки, принимающий сообщения ограниченной длины.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Максимальная длина одного сообщения в символах, включая обёртку.
    fn max_message_len(&self) -> usize;

    /// Сколько символов добавляет оформление блока кода.
    fn wrapper_overhead(&self) -> usize;

    /// Вклад символа в длину сообщения по правилам транспорта.
    fn char_width(&self, _c: char) -> usize {
        1
    }

    async fn send_code_block(&self, channel: &str, chunk: &str) -> Result<(), DeliveryError>;
}

pub fn build_transport(
    cfg: &TransportConfig,
    credential: Credential,
) -> Result<Box<dyn ChatTransport>, DeliveryError> {
    match cfg.kind {
        TransportKind::Discord => Ok(Box::new(discord::DiscordTransport::new(
            &cfg.discord_api_base,
            credential,
            Duration::from_secs(cfg.request_timeout_secs),
        )?)),
        TransportKind::Telegram => Ok(Box::new(telegram::TelegramTransport::new(&credential))),
    }
}

pub fn chunk_size(transport: &dyn ChatTransport) -> usize {
    transport
        .max_message_len()
        .saturating_sub(transport.wrapper_overhead())
        .max(1)
}

/// Делит текст на последовательные куски не длиннее `chunk_chars` символов.
pub fn split_chunks(content: &str, chunk_chars: usize) -> Vec<&str> {
    split_chunks_by(content, chunk_chars, |_| 1)
}

/// Делит текст на куски, суммарная ширина символов в которых не превышает `limit`.
pub fn split_chunks_by(content: &str, limit: usize, width: impl Fn(char) -> usize) -> Vec<&str> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut used = 0;

    for (idx, c) in content.char_indices() {
        let w = width(c);
        if used > 0 && used + w > limit {
            chunks.push(&content[start..idx]);
            start = idx;
            used = 0;
        }
        used += w;
    }
    if start < content.len() {
        chunks.push(&content[start..]);
    }
    chunks
}

/// Отправляет текст по частям. На первой ошибке отправка прекращается,
/// уже доставленные части не отзываются. Возвращает число отправленных частей.
pub async fn send_message(
    transport: &dyn ChatTransport,
    channel: &str,
    content: &str,
) -> Result<usize, DeliveryError> {
    let chunks = split_chunks_by(content, chunk_size(transport), |c| transport.char_width(c));
    let total = chunks.len();

    for (idx, chunk) in chunks.into_iter().enumerate() {
        if let Err(err) = transport.send_code_block(channel, chunk).await {
            warn!(
                transport = transport.name(),
                chunk = idx + 1,
                total,
                error = %err,
                "не удалось отправить часть сообщения"
            );
            return Err(err);
        }
        debug!(transport = transport.name(), chunk = idx + 1, total, "часть сообщения отправлена");
    }
    Ok(total)
}
