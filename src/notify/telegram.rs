use super::{ChatTransport, DeliveryError};
use crate::config::Credential;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageEntity, MessageEntityKind, Recipient};
use teloxide::Bot;
use teloxide::{ApiError, RequestError};

/// Ограничение Bot API на длину текста сообщения.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Отправка в Telegram. Блок кода задаётся сущностью `pre`,
/// поэтому обёртка не занимает места в тексте.
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(credential: &Credential) -> Self {
        Self {
            bot: Bot::new(credential.expose()),
        }
    }
}

pub fn parse_recipient(channel: &str) -> Result<Recipient, DeliveryError> {
    if let Ok(id) = channel.parse::<i64>() {
        return Ok(Recipient::Id(ChatId(id)));
    }
    if channel.len() > 1 && channel.starts_with('@') {
        return Ok(Recipient::ChannelUsername(channel.to_string()));
    }
    Err(DeliveryError::InvalidChannel(channel.to_string()))
}

fn pre_entity(chunk: &str) -> MessageEntity {
    // Смещения в Bot API считаются в единицах UTF-16.
    MessageEntity::new(
        MessageEntityKind::Pre { language: None },
        0,
        chunk.encode_utf16().count(),
    )
}

fn map_request_error(err: RequestError) -> DeliveryError {
    match err {
        // В teloxide 0.12 ответ Bot API "Unauthorized" приходит как NotFound.
        RequestError::Api(ApiError::NotFound) => {
            DeliveryError::Unauthorized("Telegram отклонил токен бота".to_string())
        }
        other => DeliveryError::Telegram(other),
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn max_message_len(&self) -> usize {
        TELEGRAM_MAX_MESSAGE_LEN
    }

    fn wrapper_overhead(&self) -> usize {
        0
    }

    // Bot API считает длину текста в единицах UTF-16.
    fn char_width(&self, c: char) -> usize {
        c.len_utf16()
    }

    async fn send_code_block(&self, channel: &str, chunk: &str) -> Result<(), DeliveryError> {
        let recipient = parse_recipient(channel)?;
        self.bot
            .send_message(recipient, chunk)
            .entities(vec![pre_entity(chunk)])
            .await
            .map_err(map_request_error)?;
        Ok(())
    }
}
