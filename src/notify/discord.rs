use super::{ChatTransport, DeliveryError};
use crate::config::Credential;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

/// Ограничение Discord на длину одного сообщения.
pub const DISCORD_MAX_MESSAGE_LEN: usize = 2000;
const CODE_FENCE: &str = "```";
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Отправка через REST API Discord. Между частями сообщения соблюдается
/// лимит корзины из заголовков `X-RateLimit-*`; ответ 429 повторяется один раз.
pub struct DiscordTransport {
    client: Client,
    api_base: String,
    credential: Credential,
    resume_at: Mutex<Option<Instant>>,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct RateLimited {
    retry_after: f64,
}

impl DiscordTransport {
    pub fn new(
        api_base: &str,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .user_agent(concat!("tempguard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            credential,
            resume_at: Mutex::new(None),
        })
    }

    async fn execute(&self, channel: &str, chunk: &str) -> Result<Response, DeliveryError> {
        let request = self.build_request(channel, chunk)?;
        Ok(self.client.execute(request).await?)
    }

    async fn wait_for_bucket(&self) {
        let resume_at = self.resume_at.lock().await.take();
        if let Some(at) = resume_at {
            if at > Instant::now() {
                debug!(wait = ?(at - Instant::now()), "ожидание сброса лимита Discord");
                sleep_until(at).await;
            }
        }
    }

    async fn remember_bucket(&self, headers: &HeaderMap) {
        let mut resume_at = self.resume_at.lock().await;
        *resume_at = bucket_delay(headers).map(|delay| Instant::now() + delay);
    }

    fn build_request(&self, channel: &str, chunk: &str) -> Result<Request, DeliveryError> {
        if channel.is_empty() || !channel.chars().all(|c| c.is_ascii_digit()) {
            return Err(DeliveryError::InvalidChannel(channel.to_string()));
        }
        let content = format!("{CODE_FENCE}{chunk}{CODE_FENCE}");
        let request = self
            .client
            .post(format!("{}/channels/{channel}/messages", self.api_base))
            .header(AUTHORIZATION, format!("Bot {}", self.credential.expose()))
            .json(&CreateMessage { content: &content })
            .build()?;
        Ok(request)
    }
}

#[async_trait]
impl ChatTransport for DiscordTransport {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn max_message_len(&self) -> usize {
        DISCORD_MAX_MESSAGE_LEN
    }

    fn wrapper_overhead(&self) -> usize {
        CODE_FENCE.len() * 2
    }

    async fn send_code_block(&self, channel: &str, chunk: &str) -> Result<(), DeliveryError> {
        self.wait_for_bucket().await;
        let mut response = self.execute(channel, chunk).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            let wait = retry_after(&headers, &body);
            warn!(wait = ?wait, "Discord ограничил частоту отправки, повтор после паузы");
            sleep(wait).await;
            response = self.execute(channel, chunk).await?;
        }

        self.remember_bucket(response.headers()).await;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(DeliveryError::Unauthorized(format!("HTTP {}: {body}", status.as_u16())))
            }
            _ => Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

/// Пауза до следующего запроса, если в корзине не осталось запросов.
fn bucket_delay(headers: &HeaderMap) -> Option<Duration> {
    let remaining = header_f64(headers, "x-ratelimit-remaining")?;
    if remaining > 0.0 {
        return None;
    }
    header_f64(headers, "x-ratelimit-reset-after").map(secs_to_duration)
}

/// Пауза перед повтором после 429: `retry_after` из тела, иначе `Retry-After`.
fn retry_after(headers: &HeaderMap, body: &str) -> Duration {
    serde_json::from_str::<RateLimited>(body)
        .ok()
        .map(|r| r.retry_after)
        .or_else(|| header_f64(headers, RETRY_AFTER.as_str()))
        .map(secs_to_duration)
        .unwrap_or(Duration::from_secs(1))
}

fn header_f64(headers: &HeaderMap, name: &str) -> Option<f64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn secs_to_duration(secs: f64) -> Duration {
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(secs.min(MAX_RATE_LIMIT_WAIT.as_secs_f64()))
}
