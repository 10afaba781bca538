use crate::alert::{format_alert, format_error_report};
use crate::collectors::activity::collect_activity;
use crate::collectors::sensors::{exceeds_limit, read_sensors, MalformedDataError, Reading};
use crate::collectors::ExternalToolError;
use crate::config::Config;
use crate::notify::{send_message, ChatTransport, DeliveryError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum PassError {
    #[error("не удалось получить вывод sensors: {0}")]
    ExternalTool(#[from] ExternalToolError),
    #[error(transparent)]
    MalformedData(#[from] MalformedDataError),
    #[error("не удалось доставить уведомление: {0}")]
    Delivery(#[from] DeliveryError),
}

#[derive(Debug, PartialEq)]
pub enum PassOutcome {
    BelowLimit,
    AlertSent { reading: Reading, chunks: usize },
}

/// Одна проверка: sensors → порог → top → сообщение → отправка.
pub struct Probe<'a> {
    cfg: &'a Config,
    transport: &'a dyn ChatTransport,
    hostname: String,
}

impl<'a> Probe<'a> {
    pub fn new(cfg: &'a Config, transport: &'a dyn ChatTransport, hostname: String) -> Self {
        Self {
            cfg,
            transport,
            hostname,
        }
    }

    pub async fn run_pass(&self) -> Result<PassOutcome, PassError> {
        let sensors_output = read_sensors(&self.cfg.sensors_command).await?;
        let Some(reading) = exceeds_limit(&sensors_output, self.cfg.limit)? else {
            debug!(limit = self.cfg.limit, "температура в норме");
            return Ok(PassOutcome::BelowLimit);
        };
        warn!(
            sensor = %reading.label,
            value = reading.value,
            limit = self.cfg.limit,
            "температура выше порога"
        );

        let max_activity = self
            .transport
            .max_message_len()
            .saturating_mul(self.cfg.activity_max_messages);
        let activity = collect_activity(&self.cfg.activity_command, max_activity).await;
        let message = format_alert(&self.hostname, &sensors_output, &activity);

        let chunks = match send_message(self.transport, &self.cfg.channel_id, &message).await {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!(content = %message, "уведомление не доставлено");
                return Err(err.into());
            }
        };

        Ok(PassOutcome::AlertSent { reading, chunks })
    }

    /// Проверка с журналированием ошибок и, если включено, отчётом в канал.
    pub async fn check(&self) -> Result<PassOutcome, PassError> {
        let result = self.run_pass().await;
        match &result {
            Ok(PassOutcome::AlertSent { reading, chunks }) => {
                info!(
                    sensor = %reading.label,
                    chunks,
                    channel = %self.cfg.channel_id,
                    "уведомление отправлено"
                );
            }
            Ok(PassOutcome::BelowLimit) => {}
            Err(err) => {
                error!(error = %err, "проверка завершилась ошибкой");
                if self.cfg.report_errors && !matches!(err, PassError::Delivery(_)) {
                    self.report_error(err).await;
                }
            }
        }
        result
    }

    async fn report_error(&self, err: &PassError) {
        let text = format_error_report(&self.hostname, err);
        if let Err(send_err) = send_message(self.transport, &self.cfg.channel_id, &text).await {
            warn!(error = %send_err, content = %text, "не удалось отправить отчёт об ошибке");
        }
    }

    pub async fn run_forever(&self, sleep: Duration) {
        loop {
            if let Err(err) = self.check().await {
                // Подробности уже в журнале, цикл продолжается.
                debug!(error = %err, "следующая проверка по расписанию");
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("получен Ctrl+C, остановка цикла проверок");
                    break;
                }
                _ = tokio::time::sleep(sleep) => {}
            }
        }
    }
}
