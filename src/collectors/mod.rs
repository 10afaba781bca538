pub mod activity;
pub mod host;
pub mod sensors;

use crate::config::CommandConfig;
use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExternalToolError {
    #[error("не удалось запустить '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("'{program}' завершился с кодом {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Запускает внешнюю команду и возвращает её stdout. Ожидание без таймаута.
pub async fn run_command(cmd: &CommandConfig) -> Result<String, ExternalToolError> {
    debug!(command = %cmd, "запуск внешней команды");
    let output = Command::new(&cmd.program)
        .args(&cmd.args)
        .output()
        .await
        .map_err(|source| ExternalToolError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ExternalToolError::Exit {
            program: cmd.program.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(decode_cmd_stdout(&output.stdout))
}

fn decode_cmd_stdout(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
