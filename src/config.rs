use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub limit: f64,
    #[serde(default)]
    pub sleep_time_secs: u64,
    #[serde(default)]
    pub report_errors: bool,
    #[serde(default = "default_activity_max_messages")]
    pub activity_max_messages: usize,
    #[serde(default = "default_sensors_command")]
    pub sensors_command: CommandConfig,
    #[serde(default = "default_activity_command")]
    pub activity_command: CommandConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Discord,
    Telegram,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    #[serde(default = "default_transport_kind")]
    pub kind: TransportKind,
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_discord_api_base")]
    pub discord_api_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_id: String::new(),
            limit: 0.0,
            sleep_time_secs: 0,
            report_errors: false,
            activity_max_messages: default_activity_max_messages(),
            sensors_command: default_sensors_command(),
            activity_command: default_activity_command(),
            transport: TransportConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
            token_env: None,
            discord_api_base: default_discord_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TransportConfig {
    /// Имя переменной окружения с токеном: явно заданное или стандартное для транспорта.
    pub fn token_env_name(&self) -> &str {
        if let Some(name) = self.token_env.as_deref().filter(|v| !v.trim().is_empty()) {
            return name;
        }
        match self.kind {
            TransportKind::Discord => "DISCORD_TOKEN",
            TransportKind::Telegram => "TELEGRAM_BOT_TOKEN",
        }
    }
}

impl fmt::Display for CommandConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Значения из командной строки, перекрывающие файл конфигурации.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub channel_id: Option<String>,
    pub limit: Option<f64>,
    pub sleep_time_secs: Option<u64>,
    pub transport: Option<TransportKind>,
    pub report_errors: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("не задан обязательный параметр {0}")]
    Missing(&'static str),
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
    #[error("не найден токен: задайте переменную окружения '{0}'")]
    Credential(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(channel_id) = overrides.channel_id {
            self.channel_id = channel_id;
        }
        if let Some(limit) = overrides.limit {
            self.limit = limit;
        }
        if let Some(sleep) = overrides.sleep_time_secs {
            self.sleep_time_secs = sleep;
        }
        if let Some(kind) = overrides.transport {
            self.transport.kind = kind;
        }
        if overrides.report_errors {
            self.report_errors = true;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let channel = self.channel_id.trim();
        if channel.is_empty() {
            return Err(ConfigError::Missing("channelID"));
        }
        if self.limit == 0.0 {
            return Err(ConfigError::Missing("limit"));
        }
        if !self.limit.is_finite() || self.limit < 0.0 {
            return Err(ConfigError::Validation(
                "limit должен быть конечным числом > 0".to_string(),
            ));
        }

        match self.transport.kind {
            TransportKind::Discord => {
                if !channel.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ConfigError::Validation(format!(
                        "channelID '{channel}' должен быть числовым идентификатором канала Discord"
                    )));
                }
            }
            TransportKind::Telegram => {
                if channel.parse::<i64>().is_err() && !is_channel_username(channel) {
                    return Err(ConfigError::Validation(format!(
                        "channelID '{channel}' должен быть chat id или @username канала Telegram"
                    )));
                }
            }
        }

        if !(1..=MAX_ACTIVITY_MESSAGES).contains(&self.activity_max_messages) {
            return Err(ConfigError::Validation(format!(
                "activity_max_messages должно быть в диапазоне 1..{MAX_ACTIVITY_MESSAGES}"
            )));
        }
        validate_command("sensors_command", &self.sensors_command)?;
        validate_command("activity_command", &self.activity_command)?;

        if !self.transport.discord_api_base.starts_with("http://")
            && !self.transport.discord_api_base.starts_with("https://")
        {
            return Err(ConfigError::Validation(
                "transport.discord_api_base должен начинаться с http:// или https://".to_string(),
            ));
        }
        if self.transport.request_timeout_secs < 1 {
            return Err(ConfigError::Validation(
                "transport.request_timeout_secs должно быть >= 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn is_channel_username(channel: &str) -> bool {
    channel.strip_prefix('@').is_some_and(|name| {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

fn validate_command(field: &str, cmd: &CommandConfig) -> Result<(), ConfigError> {
    if cmd.program.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{field}.program не должен быть пустым"
        )));
    }
    Ok(())
}

/// Токен транспорта. Читается из окружения один раз при запуске.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn from_env(env_name: &str) -> Result<Self, ConfigError> {
        match std::env::var(env_name) {
            Ok(v) if !v.trim().is_empty() => Ok(Self::new(v.trim())),
            _ => Err(ConfigError::Credential(env_name.to_string())),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

const MAX_ACTIVITY_MESSAGES: usize = 100;

const fn default_activity_max_messages() -> usize {
    4
}

fn default_sensors_command() -> CommandConfig {
    CommandConfig {
        program: "sensors".to_string(),
        args: vec!["-j".to_string()],
    }
}

fn default_activity_command() -> CommandConfig {
    // -b пакетный режим, -n 1 одна итерация, -H потоки, сортировка по CPU.
    CommandConfig {
        program: "top".to_string(),
        args: ["-b", "-n", "1", "-H", "--sort-override", "%CPU"]
            .into_iter()
            .map(String::from)
            .collect(),
    }
}

const fn default_transport_kind() -> TransportKind {
    TransportKind::Discord
}

fn default_discord_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            channel_id: "123456789".to_string(),
            limit: 80.0,
            ..Config::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        valid_config().validate().expect("конфигурация должна быть валидной");
    }

    #[test]
    fn missing_channel_and_limit_are_reported_as_missing() {
        let mut cfg = valid_config();
        cfg.channel_id = "  ".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::Missing("channelID"))));

        let mut cfg = valid_config();
        cfg.limit = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Missing("limit"))));
    }

    #[test]
    fn negative_or_nan_limit_is_rejected() {
        for limit in [-1.0, f64::NAN, f64::INFINITY] {
            let mut cfg = valid_config();
            cfg.limit = limit;
            assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
        }
    }

    #[test]
    fn channel_format_depends_on_transport() {
        let mut cfg = valid_config();
        cfg.channel_id = "@alerts".to_string();
        assert!(cfg.validate().is_err());

        cfg.transport.kind = TransportKind::Telegram;
        cfg.validate().expect("@username допустим для Telegram");

        cfg.channel_id = "-1001234567890".to_string();
        cfg.validate().expect("отрицательный chat id допустим для Telegram");

        cfg.channel_id = "@".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn activity_message_budget_is_bounded() {
        let yaml = "channel_id: \"1\"\nlimit: 80.0\nactivity_max_messages: 18446744073709551615\n";
        let cfg: Config = serde_yaml::from_str(yaml).expect("yaml");
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        let mut cfg = valid_config();
        cfg.activity_max_messages = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        cfg.activity_max_messages = 100;
        cfg.validate().expect("верхняя граница допустима");
    }

    #[test]
    fn empty_program_is_rejected() {
        let mut cfg = valid_config();
        cfg.activity_command.program = String::new();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn overrides_take_precedence_over_file() {
        let yaml = r#"
channel_id: "111"
limit: 70.0
sleep_time_secs: 60
transport:
  kind: discord
"#;
        let mut cfg: Config = serde_yaml::from_str(yaml).expect("yaml");
        assert_eq!(cfg.sensors_command, default_sensors_command());
        assert_eq!(cfg.activity_max_messages, 4);

        cfg.apply_overrides(Overrides {
            channel_id: None,
            limit: Some(90.5),
            sleep_time_secs: Some(0),
            transport: None,
            report_errors: true,
        });
        assert_eq!(cfg.channel_id, "111");
        assert_eq!(cfg.limit, 90.5);
        assert_eq!(cfg.sleep_time_secs, 0);
        assert!(cfg.report_errors);
        cfg.validate().expect("валидация");
    }

    #[test]
    fn example_yaml_parses_and_validates() {
        let cfg: Config = serde_yaml::from_str(Config::example_yaml()).expect("пример должен разбираться");
        cfg.validate().expect("пример должен быть валидным");
        assert_eq!(cfg.activity_command.to_string(), "top -b -n 1 -H --sort-override %CPU");
    }

    #[test]
    fn token_env_defaults_per_transport() {
        let mut transport = TransportConfig::default();
        assert_eq!(transport.token_env_name(), "DISCORD_TOKEN");
        transport.kind = TransportKind::Telegram;
        assert_eq!(transport.token_env_name(), "TELEGRAM_BOT_TOKEN");
        transport.token_env = Some("MY_TOKEN".to_string());
        assert_eq!(transport.token_env_name(), "MY_TOKEN");
    }

    #[test]
    fn credential_from_env_rejects_missing_and_hides_value() {
        std::env::remove_var("TEMPGUARD_MISSING_TOKEN_12345");
        assert!(matches!(
            Credential::from_env("TEMPGUARD_MISSING_TOKEN_12345"),
            Err(ConfigError::Credential(_))
        ));

        let cred = Credential::new("secret-value");
        assert_eq!(cred.expose(), "secret-value");
        assert!(!format!("{cred:?}").contains("secret"));
    }
}
