mod alert;
mod collectors;
mod config;
mod notify;
mod probe;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use collectors::host::resolve_hostname;
use config::{Config, ConfigError, Credential, Overrides, TransportKind};
use probe::Probe;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tempguard")]
#[command(version, about = "Проверка температуры датчиков с уведомлением в чат")]
struct Cli {
    /// Канал для уведомлений
    #[arg(long = "channelID")]
    channel_id: Option<String>,
    /// Порог температуры, должен быть > 0
    #[arg(long, allow_hyphen_values = true)]
    limit: Option<f64>,
    /// Пауза между проверками в секундах; 0 — одна проверка и выход
    #[arg(long = "sleepTime")]
    sleep_time: Option<u64>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    transport: Option<TransportKind>,
    /// Отправлять в канал ошибки чтения и разбора sensors
    #[arg(long)]
    report_errors: bool,
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => usage_error(err),
    };

    let credential = match Credential::from_env(cfg.transport.token_env_name()) {
        Ok(credential) => credential,
        Err(err) => {
            error!(error = %err, "не удалось получить токен транспорта");
            std::process::exit(1);
        }
    };

    let transport = match notify::build_transport(&cfg.transport, credential) {
        Ok(transport) => transport,
        Err(err) => {
            error!(error = %err, "не удалось подключиться к транспорту");
            std::process::exit(1);
        }
    };

    let hostname = resolve_hostname();
    info!(
        host = %hostname,
        transport = transport.name(),
        channel = %cfg.channel_id,
        limit = cfg.limit,
        "запуск tempguard"
    );

    let probe = Probe::new(&cfg, transport.as_ref(), hostname);
    if cfg.sleep_time_secs == 0 {
        if probe.check().await.is_err() {
            std::process::exit(1);
        }
        return;
    }

    let interval = Duration::from_secs(cfg.sleep_time_secs);
    info!(
        interval = %humantime::format_duration(interval),
        "периодическая проверка"
    );
    probe.run_forever(interval).await;
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    cfg.apply_overrides(Overrides {
        channel_id: cli.channel_id.clone(),
        limit: cli.limit,
        sleep_time_secs: cli.sleep_time,
        transport: cli.transport,
        report_errors: cli.report_errors,
    });
    cfg.validate()?;
    Ok(cfg)
}

fn usage_error(err: ConfigError) -> ! {
    let kind = match &err {
        ConfigError::Missing(_) => ErrorKind::MissingRequiredArgument,
        ConfigError::Validation(_) => ErrorKind::ValueValidation,
        _ => ErrorKind::Io,
    };
    Cli::command().error(kind, err).exit()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
