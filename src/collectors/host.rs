use sysinfo::{System, SystemExt};
use tracing::warn;

pub const UNKNOWN_HOSTNAME: &str = "<НЕ УДАЛОСЬ ПОЛУЧИТЬ ИМЯ ХОСТА>";

pub fn resolve_hostname() -> String {
    let system = System::new();
    hostname_or_placeholder(system.host_name())
}

fn hostname_or_placeholder(name: Option<String>) -> String {
    match name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
        Some(name) => name,
        None => {
            warn!("имя хоста недоступно, используется заглушка");
            UNKNOWN_HOSTNAME.to_string()
        }
    }
}
