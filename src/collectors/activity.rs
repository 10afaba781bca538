use super::run_command;
use crate::config::CommandConfig;
use tracing::warn;

/// Снимок активности системы (по умолчанию `top`), обрезанный до `max_chars` символов.
/// Ошибка запуска не прерывает проверку: вместо вывода подставляется описание ошибки.
pub async fn collect_activity(cmd: &CommandConfig, max_chars: usize) -> String {
    let output = match run_command(cmd).await {
        Ok(output) => output,
        Err(err) => {
            warn!(command = %cmd, error = %err, "не удалось получить снимок активности");
            format!("<НЕ УДАЛОСЬ ПОЛУЧИТЬ ВЫВОД {}: {err}>", cmd.program)
        }
    };
    truncate_chars(&output, max_chars).to_string()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorter_text_is_kept_whole() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 10), "");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[test]
    fn longer_text_is_cut_at_limit() {
        let long = "x".repeat(9000);
        assert_eq!(truncate_chars(&long, 8000).len(), 8000);
        assert_eq!(truncate_chars("abcdef", 0), "");
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundary() {
        let text = "Процесс °C ✓".repeat(50);
        let cut = truncate_chars(&text, 17);
        assert_eq!(cut.chars().count(), 17);
        assert!(text.starts_with(cut));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_is_bounded() {
        let cmd = CommandConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "yes 'top line' | head -n 2000".to_string()],
        };
        let out = collect_activity(&cmd, 100).await;
        assert_eq!(out.chars().count(), 100);
        assert!(out.starts_with("top line\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_becomes_placeholder() {
        let cmd = CommandConfig {
            program: "false".to_string(),
            args: vec![],
        };
        let out = collect_activity(&cmd, 8000).await;
        assert!(out.starts_with("<НЕ УДАЛОСЬ ПОЛУЧИТЬ ВЫВОД false:"), "{out}");
    }

    #[tokio::test]
    async fn placeholder_is_bounded_too() {
        let cmd = CommandConfig {
            program: "tempguard-no-such-binary-42".to_string(),
            args: vec![],
        };
        let out = collect_activity(&cmd, 5).await;
        assert_eq!(out, "<НЕ У");
    }
}
