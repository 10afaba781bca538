pub fn format_alert(hostname: &str, sensors_output: &str, activity_output: &str) -> String {
    format!(
        "\nПредупреждение для машины {hostname}: высокая температура.\n\n\
         Вывод sensors:\n\n{sensors_output}\n\n\
         Вывод top:\n\n{activity_output}\n\n"
    )
}

pub fn format_error_report(hostname: &str, error: &dyn std::fmt::Display) -> String {
    format!("Предупреждение для машины {hostname}: ОШИБКА во время проверки: {error}")
}
