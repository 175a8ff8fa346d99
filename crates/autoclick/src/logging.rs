//! Diagnostics go to stderr through tracing; user-facing log lines go to
//! stdout with a wall-clock prefix.

use autoclick_core::EngineKind;
use chrono::{DateTime, Local};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` overrides the default `info` filter
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

pub fn format_line(at: DateTime<Local>, source: EngineKind, message: &str) -> String {
    format!("[{}] [{}] {}", at.format("%H:%M:%S"), source, message)
}

pub fn print_line(source: EngineKind, message: &str) {
    println!("{}", format_line(Local::now(), source, message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prefixes_time_and_source() {
        let at = Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
        let line = format_line(at, EngineKind::ClickLoop, "loop 1 started");
        assert_eq!(line, "[09:05:07] [clicker] loop 1 started");
    }
}
