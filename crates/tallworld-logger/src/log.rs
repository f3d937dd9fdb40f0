use crate::severity::LogSeverity;
use crate::systime::now;
use once_cell::sync::OnceCell;

/// Environment variable holding the minimum severity that gets printed.
pub const LOG_LEVEL_VAR: &str = "TALLWORLD_LOG";

static MIN_SEVERITY: OnceCell<LogSeverity> = OnceCell::new();

/// Reads the minimum severity from `TALLWORLD_LOG`. Later calls are no-ops.
pub fn init_from_env() {
    let _ = MIN_SEVERITY.get_or_init(|| {
        std::env::var(LOG_LEVEL_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(LogSeverity::Info)
    });
}

pub fn min_severity() -> LogSeverity {
    MIN_SEVERITY.get().copied().unwrap_or(LogSeverity::Info)
}

pub fn log(msg: String, log_severity: LogSeverity) {
    if log_severity < min_severity() {
        return;
    }
    println!("[{}] {} {}", log_severity, now(), msg);
}
