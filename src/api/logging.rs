use serde_json::Value;
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::sync::{Mutex, Once};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_PATH: &str = "/tmp/tappi-debug.log";
const DEBUG_PAYLOAD_ENV: &str = "TAPPI_DEBUG_PAYLOAD";
const LOG_PATH_ENV: &str = "TAPPI_LOG_PATH";
const DEFAULT_FILTER: &str = "tappi=info";

static SUBSCRIBER_INSTALLED: Once = Once::new();

/// Installs the process-wide `tracing` subscriber.
///
/// While the TUI owns the terminal, log lines must not reach stderr, so the
/// subscriber writes to `TAPPI_LOG_PATH` (or a file under `/tmp` when stderr
/// is a terminal) and only falls back to stderr when no file can be opened.
pub fn init() {
    SUBSCRIBER_INSTALLED.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false);

        let file = resolve_log_path().and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
        let result = match file {
            Some(file) => builder.with_writer(Mutex::new(file)).try_init(),
            None => builder.with_writer(std::io::stderr).try_init(),
        };
        if let Err(error) = result {
            eprintln!("tappi: logging disabled: {error}");
        }
    });
}

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    tracing::debug!(
        target: "tappi::api",
        url = request_url,
        "payload_request\n{formatted_payload}"
    );
}

pub fn emit_sse_parse_error(
    event_type: Option<&str>,
    json_data: &str,
    parse_error: &serde_json::Error,
) {
    tracing::warn!(
        target: "tappi::api",
        error = %parse_error,
        event_type = event_type.unwrap_or("<none>"),
        "sse_parse_failed\ndata:\n{json_data}"
    );
}

fn resolve_log_path() -> Option<String> {
    std::env::var(LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_payload_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(DEBUG_PAYLOAD_ENV, "1");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "TRUE");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "no");
        assert!(!debug_payload_enabled());
        std::env::remove_var(DEBUG_PAYLOAD_ENV);
    }

    #[test]
    fn test_resolve_log_path_uses_env_override() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(LOG_PATH_ENV, "/tmp/test-tappi.log");
        assert_eq!(resolve_log_path().as_deref(), Some("/tmp/test-tappi.log"));
        std::env::remove_var(LOG_PATH_ENV);
    }
}
