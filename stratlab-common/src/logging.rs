//! Logging utilities.
//!
//! Structured logging via `tracing`, rendered either as JSON lines or as
//! human-readable output. `RUST_LOG` always wins over the configured level.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Modules kept at `warn` regardless of the base level.
pub const NOISY_MODULES: &[&str] = &["rayon", "rayon_core"];

/// Build the default EnvFilter with noise suppression.
fn build_filter(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::new(filter_directives(log_level))
}

fn filter_directives(log_level: &str) -> String {
    let mut directives = String::from(log_level);
    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }
    directives
}

/// Initialize logging with the given configuration.
///
/// # Arguments
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - Output format: "json" for structured JSON, "pretty" for human-readable
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(log_level: &str, log_format: &str) {
    let filter = build_filter(log_level);

    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::debug!(
        log_level = %log_level,
        log_format = %log_format,
        "Logging initialized"
    );
}

/// Generate a new id for one simulation run.
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Create a tracing span for a single backtest run.
///
/// # Example
///
/// ```ignore
/// let span = run_span!(run_id, ts_code = %code, strategy = "macd");
/// let _enter = span.enter();
/// ```
#[macro_export]
macro_rules! run_span {
    ($run_id:expr) => {
        tracing::info_span!("backtest", run_id = %$run_id)
    };
    ($run_id:expr, $($field:tt)*) => {
        tracing::info_span!("backtest", run_id = %$run_id, $($field)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("debug"));
        assert!(directives.contains("rayon=warn"));
        assert!(directives.contains("rayon_core=warn"));
    }

    #[test]
    fn test_generate_run_id() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36);
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging("info", "pretty");
        init_logging("debug", "json");
    }
}
