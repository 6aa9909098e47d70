//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset or unparseable. sqlx logs every
/// statement at `info`, so it is held to `warn` unless asked for.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Resolve the directive string to use, preferring `raw` when it parses.
pub fn filter_directives(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) if EnvFilter::try_new(raw).is_ok() => raw.to_string(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Initialize tracing/logging for the process.
///
/// JSON lines with timestamps and span context, filtered by `RUST_LOG`.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let raw = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::new(filter_directives(raw.as_deref()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_target(true)
        .try_init();
}
