// ==========================================
// VitalVida Sync Pipeline - logging setup
// ==========================================
// tracing + tracing-subscriber
// Level comes from RUST_LOG (default: info)
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Human-readable output for local runs
///
/// # Environment
/// - RUST_LOG: filter, e.g. `RUST_LOG=debug` or `RUST_LOG=vitalvida_sync::queue=trace`
///
/// # Example
/// ```no_run
/// use vitalvida_sync::logging;
/// logging::init();
/// ```
pub fn init() {
    fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// One JSON object per line, for log shipping
pub fn init_json() {
    fmt()
        .json()
        .with_env_filter(env_filter())
        .with_current_span(false)
        .init();
}

/// Debug level, captured by the test harness; safe to call repeatedly
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
