//! Observability infrastructure.
//!
//! Structured logging with consistent spans. Initialization is idempotent so
//! embedding hosts and tests can call it freely.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at process startup. Safe to call multiple times; subsequent
/// calls are no-ops. `RUST_LOG` controls log levels.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for one import state-machine operation.
///
/// # Example
///
/// ```rust
/// use silo_core::observability::import_span;
///
/// let span = import_span("init_to_launched", "branch_2021_01_01");
/// let _guard = span.enter();
/// // ... drive the transition
/// ```
#[must_use]
pub fn import_span(operation: &str, table_id: &str) -> Span {
    tracing::info_span!("import", op = operation, table_id = table_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty);
    }

    #[test]
    fn import_span_creates_span() {
        let span = import_span("init_to_launched", "branch_2021_01_01");
        let _guard = span.enter();
        tracing::info!("test message in span");
    }
}
