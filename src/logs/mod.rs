use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt::time::UtcTime};

static INIT: Once = Once::new();

#[cfg(feature = "diagnostics")]
pub fn default_log_level() -> &'static str {
    "trace"
}

#[cfg(not(feature = "diagnostics"))]
pub fn default_log_level() -> &'static str {
    "warn"
}

/// Single initialization function for diagnostic logging.
///
/// `RUST_LOG` wins when set, then `level` (an `EnvFilter` directive), then the
/// build default. Events are stamped in RFC 3339 UTC, the same clock decoded
/// records are rendered in. Later calls are no-ops.
pub fn init_logging(level: Option<&str>) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directive = level.filter(|l| !l.trim().is_empty()).unwrap_or(default_log_level());
            EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(default_log_level()))
        });
        let installed = tracing_subscriber::fmt()
            .with_target(true)
            .with_thread_names(true)
            .with_timer(UtcTime::rfc_3339())
            .with_env_filter(env_filter)
            .try_init();
        if installed.is_ok() {
            tracing::trace!("Logging initialized");
        }
    });
}
