//! Diagnostic output.
//!
//! The agent lives inside someone else's process, so it only ever writes
//! plain lines to stderr: no colors, no timestamps. The level can be raised
//! with `CLASS_DUMP_LOG` (EnvFilter syntax, e.g. `CLASS_DUMP_LOG=trace`).

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "CLASS_DUMP_LOG";

const DEFAULT_LEVEL: &str = "info";

/// Install the stderr subscriber. Safe to call more than once; only the first
/// call takes effect.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}
