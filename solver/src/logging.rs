//! Development-time tracing for the solver.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Diagnostics via `RUST_LOG`, output to stderr.
//!   Not persisted, not part of session output.
//!
//! - **Workspace artifacts (`io/workspace`)**: Candidate sources, captured
//!   outputs and `generator.<role>.log` files. Always written, unaffected by
//!   `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Level used when `RUST_LOG` is unset, by number of `-v` flags.
pub fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn`, raised by `verbosity`.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=solver=debug solver solve
/// ```
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
