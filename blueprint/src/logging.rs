//! Diagnostic tracing for `blueprint` runs.
//!
//! Stage spans, tool dispatch and retry waits are emitted as `tracing` events
//! on stderr. The per-stage progress lines `blueprint run` prints go to stdout
//! and are not filtered by `RUST_LOG`, so `--json` output stays clean.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG` and falls back to `warn`, which still
/// shows refused tool calls and rate-limit retries. To follow every model
/// round and tool call:
///
/// ```bash
/// RUST_LOG=blueprint=debug blueprint run "a todo app"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}
