//! Structured logging bootstrap, shared by the server binary and the CLI.
//!
//! Format is controlled by `AGENTPOOL_LOG_FORMAT` (`pretty` default, or
//! `json` for production log aggregation); verbosity by `RUST_LOG`
//! (defaults to `info`).

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global `tracing` subscriber. Safe to call once per process;
/// subsequent calls are no-ops (the underlying `set_global_default` error is
/// swallowed since tests may initialize it more than once).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("AGENTPOOL_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).compact().try_init()
    };

    if let Err(err) = result {
        eprintln!("tracing subscriber already initialized: {err}");
    }
}
