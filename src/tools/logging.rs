//! 日志初始化 / Tracing setup
//!
//! Diagnostics go through `tracing`; the report itself is printed to stdout.
//! `RUNSET_LOG` overrides the filter, otherwise `info` (`debug` when
//! verbose).

use super::constants::env;
use tracing_subscriber::EnvFilter;

fn default_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Install the global subscriber; a second call is a no-op
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env(env::LOG_FILTER)
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
