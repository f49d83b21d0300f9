//! Log output of the command line tools
use tracing_subscriber::{fmt, EnvFilter};

/// Log level for a number of `-v` flags
pub fn level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Log to standard error
///
/// The level is set by `verbosity` unless `RUST_LOG` is defined.
/// Only the first call has an effect.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level(verbosity)));
    // fails if a subscriber is already installed, e.g. by an earlier call
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
