//! Log setup
//!
//! Logs go to stderr through `tracing`. `RUST_LOG` wins; otherwise the
//! configured level, or `oi=debug` with `--verbose`, or `warn`.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging(verbose: bool, configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match (verbose, configured) {
            (true, _) => "oi=debug",
            (false, Some(level)) => level,
            (false, None) => "warn",
        };
        EnvFilter::new(level)
    });

    // A subscriber may already be set (tests, embedding); keep it.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
