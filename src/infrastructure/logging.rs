//! Logging configuration
//!
//! Initializes tracing for the command line. User-facing output goes through
//! the notifier, so the default filter only lets warnings through.

/// Filter used when neither `--debug` nor `--verbose` is given
pub const DEFAULT_LEVEL: &str = "warn";

/// Maps the global verbosity flags to a filter directive
#[must_use]
pub fn level_for(debug: bool, verbose: bool) -> &'static str {
    if verbose {
        "trace"
    } else if debug {
        "debug"
    } else {
        DEFAULT_LEVEL
    }
}

/// Initializes logging with the specified level
///
/// `RUST_LOG` wins over `level` when set. Installing a second subscriber is
/// a no-op.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_flags() {
        assert_eq!(level_for(false, false), "warn");
        assert_eq!(level_for(true, false), "debug");
        assert_eq!(level_for(true, true), "trace");
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging("debug");
        init_logging("info");
    }
}
