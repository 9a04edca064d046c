//! Logging setup for apps embedding the client
//!
//! `RUST_LOG` overrides `level` when set.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

/// Install a global subscriber.
///
/// * `level` - Log level (e.g., "info", "debug", "realtime_client=trace")
/// * `json_format` - JSON lines (production) or pretty console output (development)
///
/// Fails if a global subscriber is already installed.
pub fn init_logger(level: &str, json_format: bool) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    if json_format {
        let console_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        subscriber.with(console_layer).try_init()
    } else {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true);
        subscriber.with(console_layer).try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // Another test may have installed one first; either way the second call must fail
        let _ = init_logger("debug", false);
        assert!(init_logger("info", true).is_err());
    }
}
