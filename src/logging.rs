//! Tracing setup shared by the binaries
//!
//! Logs go to stderr so query output on stdout stays clean. `RUST_LOG`, when
//! set, overrides the configured level.

use crate::config::LoggingConfig;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives for a configured level. Bare levels apply to this crate
/// only; anything containing `=` is taken as a full directive list.
fn directives(level: &str) -> String {
    if level.contains('=') {
        level.to_string()
    } else {
        format!("timefind={level}")
    }
}

/// Install the global subscriber
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives(&config.level)))
        .unwrap_or_else(|_| EnvFilter::new("timefind=info"));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    }
}
