//! Logging - tracing subscriber setup
//!
//! The embedding application decides when to install the subscriber;
//! nothing in the library installs one implicitly. `RUST_LOG` always
//! wins over the configured default level.

use crate::config::OrchestratorSettings;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// Returns false when a subscriber is already installed (e.g. by the
/// host application or an earlier test), which is not an error.
pub fn try_init_logging(default_level: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}

/// Install the global tracing subscriber from settings
pub fn init_logging(settings: &OrchestratorSettings) -> bool {
    try_init_logging(&settings.log_level)
}
