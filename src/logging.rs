//! Tracing subscriber setup

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive`. Fails instead of
/// panicking when a global subscriber is already set.
pub fn init_tracing(default_directive: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
}
