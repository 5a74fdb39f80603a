//! Logging setup, grounded on `env-tracing-logger`: a `tracing_subscriber`
//! registry with an env filter, returning an `impl Drop` guard the binary
//! holds for its lifetime.

use tracing_subscriber::layer::SubscriberExt;

struct Guard;

impl Drop for Guard {
    fn drop(&mut self) {}
}

/// Initializes global tracing with `RUST_LOG` if set, else `default_level`
/// (the daemon passes its `LOG_LEVEL` setting here, per §6).
pub fn init(default_level: &str) -> impl Drop {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("global tracing subscriber already set");
    }
    tracing::debug!(default_level, "logging initiated");
    Guard
}
