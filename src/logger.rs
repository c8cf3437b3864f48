//! Tracing bootstrap for the command-line binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::{MemoryError, Result};

/// Environment variable holding the log filter; `RUST_LOG` is read when it is unset
pub const LOG_ENV: &str = "AVATAR_MEMORY_LOG";

/// Install the global subscriber, writing to stderr so stdout stays clean for command output.
/// The filter defaults to `warn`.
pub fn init_tracing() -> Result<()> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| MemoryError::Config(format!("Failed to set global subscriber: {}", e)))
}
