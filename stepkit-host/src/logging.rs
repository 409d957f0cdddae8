//! Process-wide log setup for hosts embedding stepkit.

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs a compact stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks DEBUG over INFO.
/// Returns false when a global subscriber was already installed.
pub fn init_tracing(verbose: bool) -> bool {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    match EnvFilter::try_from_default_env() {
        Ok(filter) => builder.with_env_filter(filter).try_init().is_ok(),
        Err(_) => builder.try_init().is_ok(),
    }
}
