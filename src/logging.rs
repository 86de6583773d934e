use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::constants::paths;

/// Whether `ANTIAFK_VERBOSE` asks for debug output
pub fn verbose_from_env() -> bool {
    std::env::var(paths::VERBOSE_ENV_VAR)
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Initialise logging at `DEBUG` when verbose, `INFO` otherwise.
/// Calling it twice is harmless.
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .try_init();
}
