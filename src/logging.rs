//! Test-friendly `tracing` setup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the harness log filter. `RUST_LOG` is used
/// when it is unset.
pub const LOG_ENV: &str = "FOURSLASH_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Install a fmt subscriber that writes through the test harness's captured
/// output. Safe to call from every test; only the first call installs.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .with_target(false)
        .try_init();
}

fn env_filter() -> EnvFilter {
    [LOG_ENV, EnvFilter::DEFAULT_ENV]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
