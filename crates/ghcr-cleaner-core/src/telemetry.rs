//! Log output for the `ghcr-cleaner` process.
//!
//! Everything goes to stderr: stdout is reserved for the run report, which
//! callers may pipe into `jq` when `--report-json` is set.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` when set, otherwise everything at `level` and above.
fn log_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber, as text or as one JSON object per line.
///
/// Only the first call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let registry = tracing_subscriber::registry().with(log_filter(level));
    let installed = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    installed.ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_ignored() {
        init_tracing(false, Level::DEBUG);
        init_tracing(true, Level::INFO);
        tracing::info!(event = "telemetry.test", "still logging");
    }
}
