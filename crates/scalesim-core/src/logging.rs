//! Logging setup.
//!
//! Levels used by the simulator:
//! - `info`: run start and finish with the headline numbers
//! - `debug`: instance activations, deactivations and every applied scaling decision
//! - `trace`: instance readiness and wait-queue wake-ups
//! - `warn`: refused scale-ups and routing anomalies
//!
//! `RUST_LOG` overrides the level passed in, e.g.
//! `RUST_LOG=scalesim_core::pool=debug scalesim run ...`.

use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a stderr fmt subscriber filtered at `level` ("trace", "debug",
/// "info", "warn" or "error") unless `RUST_LOG` is set.
///
/// Calling it again is harmless: only the first subscriber is kept.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("scalesim_core={level},scalesim_policies={level}").into());

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(level, "logging initialized");
    }
}
