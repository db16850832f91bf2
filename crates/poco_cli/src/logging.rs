//! Tracing setup for the `poco` binary.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Default directives when `POCO_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "poco=info,poco_experiments=info,poco_core=info";

/// Install the global subscriber. Logs go to stderr so table output on
/// stdout stays clean.
///
/// Reads `POCO_LOG`, e.g. `POCO_LOG=poco_experiments=debug`. Safe to call
/// more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env("POCO_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}
