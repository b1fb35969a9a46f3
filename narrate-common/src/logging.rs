//! Tracing subscriber setup shared by narrate binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for the workspace crates
///
/// `debug` raises the narrate crates to DEBUG; everything else stays at INFO.
pub fn default_directive(debug: bool) -> String {
    if debug {
        "info,narrate_batch=debug,narrate_common=debug".to_string()
    } else {
        "info".to_string()
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive`. Returns an error if a
/// global subscriber was already installed.
pub fn init_tracing(debug: bool) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive(debug))),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;
    Ok(())
}
