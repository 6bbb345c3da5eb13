//! Console logging for the `shardflake` binary.
//!
//! The filter comes from `RUST_LOG` and defaults to `info`. Per-ID events are
//! emitted at `debug`, so `RUST_LOG=debug` prints every generated ID.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_file(true),
        )
        .try_init()?;

    Ok(())
}
