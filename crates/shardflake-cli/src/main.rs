#![doc = include_str!("../README.md")]

mod app;

use app::config::{AppConfig, CliArgs};
use app::telemetry::init_telemetry;
use anyhow::Context;
use clap::Parser;
use shardflake::ShardedGenerator;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    init_telemetry()?;

    match config {
        AppConfig::Generate(config) => {
            if cfg!(debug_assertions) {
                tracing::debug!("Starting generator with full config: {:#?}", config);
            }
            let generator = ShardedGenerator::new(config.generator)
                .context("failed to construct the ID generator")?;
            let report = app::generate::run(&generator, &config)?;
            if !report.is_clean() {
                anyhow::bail!(
                    "{} duplicate IDs out of {}",
                    report.duplicates.len(),
                    report.generated
                );
            }
        }
        AppConfig::Decode(config) => {
            let summary = app::decode::run(&config);
            if summary.mismatches > 0 {
                anyhow::bail!(
                    "{} of {} IDs failed to round-trip",
                    summary.mismatches,
                    summary.total
                );
            }
        }
    }

    Ok(())
}
