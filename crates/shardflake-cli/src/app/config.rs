use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use core::time::Duration;
use shardflake::{DEFAULT_EPOCH, GeneratorConfig, MAX_SHARDS, SnowflakeId};

/// Command-line arguments for the `shardflake` binary.
///
/// Every option can also be set through the environment (or a `.env` file in
/// the working directory).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "shardflake",
    version,
    about = "Generate and decode sharded Snowflake IDs"
)]
pub struct CliArgs {
    /// Epoch the IDs count from, in milliseconds since 1970-01-01 UTC.
    ///
    /// Zero selects the default epoch (2025-01-01T00:00:00Z).
    ///
    /// Environment variable: `SHARDFLAKE_EPOCH_MS`
    #[arg(long, global = true, env = "SHARDFLAKE_EPOCH_MS", default_value_t = DEFAULT_EPOCH.as_millis() as u64)]
    pub epoch_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Issue IDs from several threads and check them for duplicates.
    Generate(GenerateArgs),
    /// Decode IDs and verify that they re-encode losslessly.
    Decode(DecodeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Datacenter (origin-high) ID, `0..=31`.
    ///
    /// Environment variable: `DATACENTER_ID`
    #[arg(long, env = "DATACENTER_ID", default_value_t = 1)]
    pub datacenter_id: u64,

    /// Worker (origin-low) ID, `0..=31`.
    ///
    /// Environment variable: `WORKER_ID`
    #[arg(long, env = "WORKER_ID", default_value_t = 1)]
    pub worker_id: u64,

    /// Number of shards. Zero picks twice the available parallelism.
    ///
    /// Environment variable: `SHARDS`
    #[arg(long, env = "SHARDS", default_value_t = 0)]
    pub shards: usize,

    /// Number of threads calling the generator concurrently.
    ///
    /// Environment variable: `THREADS`
    #[arg(long, env = "THREADS", default_value_t = 10)]
    pub threads: usize,

    /// IDs issued by each thread.
    ///
    /// Environment variable: `IDS_PER_THREAD`
    #[arg(long, env = "IDS_PER_THREAD", default_value_t = 50)]
    pub count: usize,

    /// Pause between two IDs on the same thread, in milliseconds.
    ///
    /// Environment variable: `PAUSE_MS`
    #[arg(long, env = "PAUSE_MS", default_value_t = 1)]
    pub pause_ms: u64,

    /// Bound on each wait for the clock, in milliseconds. Zero waits
    /// indefinitely.
    ///
    /// Environment variable: `MAX_WAIT_MS`
    #[arg(long, env = "MAX_WAIT_MS", default_value_t = 1_000)]
    pub max_wait_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// IDs to decode.
    #[arg(required = true)]
    pub ids: Vec<u64>,
}

/// Validated settings for the `generate` subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateConfig {
    pub generator: GeneratorConfig,
    pub threads: usize,
    pub ids_per_thread: usize,
    pub pause: Duration,
}

/// Validated settings for the `decode` subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeConfig {
    pub epoch: Duration,
    pub ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppConfig {
    Generate(GenerateConfig),
    Decode(DecodeConfig),
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let epoch = Duration::from_millis(args.epoch_ms);

        match args.command {
            Command::Generate(generate) => {
                if generate.datacenter_id > SnowflakeId::max_datacenter_id() {
                    bail!(
                        "DATACENTER_ID ({}) exceeds the 5-bit field (max = {})",
                        generate.datacenter_id,
                        SnowflakeId::max_datacenter_id()
                    );
                }
                if generate.worker_id > SnowflakeId::max_worker_id() {
                    bail!(
                        "WORKER_ID ({}) exceeds the 5-bit field (max = {})",
                        generate.worker_id,
                        SnowflakeId::max_worker_id()
                    );
                }
                if generate.shards > MAX_SHARDS {
                    bail!(
                        "SHARDS ({}) exceeds the sequence field capacity (max = {})",
                        generate.shards,
                        MAX_SHARDS
                    );
                }
                if generate.threads == 0 {
                    bail!("THREADS must be greater than 0");
                }

                let max_wait = (generate.max_wait_ms > 0)
                    .then(|| Duration::from_millis(generate.max_wait_ms));

                Ok(Self::Generate(GenerateConfig {
                    generator: GeneratorConfig::new(generate.datacenter_id, generate.worker_id)
                        .with_epoch(epoch)
                        .with_shards(generate.shards)
                        .with_max_wait(max_wait),
                    threads: generate.threads,
                    ids_per_thread: generate.count,
                    pause: Duration::from_millis(generate.pause_ms),
                }))
            }
            Command::Decode(decode) => Ok(Self::Decode(DecodeConfig {
                epoch: if epoch.is_zero() { DEFAULT_EPOCH } else { epoch },
                ids: decode.ids,
            })),
        }
    }
}
