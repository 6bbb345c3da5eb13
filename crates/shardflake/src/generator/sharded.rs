use core::time::Duration;
use portable_atomic::{AtomicUsize, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, GeneratorConfig, MAX_SHARDS, Result, SnowflakeId, SystemClock, TimeSource,
};

use super::{SequenceSplit, Shard};

/// A Snowflake ID generator that spreads callers over several independently
/// locked shards.
///
/// Each call picks a shard round-robin and only locks that shard, so at most
/// `1 / shards` of concurrent callers contend on any one mutex. The low bits
/// of the sequence field carry the shard index, which keeps IDs unique across
/// shards even though every shard shares the same datacenter and worker ID.
///
/// ## Guarantees
///
/// - ✅ Thread-safe (`&self` API)
/// - ✅ Unique across all shards of one generator
/// - ✅ Strictly increasing within a shard
/// - ❌ No ordering between shards within the same millisecond
///
/// ## Capacity
///
/// With `n` shards, `b = ceil(log2(n))` bits of the sequence go to the shard
/// tag and each shard can issue `2^(12 - b)` IDs per millisecond. The total
/// per-millisecond capacity stays at 4096 when `n` is a power of two.
///
/// # Example
///
/// ```
/// use shardflake::{GeneratorConfig, ShardedGenerator};
///
/// let generator = ShardedGenerator::new(GeneratorConfig::new(1, 1).with_shards(4)).unwrap();
/// let id = generator.next_id().unwrap();
/// assert_eq!(id.datacenter_id(), 1);
/// assert_eq!(id.worker_id(), 1);
/// ```
#[derive(Debug)]
pub struct ShardedGenerator<T = SystemClock>
where
    T: TimeSource,
{
    shards: Box<[Shard]>,
    next_shard: AtomicUsize,
    split: SequenceSplit,
    epoch: Duration,
    datacenter_id: u64,
    worker_id: u64,
    max_wait: Option<Duration>,
    clock: T,
}

impl ShardedGenerator<SystemClock> {
    /// Creates a generator reading the system clock relative to the
    /// configured epoch.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOrigin`] if the datacenter or worker ID exceeds 31.
    /// - [`Error::InvalidShardCount`] if more than [`MAX_SHARDS`] shards are
    ///   requested.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let clock = SystemClock::with_epoch(config.resolved_epoch());
        Self::with_clock(config, clock)
    }
}

impl<T> ShardedGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator over a caller-supplied time source.
    ///
    /// The clock must already count milliseconds from `config`'s epoch; the
    /// epoch is kept only so IDs can be decoded back to wall-clock time.
    ///
    /// # Errors
    ///
    /// Same as [`ShardedGenerator::new`].
    pub fn with_clock(config: GeneratorConfig, clock: T) -> Result<Self> {
        let max_origin = SnowflakeId::max_datacenter_id().min(SnowflakeId::max_worker_id());
        if config.datacenter_id > SnowflakeId::max_datacenter_id()
            || config.worker_id > SnowflakeId::max_worker_id()
        {
            return Err(Error::InvalidOrigin {
                datacenter_id: config.datacenter_id,
                worker_id: config.worker_id,
                max: max_origin,
            });
        }

        let shard_count = config.resolved_shards();
        if shard_count > MAX_SHARDS {
            return Err(Error::InvalidShardCount {
                shards: shard_count,
                max: MAX_SHARDS,
            });
        }

        let split = SequenceSplit::for_shards(shard_count);
        let shards = (0..shard_count as u64).map(Shard::new).collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            shards = shard_count,
            shard_bits = split.shard_bits,
            datacenter_id = config.datacenter_id,
            worker_id = config.worker_id,
            "created sharded generator"
        );

        Ok(Self {
            shards,
            next_shard: AtomicUsize::new(0),
            split,
            epoch: config.resolved_epoch(),
            datacenter_id: config.datacenter_id,
            worker_id: config.worker_id,
            max_wait: config.max_wait,
            clock,
        })
    }

    /// Issues the next ID.
    ///
    /// Waits (spinning) when the clock is up to 5 ms behind the selected
    /// shard's last timestamp, or when the shard has used its whole counter
    /// range for the current millisecond.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockRegression`] if the clock is more than 5 ms behind.
    /// - [`Error::ClockWaitTimeout`] if a wait exceeds the configured bound.
    /// - [`Error::TimestampOverflow`] if the epoch is more than 2^41 ms ago.
    /// - [`Error::LockPoisoned`] if another caller panicked inside the shard
    ///   lock (std mutex only).
    ///
    /// The shard is not modified when an error is returned.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn next_id(&self) -> Result<SnowflakeId> {
        let index = self.next_shard.fetch_add(1, Ordering::Relaxed) % self.shards.len();
        self.next_id_from(index)
    }

    /// Same as [`Self::next_id`], returning the raw `u64`.
    ///
    /// # Errors
    ///
    /// See [`Self::next_id`].
    pub fn next_raw(&self) -> Result<u64> {
        self.next_id().map(|id| id.to_raw())
    }

    /// Issues an ID from a specific shard, bypassing the round-robin
    /// selector.
    pub(crate) fn next_id_from(&self, index: usize) -> Result<SnowflakeId> {
        let shard = &self.shards[index];
        let (timestamp, counter) = shard.advance(&self.clock, self.split, self.max_wait)?;
        Ok(SnowflakeId::from_components(
            timestamp,
            self.datacenter_id,
            self.worker_id,
            self.split.sequence(counter, shard.index),
        ))
    }

    /// The shard an ID issued by this generator came from.
    pub fn shard_of(&self, id: SnowflakeId) -> usize {
        self.split.shard_index(id.sequence()) as usize
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Number of low sequence bits reserved for the shard tag.
    pub fn shard_bits(&self) -> u32 {
        self.split.shard_bits
    }

    /// IDs each shard can issue per millisecond.
    pub fn ids_per_shard_per_millis(&self) -> u64 {
        self.split.counter_mask + 1
    }

    pub fn epoch(&self) -> Duration {
        self.epoch
    }

    pub fn datacenter_id(&self) -> u64 {
        self.datacenter_id
    }

    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    pub fn clock(&self) -> &T {
        &self.clock
    }
}
