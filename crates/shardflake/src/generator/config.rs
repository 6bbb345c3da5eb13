use core::time::Duration;

use crate::{DEFAULT_EPOCH, SEQUENCE_BITS};

/// Largest tolerated backwards clock step, in milliseconds. Smaller
/// regressions are waited out; larger ones fail with
/// [`Error::ClockRegression`].
///
/// [`Error::ClockRegression`]: crate::Error::ClockRegression
pub const MAX_CLOCK_REGRESSION_MS: u64 = 5;

/// Upper bound on the number of shards. Every shard needs a distinct tag in
/// the 12-bit sequence field.
pub const MAX_SHARDS: usize = 1 << SEQUENCE_BITS;

/// Default bound on a single wait for the clock to advance.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(1);

/// Construction parameters for a [`ShardedGenerator`].
///
/// Zero values select defaults: a zero `epoch` means [`DEFAULT_EPOCH`] and a
/// zero `shards` means twice the available parallelism.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use shardflake::{GeneratorConfig, DEFAULT_EPOCH};
///
/// let config = GeneratorConfig::new(1, 1)
///     .with_shards(4)
///     .with_max_wait(Some(Duration::from_millis(50)));
///
/// assert_eq!(config.resolved_epoch(), DEFAULT_EPOCH);
/// assert_eq!(config.resolved_shards(), 4);
/// ```
///
/// [`ShardedGenerator`]: crate::ShardedGenerator
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Zero point of the timestamp field, as a duration since 1970-01-01 UTC.
    pub epoch: Duration,
    /// Origin-high field, `0..=31`.
    pub datacenter_id: u64,
    /// Origin-low field, `0..=31`.
    pub worker_id: u64,
    /// Number of independently locked sequencing units.
    pub shards: usize,
    /// Bound on each wait for the clock. `None` waits indefinitely.
    pub max_wait: Option<Duration>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            epoch: DEFAULT_EPOCH,
            datacenter_id: 0,
            worker_id: 0,
            shards: 0,
            max_wait: Some(DEFAULT_MAX_WAIT),
        }
    }
}

impl GeneratorConfig {
    pub fn new(datacenter_id: u64, worker_id: u64) -> Self {
        Self {
            datacenter_id,
            worker_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_epoch(mut self, epoch: Duration) -> Self {
        self.epoch = epoch;
        self
    }

    #[must_use]
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// The epoch the generator will use.
    pub fn resolved_epoch(&self) -> Duration {
        if self.epoch.is_zero() {
            DEFAULT_EPOCH
        } else {
            self.epoch
        }
    }

    /// The shard count the generator will use, before range validation.
    pub fn resolved_shards(&self) -> usize {
        if self.shards == 0 {
            default_shards()
        } else {
            self.shards
        }
    }
}

/// Two shards per logical CPU, clamped to `1..=MAX_SHARDS`.
pub fn default_shards() -> usize {
    shards_for_cpus(num_cpus::get())
}

pub(crate) fn shards_for_cpus(cpus: usize) -> usize {
    cpus.saturating_mul(2).clamp(1, MAX_SHARDS)
}
