use core::time::Duration;

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `shardflake` can emit.
///
/// Construction errors (`InvalidOrigin`, `InvalidShardCount`) are fatal for
/// the given configuration. The runtime variants are transient: the generator
/// state is left untouched and the caller may retry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The datacenter or worker ID does not fit in its 5-bit field.
    #[error("datacenter/worker id out of range: datacenter={datacenter_id}, worker={worker_id}, max={max}")]
    InvalidOrigin {
        datacenter_id: u64,
        worker_id: u64,
        max: u64,
    },

    /// The shard count cannot be encoded in the sequence field.
    #[error("invalid shard count {shards}; expected 1..={max}")]
    InvalidShardCount { shards: usize, max: usize },

    /// The clock moved backwards further than the tolerated skew.
    ///
    /// Both values are milliseconds since the generator's epoch.
    #[error("clock moved backwards: last issued at {last}ms, now {now}ms")]
    ClockRegression { last: u64, now: u64 },

    /// A bounded wait for the clock to advance gave up.
    #[error("gave up waiting for the clock after {waited:?}")]
    ClockWaitTimeout { waited: Duration },

    /// The elapsed time since the epoch no longer fits in the timestamp
    /// field.
    #[error("timestamp {timestamp}ms exceeds the 41-bit timestamp field")]
    TimestampOverflow { timestamp: u64 },

    /// A thread panicked while holding a shard lock.
    ///
    /// Never produced when the `parking-lot` feature is enabled, since those
    /// mutexes do not poison.
    #[error("shard lock poisoned")]
    LockPoisoned,
}

#[cfg(not(feature = "parking-lot"))]
use crate::generator::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}
