use core::time::Duration;
use std::time::Instant;

use crate::{Error, MAX_CLOCK_REGRESSION_MS, Result, SnowflakeId, TimeSource};

use super::Mutex;

/// Mutable part of a sequencing unit. Only touched while holding the owning
/// [`Shard`]'s lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ShardState {
    /// Millisecond of the last issued ID.
    pub(crate) last_timestamp: u64,
    /// Per-shard counter within `last_timestamp`. This is the sequence field
    /// without the shard tag.
    pub(crate) counter: u64,
}

/// How the 12-bit sequence field is split between the per-shard counter (high
/// bits) and the shard tag (low bits).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SequenceSplit {
    pub(crate) shard_bits: u32,
    pub(crate) counter_mask: u64,
}

impl SequenceSplit {
    /// `shards` must already be in `1..=MAX_SHARDS`.
    pub(crate) fn for_shards(shards: usize) -> Self {
        let shard_bits = usize::BITS - (shards - 1).leading_zeros();
        Self {
            shard_bits,
            counter_mask: SnowflakeId::max_sequence() >> shard_bits,
        }
    }

    pub(crate) fn sequence(&self, counter: u64, shard_index: u64) -> u64 {
        (counter << self.shard_bits) | shard_index
    }

    pub(crate) fn shard_index(&self, sequence: u64) -> u64 {
        sequence & ((1 << self.shard_bits) - 1)
    }
}

/// One independently locked sequencing unit.
#[derive(Debug)]
pub(crate) struct Shard {
    pub(crate) index: u64,
    #[cfg(feature = "cache-padded")]
    pub(crate) state: crossbeam_utils::CachePadded<Mutex<ShardState>>,
    #[cfg(not(feature = "cache-padded"))]
    pub(crate) state: Mutex<ShardState>,
}

impl Shard {
    pub(crate) fn new(index: u64) -> Self {
        Self {
            index,
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(Mutex::new(ShardState::default())),
            #[cfg(not(feature = "cache-padded"))]
            state: Mutex::new(ShardState::default()),
        }
    }

    /// Locks the shard and advances its state by one ID. Returns the resolved
    /// `(timestamp, counter)`.
    pub(crate) fn advance<T: TimeSource>(
        &self,
        clock: &T,
        split: SequenceSplit,
        max_wait: Option<Duration>,
    ) -> Result<(u64, u64)> {
        #[cfg(feature = "parking-lot")]
        let mut state = self.state.lock();
        #[cfg(not(feature = "parking-lot"))]
        let mut state = self.state.lock()?;

        state.advance(clock, split.counter_mask, max_wait)
    }
}

impl ShardState {
    /// Resolves the next `(timestamp, counter)` pair and commits it.
    ///
    /// On error the state is left exactly as it was.
    pub(crate) fn advance<T: TimeSource>(
        &mut self,
        clock: &T,
        counter_mask: u64,
        max_wait: Option<Duration>,
    ) -> Result<(u64, u64)> {
        let last = self.last_timestamp;
        let mut now = clock.current_millis();

        if now < last {
            now = Self::cold_clock_behind(clock, last, now, max_wait)?;
        }

        let (timestamp, counter) = if now > last {
            (now, 0)
        } else {
            let next = (self.counter + 1) & counter_mask;
            if next == 0 {
                // Counter space for this millisecond is used up.
                (spin_until(clock, last, max_wait, |t| t > last)?, 0)
            } else {
                (now, next)
            }
        };

        if timestamp > SnowflakeId::max_timestamp() {
            return Err(Error::TimestampOverflow { timestamp });
        }

        self.last_timestamp = timestamp;
        self.counter = counter;
        Ok((timestamp, counter))
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind<T: TimeSource>(
        clock: &T,
        last: u64,
        now: u64,
        max_wait: Option<Duration>,
    ) -> Result<u64> {
        check_regression(last, now)?;
        spin_until(clock, last, max_wait, |t| t >= last)
    }
}

/// Fails when `now` is more than [`MAX_CLOCK_REGRESSION_MS`] behind `last`.
fn check_regression(last: u64, now: u64) -> Result<()> {
    if last.saturating_sub(now) > MAX_CLOCK_REGRESSION_MS {
        #[cfg(feature = "tracing")]
        tracing::warn!(last, now, "clock moved backwards beyond tolerance");
        return Err(Error::ClockRegression { last, now });
    }
    Ok(())
}

/// Re-reads `clock` until `ready` accepts a reading, or `max_wait` elapses.
///
/// Every reading that is not ready must stay within the regression tolerance
/// of `last`, otherwise the wait fails with [`Error::ClockRegression`].
fn spin_until<T: TimeSource>(
    clock: &T,
    last: u64,
    max_wait: Option<Duration>,
    ready: impl Fn(u64) -> bool,
) -> Result<u64> {
    let started = Instant::now();
    loop {
        let now = clock.current_millis();
        if ready(now) {
            return Ok(now);
        }
        check_regression(last, now)?;
        if let Some(limit) = max_wait {
            let waited = started.elapsed();
            if waited >= limit {
                #[cfg(feature = "tracing")]
                tracing::warn!(?waited, "timed out waiting for the clock");
                return Err(Error::ClockWaitTimeout { waited });
            }
        }
        core::hint::spin_loop();
    }
}
