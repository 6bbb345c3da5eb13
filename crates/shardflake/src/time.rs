use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default epoch: Wednesday, January 1, 2025 00:00:00 UTC
pub const DEFAULT_EPOCH: Duration = Duration::from_millis(1_735_689_600_000);

/// A source of "milliseconds since the epoch" readings.
///
/// The generator calls this once per ID and repeatedly while waiting for the
/// clock to catch up, so implementations should be cheap. Readings are
/// expected to be wall-clock time: regressions are detected and handled by the
/// generator, not hidden by the source.
///
/// # Example
///
/// ```
/// use shardflake::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedTime.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the configured epoch.
    fn current_millis(&self) -> u64;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

/// Wall-clock time source backed by [`SystemTime`], offset by an epoch.
///
/// Every call reads the system clock, so NTP steps and manual adjustments are
/// visible to the generator. Readings before the epoch saturate to zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemClock {
    epoch: Duration,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::with_epoch(DEFAULT_EPOCH)
    }
}

impl SystemClock {
    /// Constructs a clock whose zero point is `epoch`, given as a duration
    /// since 1970-01-01 UTC.
    pub const fn with_epoch(epoch: Duration) -> Self {
        Self { epoch }
    }

    /// The configured epoch.
    pub const fn epoch(&self) -> Duration {
        self.epoch
    }
}

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        let since_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        let millis = since_unix.saturating_sub(self.epoch).as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}
