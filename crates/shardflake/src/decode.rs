use core::{fmt, time::Duration};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::SnowflakeId;

/// The fields recovered from a raw ID.
///
/// Produced by [`decode`]; never fails, so any 64-bit value yields some
/// `SnowflakeParts`, even one no generator ever issued.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SnowflakeParts {
    /// Wall-clock moment the ID was issued (`epoch + raw_millis`).
    pub timestamp: SystemTime,
    /// Milliseconds since the epoch, i.e. the raw timestamp field.
    pub raw_millis: u64,
    pub datacenter_id: u64,
    pub worker_id: u64,
    pub sequence: u64,
    /// The ID that was decoded.
    pub id: u64,
}

impl SnowflakeParts {
    /// Milliseconds since 1970-01-01 UTC.
    pub fn unix_millis(&self) -> u128 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis())
    }

    /// Packs the fields back into a 64-bit ID with the same layout the
    /// generator uses.
    pub fn reencode(&self) -> u64 {
        (self.raw_millis << SnowflakeId::TIMESTAMP_SHIFT)
            | (self.datacenter_id << SnowflakeId::DATACENTER_ID_SHIFT)
            | (self.worker_id << SnowflakeId::WORKER_ID_SHIFT)
            | (self.sequence << SnowflakeId::SEQUENCE_SHIFT)
    }
}

/// Splits `id` into its fields. `epoch` is the zero point the ID was issued
/// against.
///
/// The timestamp field is everything above bit 22, so the unused top bit is
/// kept rather than dropped and re-encoding is lossless for every input.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use shardflake::decode;
///
/// let parts = decode(107_861_853_232_828_416, Duration::from_millis(1_735_689_600_000));
/// assert_eq!(parts.datacenter_id, 1);
/// assert_eq!(parts.worker_id, 1);
/// assert_eq!(parts.reencode(), 107_861_853_232_828_416);
/// ```
pub fn decode(id: u64, epoch: Duration) -> SnowflakeParts {
    let raw_millis = id >> SnowflakeId::TIMESTAMP_SHIFT;
    let timestamp = UNIX_EPOCH
        .checked_add(epoch)
        .and_then(|t| t.checked_add(Duration::from_millis(raw_millis)))
        .unwrap_or(UNIX_EPOCH);

    SnowflakeParts {
        timestamp,
        raw_millis,
        datacenter_id: (id >> SnowflakeId::DATACENTER_ID_SHIFT) & SnowflakeId::DATACENTER_ID_MASK,
        worker_id: (id >> SnowflakeId::WORKER_ID_SHIFT) & SnowflakeId::WORKER_ID_MASK,
        sequence: (id >> SnowflakeId::SEQUENCE_SHIFT) & SnowflakeId::SEQUENCE_MASK,
        id,
    }
}

/// Decodes `id`, re-encodes the parts and reports whether the two agree.
///
/// A mismatch means the ID is corrupt or the encoder and decoder disagree on
/// the layout; the report then carries the XOR of the two values as a 64-bit
/// binary mask.
pub fn debug_decode(id: u64, epoch: Duration) -> String {
    round_trip_report(id, &decode(id, epoch))
}

fn round_trip_report(id: u64, parts: &SnowflakeParts) -> String {
    RoundTripReport { id, parts }.to_string()
}

/// Decoded fields of `id` followed by the outcome of re-encoding them.
struct RoundTripReport<'a> {
    id: u64,
    parts: &'a SnowflakeParts,
}

impl fmt::Display for RoundTripReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { id, parts } = *self;
        let reencoded = parts.reencode();

        writeln!(f, "ID: {id}")?;
        writeln!(
            f,
            "Decoded -> Timestamp: {}ms since unix epoch (+{}ms) | DC: {} | Worker: {} | Seq: {}",
            parts.unix_millis(),
            parts.raw_millis,
            parts.datacenter_id,
            parts.worker_id,
            parts.sequence,
        )?;

        if reencoded == id {
            writeln!(f, "OK: all bit fields match.")
        } else {
            writeln!(f, "MISMATCH detected!")?;
            writeln!(f, "Expected: {id}")?;
            writeln!(f, "Got: {reencoded}")?;
            writeln!(f, "Bit difference mask: {:064b}", id ^ reencoded)
        }
    }
}
