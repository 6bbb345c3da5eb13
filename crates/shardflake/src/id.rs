use core::fmt;

/// Width of the timestamp field in bits.
pub const TIMESTAMP_BITS: u8 = 41;

/// Width of the datacenter (origin-high) field in bits.
pub const DATACENTER_BITS: u8 = 5;

/// Width of the worker (origin-low) field in bits.
pub const WORKER_BITS: u8 = 5;

/// Width of the sequence field in bits.
pub const SEQUENCE_BITS: u8 = 12;

/// A 64-bit Snowflake ID split into timestamp, datacenter, worker and
/// sequence fields.
///
/// - 41 bits timestamp (ms since the generator's epoch)
/// - 5 bits datacenter ID
/// - 5 bits worker ID
/// - 12 bits sequence
///
/// ```text
///  Bit Index:  63            22 21              17 16          12 11             0
///              +---------------+------------------+--------------+---------------+
///  Field:      | timestamp (41)| datacenter ID (5)| worker ID (5)| sequence (12) |
///              +---------------+------------------+--------------+---------------+
///              |<------------ MSB ------------ 64 bits ------------ LSB -------->|
/// ```
///
/// Bit 63 sits above the 41-bit timestamp and is never set by the generator.
/// [`SnowflakeId::timestamp`] masks it away; the decoder keeps it (see
/// [`decode`]).
///
/// # Example
///
/// ```
/// use shardflake::SnowflakeId;
///
/// let id = SnowflakeId::from_components(1000, 2, 3, 1);
/// assert_eq!(id.timestamp(), 1000);
/// assert_eq!(id.datacenter_id(), 2);
/// assert_eq!(id.worker_id(), 3);
/// assert_eq!(id.sequence(), 1);
/// ```
///
/// [`decode`]: crate::decode
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SnowflakeId {
    id: u64,
}

impl SnowflakeId {
    /// Bitmask for the 41-bit timestamp field. Occupies bits 22 through 62.
    pub const TIMESTAMP_MASK: u64 = (1 << TIMESTAMP_BITS) - 1;

    /// Bitmask for the 5-bit datacenter field. Occupies bits 17 through 21.
    pub const DATACENTER_ID_MASK: u64 = (1 << DATACENTER_BITS) - 1;

    /// Bitmask for the 5-bit worker field. Occupies bits 12 through 16.
    pub const WORKER_ID_MASK: u64 = (1 << WORKER_BITS) - 1;

    /// Bitmask for the 12-bit sequence field. Occupies bits 0 through 11.
    pub const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

    /// Number of bits to shift the timestamp to its position (bit 22).
    pub const TIMESTAMP_SHIFT: u64 = (SEQUENCE_BITS + WORKER_BITS + DATACENTER_BITS) as u64;

    /// Number of bits to shift the datacenter ID to its position (bit 17).
    pub const DATACENTER_ID_SHIFT: u64 = (SEQUENCE_BITS + WORKER_BITS) as u64;

    /// Number of bits to shift the worker ID to its position (bit 12).
    pub const WORKER_ID_SHIFT: u64 = SEQUENCE_BITS as u64;

    /// Number of bits to shift the sequence field (bit 0).
    pub const SEQUENCE_SHIFT: u64 = 0;

    /// Packs the four fields into an ID. Each value is masked to its field
    /// width first.
    pub const fn from_components(
        timestamp: u64,
        datacenter_id: u64,
        worker_id: u64,
        sequence: u64,
    ) -> Self {
        let timestamp = (timestamp & Self::TIMESTAMP_MASK) << Self::TIMESTAMP_SHIFT;
        let datacenter_id = (datacenter_id & Self::DATACENTER_ID_MASK) << Self::DATACENTER_ID_SHIFT;
        let worker_id = (worker_id & Self::WORKER_ID_MASK) << Self::WORKER_ID_SHIFT;
        let sequence = (sequence & Self::SEQUENCE_MASK) << Self::SEQUENCE_SHIFT;
        Self {
            id: timestamp | datacenter_id | worker_id | sequence,
        }
    }

    /// Wraps a raw 64-bit value without validation.
    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    /// Returns the raw 64-bit value.
    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    /// Extracts the timestamp from the packed ID.
    pub const fn timestamp(&self) -> u64 {
        (self.id >> Self::TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK
    }

    /// Extracts the datacenter ID from the packed ID.
    pub const fn datacenter_id(&self) -> u64 {
        (self.id >> Self::DATACENTER_ID_SHIFT) & Self::DATACENTER_ID_MASK
    }

    /// Extracts the worker ID from the packed ID.
    pub const fn worker_id(&self) -> u64 {
        (self.id >> Self::WORKER_ID_SHIFT) & Self::WORKER_ID_MASK
    }

    /// Extracts the sequence number from the packed ID.
    pub const fn sequence(&self) -> u64 {
        (self.id >> Self::SEQUENCE_SHIFT) & Self::SEQUENCE_MASK
    }

    pub const fn max_timestamp() -> u64 {
        Self::TIMESTAMP_MASK
    }

    pub const fn max_datacenter_id() -> u64 {
        Self::DATACENTER_ID_MASK
    }

    pub const fn max_worker_id() -> u64 {
        Self::WORKER_ID_MASK
    }

    pub const fn max_sequence() -> u64 {
        Self::SEQUENCE_MASK
    }

    /// Returns the ID as a zero-padded 20-digit string.
    pub fn to_padded_string(&self) -> String {
        format!("{:020}", self.id)
    }
}

impl From<SnowflakeId> for u64 {
    fn from(id: SnowflakeId) -> Self {
        id.to_raw()
    }
}

impl From<u64> for SnowflakeId {
    fn from(raw: u64) -> Self {
        Self::from_raw(raw)
    }
}

impl fmt::Display for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("timestamp", TIMESTAMP_BITS, self.timestamp()),
            ("datacenter_id", DATACENTER_BITS, self.datacenter_id()),
            ("worker_id", WORKER_BITS, self.worker_id()),
            ("sequence", SEQUENCE_BITS, self.sequence()),
        ];

        // Column width: the widest of label, decimal and hex, plus padding.
        let columns: Vec<usize> = fields
            .iter()
            .map(|(name, bits, value)| {
                let label_len = format!("{name} ({bits})").len();
                let dec_len = value.to_string().len();
                let hex_len = format!("0x{value:x}").len();
                label_len.max(dec_len).max(hex_len) + 2
            })
            .collect();

        fn center(s: impl ToString, width: usize) -> String {
            let s = s.to_string();
            let pad = width.saturating_sub(s.len());
            let left = pad / 2;
            format!("{}{}{}", " ".repeat(left), s, " ".repeat(pad - left))
        }

        fn border(f: &mut fmt::Formatter<'_>, columns: &[usize]) -> fmt::Result {
            write!(f, "        +")?;
            for &w in columns {
                write!(f, "{}+", "-".repeat(w))?;
            }
            writeln!(f)
        }

        writeln!(f, "SnowflakeId {{")?;
        writeln!(f, "    raw id     : 0x{:016x} ({})", self.id, self.id)?;
        writeln!(f, "    padded     : {}", self.to_padded_string())?;
        writeln!(f, "    layout     :")?;

        border(f, &columns)?;
        write!(f, "        |")?;
        for ((name, bits, _), &w) in fields.iter().zip(&columns) {
            write!(f, "{}|", center(format!("{name} ({bits})"), w))?;
        }
        writeln!(f)?;
        border(f, &columns)?;
        write!(f, "        |")?;
        for ((_, _, value), &w) in fields.iter().zip(&columns) {
            write!(f, "{}|", center(value, w))?;
        }
        writeln!(f)?;
        write!(f, "        |")?;
        for ((_, _, value), &w) in fields.iter().zip(&columns) {
            write!(f, "{}|", center(format!("0x{value:x}"), w))?;
        }
        writeln!(f)?;
        border(f, &columns)?;

        write!(f, "}}")
    }
}
