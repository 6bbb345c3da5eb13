use shardflake::{debug_decode, decode};

use super::config::DecodeConfig;

/// Outcome of a `decode` sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSummary {
    pub total: usize,
    pub mismatches: usize,
}

impl DecodeSummary {
    pub fn passed(&self) -> usize {
        self.total - self.mismatches
    }
}

/// Prints the round-trip report for every ID and returns how many of them
/// failed to re-encode to themselves.
pub fn run(config: &DecodeConfig) -> DecodeSummary {
    let mut mismatches = 0;

    for &id in &config.ids {
        print!("{}", debug_decode(id, config.epoch));

        let parts = decode(id, config.epoch);
        if parts.reencode() != id {
            tracing::error!(id, reencoded = parts.reencode(), "round trip mismatch");
            mismatches += 1;
        }
    }

    let summary = DecodeSummary {
        total: config.ids.len(),
        mismatches,
    };
    tracing::info!(
        total = summary.total,
        passed = summary.passed(),
        mismatches = summary.mismatches,
        "decode finished"
    );

    summary
}
