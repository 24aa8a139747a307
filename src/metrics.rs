//! Counters describing arena reuse and file conversions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Slot usage recorded by a [`FeatureArena`](crate::row::FeatureArena).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArenaStats {
    /// Rows parsed or decoded through the arena.
    pub rows: u64,
    /// Slots that had to be allocated because the arena was too short.
    pub fresh_slots: u64,
    /// Slots overwritten in place.
    pub reused_slots: u64,
    /// Absent tokens skipped while parsing.
    pub skipped_tokens: u64,
}

impl ArenaStats {
    /// Fraction of filled slots that were reused rather than allocated.
    #[must_use]
    pub fn reuse_ratio(&self) -> f64 {
        let total = self.fresh_slots + self.reused_slots;
        if total == 0 {
            0.0
        } else {
            self.reused_slots as f64 / total as f64
        }
    }
}

/// Outcome of converting a stream of rows between text and binary form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvertSummary {
    /// Rows read from the input.
    pub rows_read: u64,
    /// Rows written to the output.
    pub rows_written: u64,
    /// Rows dropped because they failed to parse or were empty.
    pub rows_skipped: u64,
    /// Features written across all rows.
    pub features: u64,
    /// Bytes written to the output.
    pub bytes_written: u64,
    /// Wall-clock duration of the conversion.
    pub elapsed: Duration,
    /// Arena reuse counters for the conversion.
    pub arena: ArenaStats,
}

impl ConvertSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows_read: 0,
            rows_written: 0,
            rows_skipped: 0,
            features: 0,
            bytes_written: 0,
            elapsed: Duration::ZERO,
            arena: ArenaStats::default(),
        }
    }

    /// Folds another summary into this one, e.g. when several files are converted.
    pub fn merge(&mut self, other: &ConvertSummary) {
        self.rows_read += other.rows_read;
        self.rows_written += other.rows_written;
        self.rows_skipped += other.rows_skipped;
        self.features += other.features;
        self.bytes_written += other.bytes_written;
        self.elapsed = self.elapsed.max(other.elapsed);
        self.arena.rows += other.arena.rows;
        self.arena.fresh_slots += other.arena.fresh_slots;
        self.arena.reused_slots += other.arena.reused_slots;
        self.arena.skipped_tokens += other.arena.skipped_tokens;
    }
}

impl Default for ConvertSummary {
    fn default() -> Self {
        Self::new()
    }
}
