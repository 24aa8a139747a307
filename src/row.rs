//! Row-level parsing with optional slot reuse.
//!
//! A row is an ordered sequence of nullable tokens exposed through
//! [`TokenRow`].  [`parse_row`] allocates a fresh vector per call, while
//! [`FeatureArena`] keeps a buffer of feature slots that are overwritten in
//! place across calls.
//!
//! The slice returned by [`FeatureArena::parse_row`] borrows the arena, so
//! the previous row's features cannot be held across the next overwrite.

use log::trace;

use crate::codec::ByteReader;
use crate::error::{FeatureError, Result};
use crate::feature::{Feature, FeatureMode};
use crate::metrics::ArenaStats;
use crate::parser::{parse, parse_into};

/// Source of one row's raw tokens.
///
/// Implementations must answer [`TokenRow::token`] for every position in
/// `0..len()`; `None` marks an absent element, which is skipped.
pub trait TokenRow {
    /// Number of elements in the row, absent ones included.
    fn len(&self) -> usize;

    /// Token at `position`, or `None` when the element is absent.
    fn token(&self, position: usize) -> Option<&str>;

    /// Returns `true` when the row has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: AsRef<str>> TokenRow for [Option<S>] {
    fn len(&self) -> usize {
        <[Option<S>]>::len(self)
    }

    fn token(&self, position: usize) -> Option<&str> {
        self[position].as_ref().map(AsRef::as_ref)
    }
}

impl<S: AsRef<str>> TokenRow for Vec<Option<S>> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn token(&self, position: usize) -> Option<&str> {
        self.as_slice().token(position)
    }
}

/// Parses every present token of `row` into a new vector.
///
/// Returns `Ok(None)` when the row itself is absent.  A malformed token fails
/// the whole row with [`FeatureError::Token`] naming its position.
pub fn parse_row<R>(row: Option<&R>, mode: FeatureMode) -> Result<Option<Vec<Feature>>>
where
    R: TokenRow + ?Sized,
{
    let Some(row) = row else {
        return Ok(None);
    };
    let mut features = Vec::with_capacity(row.len());
    for position in 0..row.len() {
        let Some(token) = row.token(position) else {
            continue;
        };
        let feature = parse(token, mode).map_err(|err| err.at_token(position))?;
        features.push(feature);
    }
    Ok(Some(features))
}

/// Caller-owned buffer of reusable feature slots.
///
/// Output slot `j` of each row overwrites arena slot `j`; slots are only
/// allocated when a row has more present tokens than the arena has slots.
/// Slots past the current row are retained for later rows.
///
/// An arena must not be shared between threads while in use; run one arena per
/// worker instead.
#[derive(Debug, Clone, Default)]
pub struct FeatureArena {
    slots: Vec<Feature>,
    stats: ArenaStats,
}

impl FeatureArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an arena whose initial slots are the supplied probe features.
    #[must_use]
    pub fn with_probes(probes: Vec<Feature>) -> Self {
        Self {
            slots: probes,
            stats: ArenaStats::default(),
        }
    }

    /// Number of slots currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when no slots have been allocated yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All retained slots, including ones beyond the most recent row.
    #[must_use]
    pub fn slots(&self) -> &[Feature] {
        &self.slots
    }

    /// Reuse counters accumulated since construction.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        self.stats
    }

    /// Releases the slots to the caller.
    #[must_use]
    pub fn into_inner(self) -> Vec<Feature> {
        self.slots
    }

    /// Overwrites slot `slot` with `token`, appending when `slot == len()`.
    pub fn overwrite(&mut self, slot: usize, token: &str, mode: FeatureMode) -> Result<&Feature> {
        if slot > self.slots.len() {
            return Err(FeatureError::SlotOutOfRange {
                slot,
                len: self.slots.len(),
            });
        }
        self.fill(slot, token, mode)?;
        Ok(&self.slots[slot])
    }

    /// Parses `row` into the arena and returns the filled prefix.
    ///
    /// Returns `Ok(None)` for an absent row.  On error, slots before the failing
    /// token hold this row's content and the remaining slots are unchanged.
    pub fn parse_row<R>(&mut self, row: Option<&R>, mode: FeatureMode) -> Result<Option<&[Feature]>>
    where
        R: TokenRow + ?Sized,
    {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut filled = 0;
        for position in 0..row.len() {
            let Some(token) = row.token(position) else {
                self.stats.skipped_tokens += 1;
                continue;
            };
            self.fill(filled, token, mode)
                .map_err(|err| err.at_token(position))?;
            filled += 1;
        }
        self.stats.rows += 1;
        Ok(Some(&self.slots[..filled]))
    }

    /// Decodes `count` records of `mode` from `src` into the arena.
    pub fn decode_row(
        &mut self,
        src: &mut ByteReader<'_>,
        count: usize,
        mode: FeatureMode,
    ) -> Result<&[Feature]> {
        for slot in 0..count {
            if let Some(feature) = self.slots.get_mut(slot) {
                feature.read_into(src, mode)?;
                self.stats.reused_slots += 1;
            } else {
                let feature = Feature::read_from(src, mode)?;
                self.push_fresh(feature);
            }
        }
        self.stats.rows += 1;
        Ok(&self.slots[..count])
    }

    fn fill(&mut self, slot: usize, token: &str, mode: FeatureMode) -> Result<()> {
        if let Some(feature) = self.slots.get_mut(slot) {
            parse_into(token, feature, mode)?;
            self.stats.reused_slots += 1;
        } else {
            let feature = parse(token, mode)?;
            self.push_fresh(feature);
        }
        Ok(())
    }

    fn push_fresh(&mut self, feature: Feature) {
        self.slots.push(feature);
        self.stats.fresh_slots += 1;
        trace!("feature arena grew to {} slots", self.slots.len());
    }
}
