// Allow non-const functions that use f32 arithmetic (not const-stable yet)
#![allow(clippy::missing_const_for_fn)]

//! Relevance scoring for retrieval candidates.
//!
//! A [`RelevanceScore`] is computed fresh for each candidate against each
//! query and never persisted. The aggregate is a fixed-weight combination
//! of five sub-scores:
//!
//! | Sub-score | Weight | Source |
//! |-----------|--------|--------|
//! | semantic | 0.35 | similarity returned by the vector query |
//! | temporal | 0.20 | linear one-week decay from creation time |
//! | location | 0.10 | 1.0 on exact match, else 0.0 |
//! | emotion | 0.20 | the candidate's recorded emotional intensity |
//! | importance | 0.15 | the candidate's recorded importance |
//!
//! Two hard overrides apply: `Identity` candidates are forced to
//! importance 0.9, and `ActiveFocus` candidates are forced to temporal 1.0
//! (working memory is always "now").

use crate::models::record::{IndexedRecord, MemoryModule};

/// Hours in one week; the temporal sub-score decays to zero over this span.
const DECAY_HOURS: f32 = 168.0;

/// Importance forced onto core-identity candidates.
const IDENTITY_IMPORTANCE: f32 = 0.9;

/// Weights applied when aggregating sub-scores. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    /// Weight of the semantic similarity sub-score.
    pub semantic: f32,
    /// Weight of the temporal recency sub-score.
    pub temporal: f32,
    /// Weight of the location match sub-score.
    pub location: f32,
    /// Weight of the emotional intensity sub-score.
    pub emotion: f32,
    /// Weight of the importance sub-score.
    pub importance: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            semantic: 0.35,
            temporal: 0.20,
            location: 0.10,
            emotion: 0.20,
            importance: 0.15,
        }
    }
}

impl ScoreWeights {
    /// Returns an error description if the weights do not sum to 1.0
    /// (within floating-point tolerance).
    pub fn validate(&self) -> crate::Result<()> {
        let sum = self.semantic + self.temporal + self.location + self.emotion + self.importance;
        if (sum - 1.0).abs() > 1e-4 {
            return Err(crate::Error::InvalidInput(format!(
                "relevance weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Per-candidate ranking result for one query. Ephemeral; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RelevanceScore {
    /// Similarity score from the vector query (0.0 to 1.0).
    pub semantic: f32,
    /// Recency score with one-week linear decay (0.0 to 1.0).
    pub temporal: f32,
    /// Location match score (0.0 or 1.0).
    pub location: f32,
    /// Recorded emotional intensity (0.0 to 1.0).
    pub emotion: f32,
    /// Recorded importance (0.0 to 1.0).
    pub importance: f32,
}

impl RelevanceScore {
    /// Computes the score for a candidate record.
    ///
    /// `semantic` is the similarity the vector layer reported for the
    /// candidate, `query_location` the caller's current location (if any),
    /// and `now` the evaluation timestamp.
    #[must_use]
    pub fn compute(
        record: &IndexedRecord,
        semantic: f32,
        query_location: Option<&str>,
        now: u64,
    ) -> Self {
        let temporal = if record.module == MemoryModule::ActiveFocus {
            // Working memory is always "now".
            1.0
        } else {
            temporal_decay(record.fields.created_at, now)
        };

        let importance = if record.module == MemoryModule::Identity {
            IDENTITY_IMPORTANCE
        } else {
            record.fields.importance
        };

        let location = match (query_location, record.fields.location.as_deref()) {
            (Some(q), Some(r)) if q == r => 1.0,
            _ => 0.0,
        };

        Self {
            semantic: semantic.clamp(0.0, 1.0),
            temporal,
            location,
            emotion: record.fields.emotion_intensity,
            importance,
        }
    }

    /// Aggregates the sub-scores under the given weights.
    #[must_use]
    pub fn aggregate(&self, weights: &ScoreWeights) -> f32 {
        weights.semantic.mul_add(
            self.semantic,
            weights.temporal.mul_add(
                self.temporal,
                weights.location.mul_add(
                    self.location,
                    weights
                        .emotion
                        .mul_add(self.emotion, weights.importance * self.importance),
                ),
            ),
        )
    }
}

/// Linear one-week decay from creation time, floored at zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn temporal_decay(created_at: u64, now: u64) -> f32 {
    let hours = now.saturating_sub(created_at) as f32 / 3600.0;
    (1.0 - hours / DECAY_HOURS).max(0.0)
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::models::record::{RecordFields, RecordId};

    fn record(module: MemoryModule, fields: RecordFields) -> IndexedRecord {
        IndexedRecord::new(RecordId::new("r"), module, "content", fields)
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!(ScoreWeights::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let weights = ScoreWeights {
            semantic: 0.5,
            ..ScoreWeights::default()
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_temporal_decay_bounds() {
        let now = 1_700_000_000;
        assert_eq!(temporal_decay(now, now), 1.0);
        // Half a week old: half decayed.
        let half_week = now - 84 * 3600;
        assert!((temporal_decay(half_week, now) - 0.5).abs() < 1e-5);
        // Older than a week: floored at zero.
        let two_weeks = now - 336 * 3600;
        assert_eq!(temporal_decay(two_weeks, now), 0.0);
    }

    #[test]
    fn test_identity_importance_override() {
        let now = 1_700_000_000;
        let core = record(MemoryModule::Identity, RecordFields::at(now).with_importance(0.1));
        let note = record(MemoryModule::Notes, RecordFields::at(now).with_importance(0.1));

        let core_score = RelevanceScore::compute(&core, 0.5, None, now);
        let note_score = RelevanceScore::compute(&note, 0.5, None, now);

        assert_eq!(core_score.importance, 0.9);
        assert_eq!(note_score.importance, 0.1);

        let weights = ScoreWeights::default();
        assert!(core_score.aggregate(&weights) > note_score.aggregate(&weights));
    }

    #[test]
    fn test_active_focus_temporal_override() {
        let now = 1_700_000_000;
        let stale = RecordFields::at(now - 336 * 3600);
        let focus = record(MemoryModule::ActiveFocus, stale.clone());
        let note = record(MemoryModule::Notes, stale);

        let focus_score = RelevanceScore::compute(&focus, 0.5, None, now);
        let note_score = RelevanceScore::compute(&note, 0.5, None, now);

        assert_eq!(focus_score.temporal, 1.0);
        assert_eq!(note_score.temporal, 0.0);
    }

    #[test]
    fn test_location_exact_match() {
        let now = 1_700_000_000;
        let rec = record(
            MemoryModule::Notes,
            RecordFields::at(now).with_location("home"),
        );

        assert_eq!(RelevanceScore::compute(&rec, 0.0, Some("home"), now).location, 1.0);
        assert_eq!(RelevanceScore::compute(&rec, 0.0, Some("office"), now).location, 0.0);
        assert_eq!(RelevanceScore::compute(&rec, 0.0, None, now).location, 0.0);
    }

    #[test]
    fn test_aggregate_matches_weighted_sum() {
        let score = RelevanceScore {
            semantic: 1.0,
            temporal: 0.5,
            location: 1.0,
            emotion: 0.0,
            importance: 0.4,
        };
        let weights = ScoreWeights::default();
        let expected = 0.35 + 0.20 * 0.5 + 0.10 + 0.15 * 0.4;
        assert!((score.aggregate(&weights) - expected).abs() < 1e-6);
    }
}
