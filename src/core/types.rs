//! Value types produced by the matchers and consumed by the evaluator.

use serde::{Deserialize, Serialize};

/// Opaque entity identifier, stable for the lifetime of a lookup.
pub type EntityId = u32;

/// Tolerance used when comparing match probabilities.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// A candidate entity occurrence in the token stream.
///
/// `start` and `end` are absolute, inclusive token indices. Equality compares
/// the probability with a tolerance of [`PROBABILITY_TOLERANCE`], which is
/// what the matchers use to de-duplicate their output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProbabilisticMatch {
    pub start: usize,
    pub end: usize,
    pub entity_id: EntityId,
    pub probability: f64,
}

impl ProbabilisticMatch {
    pub fn new(start: usize, end: usize, entity_id: EntityId, probability: f64) -> Self {
        Self {
            start,
            end,
            entity_id,
            probability,
        }
    }

    /// Drop the probability, keeping the located span.
    pub fn to_span(&self) -> EntitySpan {
        EntitySpan::new(self.start, self.end, self.entity_id)
    }
}

impl PartialEq for ProbabilisticMatch {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && self.end == other.end
            && self.entity_id == other.entity_id
            && (self.probability - other.probability).abs() <= PROBABILITY_TOLERANCE
    }
}

/// A located entity occurrence without a probability (ground truth or a
/// thresholded prediction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub entity_id: EntityId,
}

impl EntitySpan {
    pub fn new(start: usize, end: usize, entity_id: EntityId) -> Self {
        Self {
            start,
            end,
            entity_id,
        }
    }

    /// Number of tokens covered, `end - start + 1`, or zero for an inverted
    /// span (see [`crate::calc_error`], which rejects those).
    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    /// True only for an inverted span.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Whether this span covers `position` with its entity id.
    #[inline]
    pub fn covers(&self, position: usize) -> bool {
        self.start <= position && position <= self.end
    }
}
