//! Segment-based matcher scoring windows by added and removed tokens.
//!
//! Instead of enumerating window suffixes token by token, this matcher buffers
//! the stream into segments of at most [`MAX_SEGMENT_POSITIONS`] tokens and
//! hands each segment to a [`PositionFinder`]. The finder reports, per entity,
//! the sorted positions at which the entity was a candidate. Every window of
//! the segment whose width lies in `min_window..=max_window` and that covers
//! at least one such position is then scored by an [`AddRemoveLikelihood`].
//! Tokens of the window outside the entity count as added.
//!
//! # Segmentation
//!
//! Consecutive segments overlap by `max_window - 1` tokens, so any window of
//! admissible width lies entirely inside at least one segment. Windows found
//! twice in the overlap are dropped by value equality.
//!
//! # Encoding
//!
//! The finder input lists the candidate entity ids of each token position as
//! space-separated decimals, positions joined by `|`:
//!
//! ```text
//! tokens:  10       downing  street   in
//! encoded: 1|1 2|1 2 7|
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use super::config::{AddRemoveConfig, MAX_SEGMENT_POSITIONS};
use super::error::{MatchError, Result};
use super::likelihood::AddRemoveLikelihood;
use super::lookup::EntityLookup;
use super::matcher::{check_token, EntityMatcher, MatchList};
use super::types::{EntityId, ProbabilisticMatch};

/// Positions per entity id, sorted by id.
pub type EntityPositions = Vec<(EntityId, Vec<usize>)>;

/// Locates candidate positions of entities within one encoded segment.
pub trait PositionFinder {
    /// For every entity id referenced at least `min_count` times, the sorted
    /// 0-based positions where it was a candidate. Errors are plain messages.
    fn find_positions(
        &self,
        encoded: &str,
        max_entity_id: EntityId,
        min_count: usize,
    ) -> std::result::Result<EntityPositions, String>;
}

/// Pure Rust position finder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentPositionFinder;

impl PositionFinder for SegmentPositionFinder {
    fn find_positions(
        &self,
        encoded: &str,
        max_entity_id: EntityId,
        min_count: usize,
    ) -> std::result::Result<EntityPositions, String> {
        let num_positions = encoded.split('|').count();
        if num_positions > MAX_SEGMENT_POSITIONS {
            return Err(format!(
                "segment has {} positions, at most {} are supported",
                num_positions, MAX_SEGMENT_POSITIONS
            ));
        }

        let mut found: BTreeMap<EntityId, Vec<usize>> = BTreeMap::new();
        for (position, ids) in encoded.split('|').enumerate() {
            for id in ids.split_whitespace() {
                let entity_id: EntityId = id
                    .parse()
                    .map_err(|_| format!("invalid entity id {:?} at position {}", id, position))?;
                if entity_id > max_entity_id {
                    return Err(format!(
                        "entity id {} exceeds maximum {}",
                        entity_id, max_entity_id
                    ));
                }
                let positions = found.entry(entity_id).or_default();
                if positions.last() != Some(&position) {
                    positions.push(position);
                }
            }
        }

        Ok(found
            .into_iter()
            .filter(|(_, positions)| positions.len() >= min_count)
            .collect())
    }
}

/// Encode the candidate entity ids of each token for a [`PositionFinder`].
pub fn encode_candidates<L: EntityLookup, S: AsRef<str>>(lookup: &L, tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|token| match lookup.entity_ids_for_token(token.as_ref()) {
            Some(ids) => {
                let mut ids: Vec<EntityId> = ids.iter().copied().collect();
                ids.sort_unstable();
                ids.iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            None => String::new(),
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Score every admissible window of one entity inside a segment.
fn score_entity<L: EntityLookup, M: AddRemoveLikelihood>(
    lookup: &L,
    model: &M,
    config: &AddRemoveConfig,
    segment: &[String],
    offset: usize,
    entity_id: EntityId,
    positions: &[usize],
) -> Result<Vec<ProbabilisticMatch>> {
    let in_range = positions.last().map_or(true, |&p| p < segment.len());
    if !in_range || positions.windows(2).any(|w| w[0] >= w[1]) {
        return Err(MatchError::PositionFinder(format!(
            "positions for entity {} are not sorted within the segment",
            entity_id
        )));
    }
    let entity_len = lookup
        .num_tokens_for_entity(entity_id)
        .ok_or(MatchError::UnknownEntity(entity_id))?;

    let (Some(&first), Some(&last)) = (positions.first(), positions.last()) else {
        return Ok(Vec::new());
    };
    let mut matches = Vec::new();
    for start in first.saturating_sub(config.max_window - 1)..=last {
        let max_end = (start + config.max_window - 1).min(segment.len() - 1);
        let mut next = positions.partition_point(|&p| p < start);
        let mut present: FxHashSet<&str> = FxHashSet::default();
        for end in start..=max_end {
            while next < positions.len() && positions[next] <= end {
                present.insert(segment[positions[next]].as_str());
                next += 1;
            }
            let width = end - start + 1;
            if width < config.min_window || present.is_empty() {
                continue;
            }

            // A repeated entity token counts once; the repeat is an addition.
            let n_present = present.len().min(entity_len);
            let added = width - n_present;
            let removed = entity_len - n_present;
            let probability = model.likelihood(
                added as f64 / width as f64,
                removed as f64 / entity_len as f64,
            )?;
            if probability >= config.threshold {
                matches.push(ProbabilisticMatch::new(
                    offset + start,
                    offset + end,
                    entity_id,
                    probability,
                ));
            }
        }
    }
    Ok(matches)
}

/// Matches entities with tokens added to or removed from them.
pub struct EntityMatcherAddRemove<L, M, F = SegmentPositionFinder>
where
    L: EntityLookup,
    M: AddRemoveLikelihood,
    F: PositionFinder,
{
    lookup: Arc<L>,
    model: M,
    finder: F,
    config: AddRemoveConfig,
    max_entity_id: EntityId,
    pending: Vec<String>,
    offset: usize,
    unscored: usize,
    matches: MatchList,
}

impl<L, M> EntityMatcherAddRemove<L, M, SegmentPositionFinder>
where
    L: EntityLookup + Sync,
    M: AddRemoveLikelihood + Sync,
{
    pub fn new(lookup: Arc<L>, model: M) -> Result<Self> {
        Self::with_finder(lookup, model, SegmentPositionFinder, AddRemoveConfig::default())
    }

    pub fn with_config(lookup: Arc<L>, model: M, config: AddRemoveConfig) -> Result<Self> {
        Self::with_finder(lookup, model, SegmentPositionFinder, config)
    }
}

impl<L, M, F> EntityMatcherAddRemove<L, M, F>
where
    L: EntityLookup + Sync,
    M: AddRemoveLikelihood + Sync,
    F: PositionFinder,
{
    /// Create a matcher backed by a custom position finder.
    ///
    /// # Errors
    /// Fails on an invalid config or an empty lookup.
    pub fn with_finder(lookup: Arc<L>, model: M, finder: F, config: AddRemoveConfig) -> Result<Self> {
        config.validate()?;
        let max_entity_id = lookup
            .max_entity_id()
            .ok_or_else(|| MatchError::invalid_parameter("lookup holds no entities"))?;
        tracing::debug!(
            threshold = config.threshold,
            min_window = config.min_window,
            max_window = config.max_window,
            min_count = config.min_count,
            "add/remove matcher ready"
        );
        Ok(Self {
            lookup,
            model,
            finder,
            config,
            max_entity_id,
            pending: Vec::with_capacity(MAX_SEGMENT_POSITIONS),
            offset: 0,
            unscored: 0,
            matches: MatchList::default(),
        })
    }

    pub fn config(&self) -> &AddRemoveConfig {
        &self.config
    }

    /// Tokens buffered but not yet covered by a scored segment.
    pub fn pending_tokens(&self) -> usize {
        self.unscored
    }

    fn score_segment(&mut self) -> Result<()> {
        let encoded = encode_candidates(&*self.lookup, &self.pending);
        let found = self
            .finder
            .find_positions(&encoded, self.max_entity_id, self.config.min_count)
            .map_err(MatchError::PositionFinder)?;
        tracing::debug!(
            offset = self.offset,
            len = self.pending.len(),
            candidates = found.len(),
            "scoring segment"
        );

        let lookup = &*self.lookup;
        let model = &self.model;
        let config = &self.config;
        let segment = self.pending.as_slice();
        let offset = self.offset;
        let scored = found
            .par_iter()
            .map(|(entity_id, positions)| {
                score_entity(lookup, model, config, segment, offset, *entity_id, positions)
            })
            .collect::<Result<Vec<_>>>()?;

        for candidate in scored.into_iter().flatten() {
            self.matches.push(candidate);
        }
        self.unscored = 0;
        Ok(())
    }

    /// Drop scored tokens, keeping the overlap for the next segment.
    fn advance(&mut self) {
        let keep = self.config.max_window - 1;
        let dropped = self.pending.len().saturating_sub(keep);
        self.pending.drain(..dropped);
        self.offset += dropped;
    }
}

impl<L, M, F> EntityMatcher for EntityMatcherAddRemove<L, M, F>
where
    L: EntityLookup + Sync,
    M: AddRemoveLikelihood + Sync,
    F: PositionFinder,
{
    fn next_token(&mut self, token: &str) -> Result<()> {
        check_token(token)?;
        self.pending.push(token.to_string());
        self.unscored += 1;
        if self.pending.len() >= MAX_SEGMENT_POSITIONS {
            self.score_segment()?;
            self.advance();
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.unscored > 0 {
            self.score_segment()?;
        }
        Ok(())
    }

    fn get_matches(&self) -> &[ProbabilisticMatch] {
        self.matches.as_slice()
    }

    fn reset(&mut self) {
        self.pending = Vec::with_capacity(MAX_SEGMENT_POSITIONS);
        self.offset = 0;
        self.unscored = 0;
        self.matches = MatchList::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::likelihood::{PiecewiseAddRemoveLikelihood, PiecewiseLinear};
    use crate::core::lookup::Lookup;

    fn make_test_model() -> PiecewiseAddRemoveLikelihood {
        PiecewiseAddRemoveLikelihood::symmetric(
            PiecewiseLinear::new((0.2, 0.8), (0.6, 0.4)).unwrap(),
        )
    }

    fn make_test_lookup() -> Arc<Lookup> {
        Arc::new(Lookup::from_entities([(1, vec!["a", "b", "c"]), (2, vec!["x", "y"])]).unwrap())
    }

    #[test]
    fn test_encode_candidates() {
        let lookup =
            Lookup::from_entities([(1, vec!["downing", "street"]), (7, vec!["baker", "street"])])
                .unwrap();
        let encoded = encode_candidates(&lookup, &["10", "downing", "street", "baker"]);
        assert_eq!(encoded, "|1|1 7|7");
    }

    #[test]
    fn test_native_finder() {
        let finder = SegmentPositionFinder;
        assert_eq!(
            finder.find_positions("1 2||2", 2, 1).unwrap(),
            vec![(1, vec![0]), (2, vec![0, 2])]
        );
        assert_eq!(
            finder.find_positions("1 2||2", 2, 2).unwrap(),
            vec![(2, vec![0, 2])]
        );
        assert!(finder.find_positions("5", 2, 1).is_err());
        assert!(finder.find_positions("x", 2, 1).is_err());

        let too_long = vec!["1"; MAX_SEGMENT_POSITIONS + 1].join("|");
        assert!(finder.find_positions(&too_long, 1, 1).is_err());
    }

    #[test]
    fn test_scores_window_with_insertion() {
        let config = AddRemoveConfig {
            threshold: 0.4,
            max_window: 4,
            ..AddRemoveConfig::default()
        };
        let mut matcher =
            EntityMatcherAddRemove::with_config(make_test_lookup(), make_test_model(), config)
                .unwrap();
        matcher.match_tokens(&["a", "q", "c"]).unwrap();

        // Window 0..=2: one token added (1/3), one removed (1/3).
        let curve = 0.8 - 0.4 * ((1.0 / 3.0 - 0.2) / 0.4);
        assert_eq!(
            matcher.get_matches(),
            &[ProbabilisticMatch::new(0, 2, 1, curve * curve)]
        );
    }

    #[test]
    fn test_window_may_extend_past_candidates() {
        let config = AddRemoveConfig {
            threshold: 0.0,
            min_window: 4,
            max_window: 4,
            ..AddRemoveConfig::default()
        };
        let mut matcher =
            EntityMatcherAddRemove::with_config(make_test_lookup(), make_test_model(), config)
                .unwrap();
        matcher.match_tokens(&["q", "a", "b", "c", "q"]).unwrap();

        // One outside token added (1/4), nothing removed.
        assert_eq!(
            matcher.get_matches(),
            &[
                ProbabilisticMatch::new(0, 3, 1, 0.75),
                ProbabilisticMatch::new(1, 4, 1, 0.75),
            ]
        );
    }

    #[test]
    fn test_nothing_scored_before_finish() {
        let mut matcher = EntityMatcherAddRemove::new(make_test_lookup(), make_test_model()).unwrap();
        matcher.next_token("x").unwrap();
        matcher.next_token("y").unwrap();
        assert_eq!(matcher.pending_tokens(), 2);
        assert!(matcher.get_matches().is_empty());

        matcher.finish().unwrap();
        assert_eq!(matcher.pending_tokens(), 0);
        assert!(matcher
            .get_matches()
            .contains(&ProbabilisticMatch::new(0, 1, 2, 1.0)));
    }

    struct FailingFinder;

    impl PositionFinder for FailingFinder {
        fn find_positions(
            &self,
            _encoded: &str,
            _max_entity_id: EntityId,
            _min_count: usize,
        ) -> std::result::Result<EntityPositions, String> {
            Err("segment rejected".to_string())
        }
    }

    #[test]
    fn test_finder_error_propagates() {
        let mut matcher = EntityMatcherAddRemove::with_finder(
            make_test_lookup(),
            make_test_model(),
            FailingFinder,
            AddRemoveConfig::default(),
        )
        .unwrap();
        matcher.next_token("a").unwrap();
        let err = matcher.finish().unwrap_err();
        assert!(matches!(err, MatchError::PositionFinder(msg) if msg == "segment rejected"));
        assert!(matcher.get_matches().is_empty());
    }

    struct UnsortedFinder;

    impl PositionFinder for UnsortedFinder {
        fn find_positions(
            &self,
            _encoded: &str,
            _max_entity_id: EntityId,
            _min_count: usize,
        ) -> std::result::Result<EntityPositions, String> {
            Ok(vec![(1, vec![1, 0])])
        }
    }

    #[test]
    fn test_unsorted_positions_rejected() {
        let mut matcher = EntityMatcherAddRemove::with_finder(
            make_test_lookup(),
            make_test_model(),
            UnsortedFinder,
            AddRemoveConfig::default(),
        )
        .unwrap();
        let err = matcher.match_tokens(&["a", "b"]).unwrap_err();
        assert!(matches!(err, MatchError::PositionFinder(_)));
    }

    #[test]
    fn test_empty_lookup_rejected() {
        let lookup = Arc::new(Lookup::new());
        assert!(EntityMatcherAddRemove::new(lookup, make_test_model()).is_err());
    }
}
