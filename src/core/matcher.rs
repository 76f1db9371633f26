//! Streaming entity matchers.
//!
//! A matcher consumes tokens one at a time through [`EntityMatcher::next_token`]
//! and accumulates [`ProbabilisticMatch`] records. All window-based matchers
//! enumerate the suffixes of their [`Window`] after every token, so a match
//! always ends on the most recent token; they differ in how candidates are
//! found and scored:
//!
//! - [`ExactEntityMatcher`]: trie walk, every match has probability 1.0
//! - [`GenericEntityMatcher`]: union of candidates, any [`Likelihood`]
//! - [`MissingTokenEntityMatcher`]: intersection of candidates through a
//!   [`TokenToEntitiesCache`], plus an order check
//!
//! The segment-based [`EntityMatcherAddRemove`](crate::EntityMatcherAddRemove)
//! implements the same trait.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use entity_extraction::{EntityMatcher, ExactEntityMatcher, Lookup, Trie};
//!
//! let lookup = Lookup::from_entities([(1, vec!["baker", "street"])]).unwrap();
//! let mut matcher = ExactEntityMatcher::new(Arc::new(Trie::from_lookup(&lookup))).unwrap();
//! let matches = matcher.match_tokens(&["on", "baker", "street"]).unwrap();
//! assert_eq!((matches[0].start, matches[0].end), (1, 2));
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::cache::TokenToEntitiesCache;
use super::config::MatcherConfig;
use super::error::{check_probability, MatchError, Result};
use super::likelihood::{Likelihood, MissingTokenLikelihood};
use super::lookup::EntityLookup;
use super::trie::Trie;
use super::types::{EntityId, EntitySpan, ProbabilisticMatch};
use super::window::Window;

/// Common interface of every matcher variant.
pub trait EntityMatcher {
    /// Consume the next token of the stream.
    fn next_token(&mut self, token: &str) -> Result<()>;

    /// Flush buffered work at the end of the stream.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Matches found so far, in discovery order, without duplicates.
    fn get_matches(&self) -> &[ProbabilisticMatch];

    /// Spans of the matches whose probability is at least `threshold`.
    fn get_matches_above_threshold(&self, threshold: f64) -> Result<Vec<EntitySpan>> {
        check_probability("threshold", threshold)?;
        Ok(self
            .get_matches()
            .iter()
            .filter(|m| m.probability >= threshold)
            .map(ProbabilisticMatch::to_span)
            .collect())
    }

    /// Forget the current stream. Absolute positions restart at zero.
    fn reset(&mut self);

    /// Feed a whole token sequence, then [`finish`](Self::finish).
    fn match_tokens<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<&[ProbabilisticMatch]>
    where
        Self: Sized,
    {
        if tokens.is_empty() {
            return Err(MatchError::EmptyTokens);
        }
        for token in tokens {
            self.next_token(token.as_ref())?;
        }
        self.finish()?;
        Ok(self.get_matches())
    }
}

pub(crate) fn check_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(MatchError::invalid_parameter("tokens must not be empty"));
    }
    Ok(())
}

/// Matches in discovery order, indexed by location so a duplicate check only
/// compares against matches with the same start, end and entity id.
#[derive(Debug, Default, Clone)]
pub(crate) struct MatchList {
    matches: Vec<ProbabilisticMatch>,
    by_location: FxHashMap<(usize, usize, EntityId), Vec<usize>>,
}

impl MatchList {
    /// Append `candidate` unless an equal match is already present.
    pub(crate) fn push(&mut self, candidate: ProbabilisticMatch) -> bool {
        let slots = self
            .by_location
            .entry((candidate.start, candidate.end, candidate.entity_id))
            .or_default();
        if slots.iter().any(|&i| self.matches[i] == candidate) {
            return false;
        }
        tracing::trace!(
            start = candidate.start,
            end = candidate.end,
            entity_id = candidate.entity_id,
            probability = candidate.probability,
            "match"
        );
        slots.push(self.matches.len());
        self.matches.push(candidate);
        true
    }

    pub(crate) fn as_slice(&self) -> &[ProbabilisticMatch] {
        &self.matches
    }
}

/// Whether `observed` is `entity` with some tokens dropped and the rest in order.
///
/// Walks the entity tokens once, advancing through `observed` on every equal
/// token; succeeds iff all of `observed` was consumed.
///
/// ```
/// use entity_extraction::correct_sequence;
///
/// assert!(correct_sequence(&["A", "B", "C"], &["A", "C"]));
/// assert!(!correct_sequence(&["A", "B", "C"], &["C", "A"]));
/// ```
pub fn correct_sequence<S: AsRef<str>, T: AsRef<str>>(entity: &[S], observed: &[T]) -> bool {
    let mut next = 0;
    for token in entity {
        if next < observed.len() && token.as_ref() == observed[next].as_ref() {
            next += 1;
        }
    }
    next == observed.len()
}

fn window_for<L: EntityLookup>(lookup: &L) -> Result<Window> {
    Window::new(lookup.max_entity_len())
}

fn entity_tokens<L: EntityLookup>(
    lookup: &L,
    entity_id: EntityId,
) -> Result<std::borrow::Cow<'_, [String]>> {
    lookup
        .tokens_for_entity(entity_id)
        .ok_or(MatchError::UnknownEntity(entity_id))
}

/// Finds exact occurrences of entities by walking a [`Trie`].
pub struct ExactEntityMatcher {
    trie: Arc<Trie>,
    window: Window,
    matches: MatchList,
}

impl ExactEntityMatcher {
    /// The window holds as many tokens as the deepest trie path.
    ///
    /// # Errors
    /// Returns [`MatchError::InvalidWindow`] for an empty trie.
    pub fn new(trie: Arc<Trie>) -> Result<Self> {
        let window = Window::new(trie.max_depth())?;
        tracing::debug!(window = window.capacity(), "exact matcher ready");
        Ok(Self {
            trie,
            window,
            matches: MatchList::default(),
        })
    }
}

impl EntityMatcher for ExactEntityMatcher {
    fn next_token(&mut self, token: &str) -> Result<()> {
        check_token(token)?;
        self.window.add_token(token);
        let Some(view) = self.window.get_tokens() else {
            return Ok(());
        };

        let n = view.tokens.len();
        for len in 1..=n {
            let suffix = &view.tokens[n - len..];
            if let Some(entity_id) = self.trie.has_tokens(suffix).entity_id {
                let start = view.last_index + 1 - len;
                self.matches.push(ProbabilisticMatch::new(
                    start, view.last_index, entity_id, 1.0,
                ));
            }
        }
        Ok(())
    }

    fn get_matches(&self) -> &[ProbabilisticMatch] {
        self.matches.as_slice()
    }

    fn reset(&mut self) {
        self.window = self.window.cleared();
        self.matches = MatchList::default();
    }
}

/// Scores every entity touched by any token of a window suffix.
pub struct GenericEntityMatcher<L: EntityLookup, M: Likelihood> {
    lookup: Arc<L>,
    model: M,
    config: MatcherConfig,
    window: Window,
    matches: MatchList,
}

impl<L: EntityLookup, M: Likelihood> GenericEntityMatcher<L, M> {
    pub fn new(lookup: Arc<L>, model: M) -> Result<Self> {
        Self::with_config(lookup, model, MatcherConfig::default())
    }

    pub fn with_config(lookup: Arc<L>, model: M, config: MatcherConfig) -> Result<Self> {
        config.validate()?;
        let window = window_for(&*lookup)?;
        tracing::debug!(
            window = window.capacity(),
            threshold = config.threshold,
            min_tokens = config.min_tokens,
            "generic matcher ready"
        );
        Ok(Self {
            lookup,
            model,
            config,
            window,
            matches: MatchList::default(),
        })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }
}

impl<L: EntityLookup, M: Likelihood> EntityMatcher for GenericEntityMatcher<L, M> {
    fn next_token(&mut self, token: &str) -> Result<()> {
        check_token(token)?;
        self.window.add_token(token);
        let Some(view) = self.window.get_tokens() else {
            return Ok(());
        };

        let n = view.tokens.len();
        let mut candidates = BTreeSet::new();
        for len in 1..=n {
            let suffix = &view.tokens[n - len..];
            // The suffix grows backwards, so only its first token is new.
            if let Some(ids) = self.lookup.entity_ids_for_token(&suffix[0]) {
                candidates.extend(ids.iter().copied());
            }
            if len < self.config.min_tokens {
                continue;
            }

            let start = view.last_index + 1 - len;
            for &entity_id in &candidates {
                let entity = entity_tokens(&*self.lookup, entity_id)?;
                let probability = self.model.likelihood(&entity, suffix)?;
                if probability >= self.config.threshold {
                    self.matches.push(ProbabilisticMatch::new(
                        start, view.last_index, entity_id, probability,
                    ));
                }
            }
        }
        Ok(())
    }

    fn get_matches(&self) -> &[ProbabilisticMatch] {
        self.matches.as_slice()
    }

    fn reset(&mut self) {
        self.window = self.window.cleared();
        self.matches = MatchList::default();
    }
}

/// Finds entities with some tokens missing, in the right order, and no extra
/// tokens inside the matched span.
pub struct MissingTokenEntityMatcher<L: EntityLookup, M: Likelihood = MissingTokenLikelihood> {
    lookup: Arc<L>,
    model: M,
    config: MatcherConfig,
    window: Window,
    cache: TokenToEntitiesCache,
    matches: MatchList,
}

impl<L: EntityLookup, M: Likelihood> MissingTokenEntityMatcher<L, M> {
    pub fn new(lookup: Arc<L>, model: M) -> Result<Self> {
        Self::with_config(lookup, model, MatcherConfig::default())
    }

    pub fn with_config(lookup: Arc<L>, model: M, config: MatcherConfig) -> Result<Self> {
        config.validate()?;
        let window = window_for(&*lookup)?;
        let cache = TokenToEntitiesCache::with_memo_capacity(config.memo_capacity)?;
        tracing::debug!(
            window = window.capacity(),
            threshold = config.threshold,
            min_tokens = config.min_tokens,
            memo_capacity = config.memo_capacity,
            "missing-token matcher ready"
        );
        Ok(Self {
            lookup,
            model,
            config,
            window,
            cache,
            matches: MatchList::default(),
        })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Cache entries currently held, one per distinct window token.
    pub fn cached_tokens(&self) -> usize {
        self.cache.len()
    }
}

impl<L: EntityLookup, M: Likelihood> EntityMatcher for MissingTokenEntityMatcher<L, M> {
    fn next_token(&mut self, token: &str) -> Result<()> {
        check_token(token)?;
        self.window.add_token(token);
        let Some(view) = self.window.get_tokens() else {
            return Ok(());
        };

        self.cache.retain(view.tokens);
        for token in self.cache.required(view.tokens) {
            let entity_ids = self
                .lookup
                .entity_ids_for_token(token)
                .map(|ids| ids.into_owned());
            self.cache.add(token, entity_ids);
        }

        let n = view.tokens.len();
        for len in self.config.min_tokens..=n {
            let suffix = &view.tokens[n - len..];
            let common = self.cache.entities_in_common(suffix)?;
            if common.is_empty() {
                // Longer suffixes only add tokens, so they cannot share more.
                break;
            }
            let mut candidates: Vec<EntityId> = common.into_iter().collect();
            candidates.sort_unstable();

            let start = view.last_index + 1 - len;
            for entity_id in candidates {
                let entity = entity_tokens(&*self.lookup, entity_id)?;
                if !correct_sequence(&entity[..], suffix) {
                    continue;
                }
                let probability = self.model.likelihood(&entity, suffix)?;
                if probability >= self.config.threshold {
                    self.matches.push(ProbabilisticMatch::new(
                        start, view.last_index, entity_id, probability,
                    ));
                }
            }
        }
        Ok(())
    }

    fn get_matches(&self) -> &[ProbabilisticMatch] {
        self.matches.as_slice()
    }

    fn reset(&mut self) {
        self.window = self.window.cleared();
        self.cache.clear();
        self.matches = MatchList::default();
    }
}
