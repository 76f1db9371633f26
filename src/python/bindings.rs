//! Python bindings for the entity matchers.
//!
//! This module provides PyO3 wrappers around the core matchers, exposing a
//! Python-friendly API while keeping matching in Rust.
//!
//! # Data at the boundary
//!
//! Matches cross into Python as `(start, end, entity_id, probability)` tuples
//! and spans as `(start, end, entity_id)` tuples.
//!
//! # Sharing
//!
//! A `Lookup` accepts new entities while no fuzzy matcher shares it. Once one
//! does, it is read-only and `add` raises `ValueError`. `ExactEntityMatcher`
//! copies the entities into its own trie and does not hold the lookup.
//!
//! # Example
//!
//! ```python
//! from entity_extraction import Lookup, MissingTokenEntityMatcher
//!
//! lookup = Lookup()
//! lookup.add(1, ["10", "downing", "street"])
//!
//! matcher = MissingTokenEntityMatcher(lookup, p_missing=0.3, threshold=0.1)
//! for token in ["at", "10", "downing", "st"]:
//!     matcher.next_token(token)
//! print(matcher.get_matches())
//! ```

use std::sync::Arc;

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::core::{
    calc_error as core_calc_error, calc_error_batch as core_calc_error_batch,
    error_pair as core_error_pair, load_entities_file, AddRemoveConfig, DictionaryError,
    EntityId, EntityLookup, EntityMatcher, EntityMatcherAddRemove, EntitySpan, ExactEntityMatcher,
    GenericEntityMatcher, LikelihoodModel, LogisticLikelihood, Lookup, MatchError,
    MatcherConfig, MissingTokenEntityMatcher, MissingTokenLikelihood,
    PiecewiseAddRemoveLikelihood, PiecewiseLinear, ProbabilisticMatch, Trie,
};

type MatchTuple = (usize, usize, EntityId, f64);
type SpanTuple = (usize, usize, EntityId);

fn to_py_err(e: MatchError) -> PyErr {
    match e {
        MatchError::Dictionary(DictionaryError::IoError(io)) => PyIOError::new_err(io.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

fn match_tuples(matches: &[ProbabilisticMatch]) -> Vec<MatchTuple> {
    matches
        .iter()
        .map(|m| (m.start, m.end, m.entity_id, m.probability))
        .collect()
}

fn span_tuples(spans: Vec<EntitySpan>) -> Vec<SpanTuple> {
    spans
        .into_iter()
        .map(|s| (s.start, s.end, s.entity_id))
        .collect()
}

fn parse_span((start, end, entity_id): SpanTuple) -> EntitySpan {
    EntitySpan::new(start, end, entity_id)
}

fn parse_spans(spans: Vec<SpanTuple>) -> Vec<EntitySpan> {
    spans.into_iter().map(parse_span).collect()
}

/// Python wrapper for the entity lookup.
#[pyclass(name = "Lookup")]
pub struct PyLookup {
    inner: Arc<Lookup>,
}

#[pymethods]
impl PyLookup {
    /// Create an empty lookup.
    #[new]
    fn new() -> Self {
        Self {
            inner: Arc::new(Lookup::new()),
        }
    }

    /// Load a lookup from a dictionary file.
    ///
    /// Args:
    ///     path: File with one `<entity_id>\t<token> <token> ...` entry per line
    ///
    /// Raises:
    ///     IOError: If the file cannot be read
    ///     ValueError: If a line is malformed or repeats an entity
    #[staticmethod]
    fn from_file(path: &str) -> PyResult<Self> {
        let inner = load_entities_file(path).map_err(to_py_err)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Register an entity.
    ///
    /// Args:
    ///     entity_id: Id not yet used in this lookup
    ///     tokens: Non-empty list of distinct, non-empty tokens
    ///
    /// Raises:
    ///     ValueError: On invalid input, or once a matcher shares this lookup
    fn add(&mut self, entity_id: EntityId, tokens: Vec<String>) -> PyResult<()> {
        let lookup = Arc::get_mut(&mut self.inner).ok_or_else(|| {
            PyValueError::new_err("lookup is shared with a matcher and can no longer change")
        })?;
        lookup.add(entity_id, tokens).map_err(to_py_err)
    }

    /// Tokens of an entity, or None if unknown.
    fn tokens_for_entity(&self, entity_id: EntityId) -> Option<Vec<String>> {
        self.inner
            .tokens_for_entity(entity_id)
            .map(|tokens| tokens.into_owned())
    }

    /// Sorted ids of the entities containing a token, or None if unknown.
    fn entity_ids_for_token(&self, token: &str) -> Option<Vec<EntityId>> {
        self.inner.entity_ids_for_token(token).map(|ids| {
            let mut ids: Vec<EntityId> = ids.iter().copied().collect();
            ids.sort_unstable();
            ids
        })
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!("Lookup(entities={})", self.inner.len())
    }
}

/// Python wrapper for the exact matcher.
#[pyclass(name = "ExactEntityMatcher")]
pub struct PyExactEntityMatcher {
    inner: ExactEntityMatcher,
}

#[pymethods]
impl PyExactEntityMatcher {
    /// Build an exact matcher over every entity of a lookup.
    #[new]
    fn new(lookup: PyRef<'_, PyLookup>) -> PyResult<Self> {
        let trie = Trie::from_lookup(&lookup.inner);
        let inner = ExactEntityMatcher::new(Arc::new(trie)).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Consume the next token of the stream.
    fn next_token(&mut self, token: &str) -> PyResult<()> {
        self.inner.next_token(token).map_err(to_py_err)
    }

    /// Feed a token list and return all matches so far.
    fn match_tokens(&mut self, tokens: Vec<String>) -> PyResult<Vec<MatchTuple>> {
        self.inner
            .match_tokens(&tokens)
            .map(match_tuples)
            .map_err(to_py_err)
    }

    /// All matches as `(start, end, entity_id, probability)` tuples.
    fn get_matches(&self) -> Vec<MatchTuple> {
        match_tuples(self.inner.get_matches())
    }

    /// Spans of the matches scoring at least `threshold`.
    fn get_matches_above_threshold(&self, threshold: f64) -> PyResult<Vec<SpanTuple>> {
        self.inner
            .get_matches_above_threshold(threshold)
            .map(span_tuples)
            .map_err(to_py_err)
    }

    /// Forget the stream; positions restart at zero.
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn __repr__(&self) -> String {
        format!("ExactEntityMatcher(matches={})", self.inner.get_matches().len())
    }
}

/// Python wrapper for the window matcher scored by a logistic curve.
#[pyclass(name = "GenericEntityMatcher")]
pub struct PyGenericEntityMatcher {
    inner: GenericEntityMatcher<Lookup, LikelihoodModel>,
}

#[pymethods]
impl PyGenericEntityMatcher {
    /// Create a matcher scoring the proportion of entity tokens present.
    ///
    /// Args:
    ///     lookup: Entities to match
    ///     k: Steepness of the logistic curve, positive
    ///     x0: Midpoint of the logistic curve
    ///     threshold: Minimum probability of a reported match
    ///     min_tokens: Shortest window suffix considered
    #[new]
    #[pyo3(signature = (lookup, k, x0, threshold=0.5, min_tokens=1))]
    fn new(
        lookup: PyRef<'_, PyLookup>,
        k: f64,
        x0: f64,
        threshold: f64,
        min_tokens: usize,
    ) -> PyResult<Self> {
        let model = LogisticLikelihood::new(k, x0).map_err(to_py_err)?;
        let config = MatcherConfig {
            threshold,
            min_tokens,
            ..MatcherConfig::default()
        };
        let inner = GenericEntityMatcher::with_config(
            Arc::clone(&lookup.inner),
            LikelihoodModel::Logistic(model),
            config,
        )
        .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Consume the next token of the stream.
    fn next_token(&mut self, token: &str) -> PyResult<()> {
        self.inner.next_token(token).map_err(to_py_err)
    }

    /// Feed a token list and return all matches so far.
    fn match_tokens(&mut self, tokens: Vec<String>) -> PyResult<Vec<MatchTuple>> {
        self.inner
            .match_tokens(&tokens)
            .map(match_tuples)
            .map_err(to_py_err)
    }

    /// All matches as `(start, end, entity_id, probability)` tuples.
    fn get_matches(&self) -> Vec<MatchTuple> {
        match_tuples(self.inner.get_matches())
    }

    /// Spans of the matches scoring at least `threshold`.
    fn get_matches_above_threshold(&self, threshold: f64) -> PyResult<Vec<SpanTuple>> {
        self.inner
            .get_matches_above_threshold(threshold)
            .map(span_tuples)
            .map_err(to_py_err)
    }

    /// Forget the stream; positions restart at zero.
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn __repr__(&self) -> String {
        format!(
            "GenericEntityMatcher(threshold={}, matches={})",
            self.inner.config().threshold,
            self.inner.get_matches().len()
        )
    }
}

/// Python wrapper for the missing-token matcher.
#[pyclass(name = "MissingTokenEntityMatcher")]
pub struct PyMissingTokenEntityMatcher {
    inner: MissingTokenEntityMatcher<Lookup, MissingTokenLikelihood>,
}

#[pymethods]
impl PyMissingTokenEntityMatcher {
    /// Create a matcher tolerating entity tokens missing from the stream.
    ///
    /// Args:
    ///     lookup: Entities to match
    ///     p_missing: Probability that any single entity token is missing
    ///     threshold: Minimum probability of a reported match
    ///     min_tokens: Shortest window suffix considered
    #[new]
    #[pyo3(signature = (lookup, p_missing, threshold=0.5, min_tokens=1))]
    fn new(
        lookup: PyRef<'_, PyLookup>,
        p_missing: f64,
        threshold: f64,
        min_tokens: usize,
    ) -> PyResult<Self> {
        let model = MissingTokenLikelihood::new(p_missing).map_err(to_py_err)?;
        let config = MatcherConfig {
            threshold,
            min_tokens,
            ..MatcherConfig::default()
        };
        let inner =
            MissingTokenEntityMatcher::with_config(Arc::clone(&lookup.inner), model, config)
                .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Consume the next token of the stream.
    fn next_token(&mut self, token: &str) -> PyResult<()> {
        self.inner.next_token(token).map_err(to_py_err)
    }

    /// Feed a token list and return all matches so far.
    fn match_tokens(&mut self, tokens: Vec<String>) -> PyResult<Vec<MatchTuple>> {
        self.inner
            .match_tokens(&tokens)
            .map(match_tuples)
            .map_err(to_py_err)
    }

    /// All matches as `(start, end, entity_id, probability)` tuples.
    fn get_matches(&self) -> Vec<MatchTuple> {
        match_tuples(self.inner.get_matches())
    }

    /// Spans of the matches scoring at least `threshold`.
    fn get_matches_above_threshold(&self, threshold: f64) -> PyResult<Vec<SpanTuple>> {
        self.inner
            .get_matches_above_threshold(threshold)
            .map(span_tuples)
            .map_err(to_py_err)
    }

    /// Forget the stream; positions restart at zero.
    fn reset(&mut self) {
        self.inner.reset();
    }

    /// Number of tokens with cached candidate sets.
    #[getter]
    fn cached_tokens(&self) -> usize {
        self.inner.cached_tokens()
    }

    fn __repr__(&self) -> String {
        format!(
            "MissingTokenEntityMatcher(threshold={}, matches={})",
            self.inner.config().threshold,
            self.inner.get_matches().len()
        )
    }
}

/// Python wrapper for the add/remove matcher.
#[pyclass(name = "EntityMatcherAddRemove")]
pub struct PyEntityMatcherAddRemove {
    inner: EntityMatcherAddRemove<Lookup, PiecewiseAddRemoveLikelihood>,
}

#[pymethods]
impl PyEntityMatcherAddRemove {
    /// Create a matcher tolerating inserted and deleted tokens.
    ///
    /// Both proportions are scored by the same piecewise-linear curve through
    /// (0, 1), `knot0`, `knot1` and (1, 0).
    ///
    /// Args:
    ///     lookup: Entities to match
    ///     knot0: Inner `(x, p)` point of the curve
    ///     knot1: Inner `(x, p)` point of the curve, right of `knot0`
    ///     threshold: Minimum probability of a reported match
    ///     min_window: Narrowest window scored
    ///     max_window: Widest window scored, at most 255
    ///     min_count: Minimum candidate positions of an entity per segment
    ///
    /// Note:
    ///     Tokens are buffered; call `finish()` before reading the final matches.
    #[new]
    #[pyo3(signature = (lookup, knot0, knot1, threshold=0.5, min_window=1, max_window=8, min_count=1))]
    fn new(
        lookup: PyRef<'_, PyLookup>,
        knot0: (f64, f64),
        knot1: (f64, f64),
        threshold: f64,
        min_window: usize,
        max_window: usize,
        min_count: usize,
    ) -> PyResult<Self> {
        let curve = PiecewiseLinear::new(knot0, knot1).map_err(to_py_err)?;
        let config = AddRemoveConfig {
            threshold,
            min_window,
            max_window,
            min_count,
        };
        let inner = EntityMatcherAddRemove::with_config(
            Arc::clone(&lookup.inner),
            PiecewiseAddRemoveLikelihood::symmetric(curve),
            config,
        )
        .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Consume the next token of the stream.
    fn next_token(&mut self, token: &str) -> PyResult<()> {
        self.inner.next_token(token).map_err(to_py_err)
    }

    /// Score any buffered tokens.
    fn finish(&mut self) -> PyResult<()> {
        self.inner.finish().map_err(to_py_err)
    }

    /// Feed a token list, finish, and return all matches so far.
    fn match_tokens(&mut self, tokens: Vec<String>) -> PyResult<Vec<MatchTuple>> {
        self.inner
            .match_tokens(&tokens)
            .map(match_tuples)
            .map_err(to_py_err)
    }

    /// All matches as `(start, end, entity_id, probability)` tuples.
    fn get_matches(&self) -> Vec<MatchTuple> {
        match_tuples(self.inner.get_matches())
    }

    /// Spans of the matches scoring at least `threshold`.
    fn get_matches_above_threshold(&self, threshold: f64) -> PyResult<Vec<SpanTuple>> {
        self.inner
            .get_matches_above_threshold(threshold)
            .map(span_tuples)
            .map_err(to_py_err)
    }

    /// Forget the stream, including buffered tokens.
    fn reset(&mut self) {
        self.inner.reset();
    }

    /// Number of buffered tokens not yet scored.
    #[getter]
    fn pending_tokens(&self) -> usize {
        self.inner.pending_tokens()
    }

    fn __repr__(&self) -> String {
        format!(
            "EntityMatcherAddRemove(max_window={}, pending_tokens={})",
            self.inner.config().max_window,
            self.inner.pending_tokens()
        )
    }
}

/// Cost of pairing two optional `(start, end, entity_id)` spans.
///
/// Raises:
///     ValueError: If a span starts after it ends
#[pyfunction]
#[pyo3(signature = (a=None, b=None))]
pub fn error_pair(a: Option<SpanTuple>, b: Option<SpanTuple>) -> PyResult<usize> {
    let a = a.map(parse_span);
    let b = b.map(parse_span);
    core_error_pair(a.as_ref(), b.as_ref()).map_err(to_py_err)
}

/// Minimum total pairing cost between ground-truth and predicted spans.
///
/// Args:
///     ground_truth: List of `(start, end, entity_id)` tuples
///     predicted: List of `(start, end, entity_id)` tuples
///
/// Returns:
///     Minimum summed `error_pair` over all pairings
///
/// Raises:
///     ValueError: If a span starts after it ends
#[pyfunction]
pub fn calc_error(ground_truth: Vec<SpanTuple>, predicted: Vec<SpanTuple>) -> PyResult<usize> {
    core_calc_error(&parse_spans(ground_truth), &parse_spans(predicted)).map_err(to_py_err)
}

/// Batch `calc_error` over many documents in parallel.
///
/// Releases the GIL while documents are evaluated.
///
/// Args:
///     documents: List of `(ground_truth, predicted)` pairs of span lists
///
/// Returns:
///     One error per document
#[pyfunction]
pub fn calc_error_batch(
    py: Python<'_>,
    documents: Vec<(Vec<SpanTuple>, Vec<SpanTuple>)>,
) -> PyResult<Vec<usize>> {
    let documents: Vec<_> = documents
        .into_iter()
        .map(|(truth, predicted)| (parse_spans(truth), parse_spans(predicted)))
        .collect();
    py.allow_threads(|| core_calc_error_batch(&documents))
        .map_err(to_py_err)
}
