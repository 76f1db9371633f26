//! Core fuzzy entity-extraction engine.
//!
//! Entities are fixed token sequences held in a [`Lookup`]. A matcher consumes
//! a token stream one token at a time and reports [`ProbabilisticMatch`]es:
//! spans of the stream that probably refer to an entity, even when tokens are
//! missing, reordered around, or interleaved with noise.
//!
//! # Architecture
//!
//! - [`Lookup`]: entity id to tokens and token to entity ids, built once and
//!   shared read-only behind an `Arc`
//! - [`Window`]: the last few tokens of the stream with absolute positions
//! - [`Trie`] and [`ExactEntityMatcher`]: exact matching of token sequences
//! - [`TokenToEntitiesCache`]: per-window candidate sets with an LRU memo of
//!   their intersections
//! - [`likelihood`]: probability models for partial occurrences
//! - [`GenericEntityMatcher`], [`MissingTokenEntityMatcher`]: window-based
//!   fuzzy matchers
//! - [`EntityMatcherAddRemove`]: segment-based matcher tolerating inserted and
//!   deleted tokens, driven by a [`PositionFinder`]
//! - [`evaluator`]: span error between predictions and ground truth

mod add_remove;
mod cache;
mod config;
mod dictionary;
mod error;
pub mod evaluator;
pub mod likelihood;
mod lookup;
mod matcher;
mod trie;
mod types;
mod window;

pub use add_remove::{
    encode_candidates, EntityMatcherAddRemove, EntityPositions, PositionFinder,
    SegmentPositionFinder,
};
pub use cache::{TokenToEntitiesCache, DEFAULT_MEMO_CAPACITY};
pub use config::{AddRemoveConfig, MatcherConfig, MAX_SEGMENT_POSITIONS};
pub use dictionary::{load_entities, load_entities_file, DictionaryError};
pub use error::{MatchError, Result};
pub use evaluator::{calc_error, calc_error_batch, calc_error_exhaustive, error_pair};
pub use likelihood::{
    AddRemoveLikelihood, Likelihood, LikelihoodModel, LogisticLikelihood, MissingTokenLikelihood,
    Overlap, PiecewiseAddRemoveLikelihood, PiecewiseLinear,
};
pub use lookup::{EntityLookup, Lookup};
pub use matcher::{
    correct_sequence, EntityMatcher, ExactEntityMatcher, GenericEntityMatcher,
    MissingTokenEntityMatcher,
};
pub use trie::{PathInfo, Trie};
pub use types::{EntityId, EntitySpan, ProbabilisticMatch, PROBABILITY_TOLERANCE};
pub use window::{Window, WindowTokens};
