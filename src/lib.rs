pub mod core;
#[cfg(feature = "python")]
mod python;

pub use crate::core::{
    calc_error, calc_error_batch, calc_error_exhaustive, correct_sequence, error_pair,
    load_entities, load_entities_file, AddRemoveConfig, AddRemoveLikelihood, DictionaryError,
    EntityId, EntityLookup, EntityMatcher, EntityMatcherAddRemove, EntityPositions, EntitySpan,
    ExactEntityMatcher, GenericEntityMatcher, Likelihood, LikelihoodModel, LogisticLikelihood,
    Lookup, MatchError, MatcherConfig, MissingTokenEntityMatcher, MissingTokenLikelihood,
    PiecewiseAddRemoveLikelihood, PiecewiseLinear, PositionFinder, ProbabilisticMatch,
    SegmentPositionFinder, TokenToEntitiesCache, Trie, Window,
};
