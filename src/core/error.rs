//! Error type shared by every component of the matching engine.
//!
//! Lookup misses (an unknown token or entity id) are not errors: they are
//! reported as `None` by the lookup queries. Everything here is either a
//! precondition violation at a call site or a consistency bug that must be
//! propagated to the caller.

use thiserror::Error;

use super::dictionary::DictionaryError;
use super::types::EntityId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MatchError>;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Token list must not be empty")]
    EmptyTokens,
    #[error("Entity id {0} was already added")]
    DuplicateEntity(EntityId),
    #[error("Entity id {entity_id} repeats token {token:?}")]
    DuplicateToken { entity_id: EntityId, token: String },
    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Window capacity must be positive, got {0}")]
    InvalidWindow(usize),
    #[error("Token {0:?} is not cached for the current window")]
    CacheMiss(String),
    #[error("Entity id {0} has no tokens in the lookup")]
    UnknownEntity(EntityId),
    #[error("Position finder failed: {0}")]
    PositionFinder(String),
    #[error("Dictionary error: {0}")]
    Dictionary(#[from] DictionaryError),
}

impl MatchError {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

/// Reject anything outside `[0, 1]`, NaN included.
pub(crate) fn check_probability(name: &'static str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(MatchError::InvalidProbability { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_probability_bounds() {
        assert_eq!(check_probability("p", 0.0).unwrap(), 0.0);
        assert_eq!(check_probability("p", 1.0).unwrap(), 1.0);
        assert!(check_probability("p", -0.01).is_err());
        assert!(check_probability("p", 1.01).is_err());
        assert!(check_probability("p", f64::NAN).is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = MatchError::InvalidProbability {
            name: "threshold",
            value: 2.0,
        };
        assert_eq!(
            err.to_string(),
            "threshold must be a probability in [0, 1], got 2"
        );
        assert_eq!(
            MatchError::CacheMiss("main".to_string()).to_string(),
            "Token \"main\" is not cached for the current window"
        );
    }
}
