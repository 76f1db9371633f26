//! Matcher configuration.
//!
//! Both config types deserialize from partial JSON documents: any field that
//! is left out keeps its default.
//!
//! ```
//! use entity_extraction::MatcherConfig;
//!
//! let config = MatcherConfig::from_json(r#"{"threshold": 0.7}"#).unwrap();
//! assert_eq!(config.threshold, 0.7);
//! assert_eq!(config.min_tokens, 1);
//! ```

use serde::{Deserialize, Serialize};

use super::cache::DEFAULT_MEMO_CAPACITY;
use super::error::{check_probability, MatchError, Result};

/// Largest number of token positions the position finder accepts per segment.
pub const MAX_SEGMENT_POSITIONS: usize = 255;

/// Settings shared by the window-based matchers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Matches scoring below this probability are dropped.
    pub threshold: f64,
    /// Shortest window suffix considered as a candidate occurrence.
    pub min_tokens: usize,
    /// Capacity of the memo behind `TokenToEntitiesCache::entities_in_common`.
    pub memo_capacity: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_tokens: 1,
            memo_capacity: DEFAULT_MEMO_CAPACITY,
        }
    }
}

impl MatcherConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MatchError::invalid_parameter(format!("matcher config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_probability("threshold", self.threshold)?;
        if self.min_tokens == 0 {
            return Err(MatchError::invalid_parameter("min_tokens must be positive"));
        }
        if self.memo_capacity == 0 {
            return Err(MatchError::invalid_parameter("memo_capacity must be positive"));
        }
        Ok(())
    }
}

/// Settings for [`EntityMatcherAddRemove`](crate::EntityMatcherAddRemove).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddRemoveConfig {
    /// Matches scoring below this probability are dropped.
    pub threshold: f64,
    /// Narrowest window, in tokens, scored against an entity.
    pub min_window: usize,
    /// Widest window; at most [`MAX_SEGMENT_POSITIONS`].
    pub max_window: usize,
    /// Entities referenced fewer times than this within a segment are skipped.
    pub min_count: usize,
}

impl Default for AddRemoveConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_window: 1,
            max_window: 8,
            min_count: 1,
        }
    }
}

impl AddRemoveConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MatchError::invalid_parameter(format!("add/remove config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_probability("threshold", self.threshold)?;
        if self.min_window == 0 || self.min_window > self.max_window {
            return Err(MatchError::invalid_parameter(format!(
                "window bounds must satisfy 1 <= min_window <= max_window, got {}..={}",
                self.min_window, self.max_window
            )));
        }
        if self.max_window > MAX_SEGMENT_POSITIONS {
            return Err(MatchError::invalid_parameter(format!(
                "max_window must not exceed {} positions, got {}",
                MAX_SEGMENT_POSITIONS, self.max_window
            )));
        }
        if self.min_count == 0 {
            return Err(MatchError::invalid_parameter("min_count must be positive"));
        }
        Ok(())
    }
}
