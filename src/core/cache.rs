//! Per-window cache of token → candidate entity ids.
//!
//! The cache holds one entry per token the caller declared as needed via
//! [`TokenToEntitiesCache::retain`]. Queries for tokens outside that set fail
//! with [`MatchError::CacheMiss`] instead of returning an empty set, so a
//! matcher that forgets to refresh the cache is caught immediately.
//!
//! Intersections are memoized by the exact token sequence queried in a
//! bounded LRU map owned by the cache. Re-adding a token with different
//! entity ids drops every memoized intersection that token took part in.

use std::collections::hash_map::Entry;
use std::num::NonZeroUsize;

use lru::LruCache;
use rustc_hash::{FxHashMap, FxHashSet};

use super::error::{MatchError, Result};
use super::types::EntityId;

/// Default number of memoized intersections.
pub const DEFAULT_MEMO_CAPACITY: usize = 4096;

/// Entity ids a token had when memoized intersections were computed from it.
struct MemoSource {
    entity_ids: Option<FxHashSet<EntityId>>,
    /// Live memo keys mentioning the token.
    keys: usize,
}

pub struct TokenToEntitiesCache {
    entries: FxHashMap<String, Option<FxHashSet<EntityId>>>,
    memo: LruCache<Vec<String>, FxHashSet<EntityId>>,
    memo_sources: FxHashMap<String, MemoSource>,
}

/// Tokens of `key` without repeats.
fn distinct(key: &[String]) -> impl Iterator<Item = &String> {
    let mut seen = FxHashSet::default();
    key.iter().filter(move |token| seen.insert(token.as_str()))
}

impl TokenToEntitiesCache {
    pub fn new() -> Self {
        // DEFAULT_MEMO_CAPACITY is a non-zero constant.
        Self {
            entries: FxHashMap::default(),
            memo: LruCache::new(NonZeroUsize::MIN.saturating_add(DEFAULT_MEMO_CAPACITY - 1)),
            memo_sources: FxHashMap::default(),
        }
    }

    /// Create a cache with a custom memo capacity.
    ///
    /// # Errors
    /// Returns [`MatchError::InvalidParameter`] if `memo_capacity` is zero.
    pub fn with_memo_capacity(memo_capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(memo_capacity)
            .ok_or_else(|| MatchError::invalid_parameter("memo capacity must be positive"))?;
        Ok(Self {
            entries: FxHashMap::default(),
            memo: LruCache::new(capacity),
            memo_sources: FxHashMap::default(),
        })
    }

    /// Cache the entity ids of `token`; `None` records a token with no entities.
    ///
    /// Memoized intersections computed from a different set of ids for the
    /// same token, even one evicted since, are discarded.
    pub fn add(&mut self, token: impl Into<String>, entity_ids: Option<FxHashSet<EntityId>>) {
        let token = token.into();
        let changed = self
            .memo_sources
            .get(&token)
            .is_some_and(|source| source.entity_ids != entity_ids);
        if changed {
            tracing::debug!(token = %token, "entity ids changed, dropping memoized intersections");
            self.forget(&token);
        }
        self.entries.insert(token, entity_ids);
    }

    /// Drop every memo key mentioning `token`.
    fn forget(&mut self, token: &str) {
        let stale: Vec<Vec<String>> = self
            .memo
            .iter()
            .filter(|(key, _)| key.iter().any(|t| t == token))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            self.memo.pop(&key);
            self.release(&key);
        }
    }

    fn release(&mut self, key: &[String]) {
        for token in distinct(key) {
            if let Some(source) = self.memo_sources.get_mut(token) {
                source.keys = source.keys.saturating_sub(1);
                if source.keys == 0 {
                    self.memo_sources.remove(token);
                }
            }
        }
    }

    /// Evict every cached token not in `tokens`.
    pub fn retain<S: AsRef<str>>(&mut self, tokens: &[S]) {
        let keep: FxHashSet<&str> = tokens.iter().map(AsRef::as_ref).collect();
        self.entries.retain(|token, _| keep.contains(token.as_str()));
    }

    /// Tokens of `tokens` that are not cached yet, deduplicated, in order.
    pub fn required<'a, S: AsRef<str>>(&self, tokens: &'a [S]) -> Vec<&'a str> {
        let mut seen = FxHashSet::default();
        tokens
            .iter()
            .map(AsRef::as_ref)
            .filter(|token| !self.entries.contains_key(*token) && seen.insert(*token))
            .collect()
    }

    /// Entity ids shared by all of `tokens`.
    ///
    /// # Errors
    /// Returns [`MatchError::CacheMiss`] for the first token that is not cached.
    pub fn entities_in_common<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<FxHashSet<EntityId>> {
        // Presence is checked before the memo so an evicted token still fails.
        let mut sets = Vec::with_capacity(tokens.len());
        for token in tokens {
            let token = token.as_ref();
            let entry = self
                .entries
                .get(token)
                .ok_or_else(|| MatchError::CacheMiss(token.to_string()))?;
            sets.push(entry.as_ref());
        }

        let key: Vec<String> = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        if let Some(common) = self.memo.get(&key) {
            return Ok(common.clone());
        }

        let mut common: Option<FxHashSet<EntityId>> = None;
        for set in sets {
            let Some(set) = set else {
                common = Some(FxHashSet::default());
                break;
            };
            let next = match common {
                None => set.clone(),
                Some(mut running) => {
                    running.retain(|id| set.contains(id));
                    running
                }
            };
            let exhausted = next.is_empty();
            common = Some(next);
            if exhausted {
                break;
            }
        }
        let common = common.unwrap_or_default();

        for token in distinct(&key) {
            match self.memo_sources.entry(token.clone()) {
                Entry::Occupied(mut source) => source.get_mut().keys += 1,
                Entry::Vacant(slot) => {
                    slot.insert(MemoSource {
                        entity_ids: self.entries.get(token.as_str()).cloned().unwrap_or_default(),
                        keys: 1,
                    });
                }
            }
        }
        if let Some((evicted, _)) = self.memo.push(key, common.clone()) {
            self.release(&evicted);
        }
        Ok(common)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Number of cached tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of memoized intersections.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Drop all entries and memoized results.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.memo.clear();
        self.memo_sources.clear();
    }
}

impl Default for TokenToEntitiesCache {
    fn default() -> Self {
        Self::new()
    }
}
