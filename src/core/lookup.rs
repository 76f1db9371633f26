//! Bidirectional entity dictionary: token → entity ids, entity id → tokens.
//!
//! A lookup has two phases. During the load phase entities are added with
//! [`Lookup::add`]; afterwards it is shared read-only (usually behind an
//! `Arc`) by any number of matchers. Matchers only depend on the read side,
//! expressed by the [`EntityLookup`] trait, so a persistent backing store can
//! stand in for the in-memory [`Lookup`].

use std::borrow::Cow;

use rustc_hash::{FxHashMap, FxHashSet};

use super::error::{MatchError, Result};
use super::types::EntityId;

/// Read-only view of an entity dictionary.
pub trait EntityLookup {
    /// Ordered tokens of an entity, or `None` if the id is unknown.
    fn tokens_for_entity(&self, entity_id: EntityId) -> Option<Cow<'_, [String]>>;

    /// Ids of every entity containing `token`, or `None` if the token is unknown.
    fn entity_ids_for_token(&self, token: &str) -> Option<Cow<'_, FxHashSet<EntityId>>>;

    /// Largest entity id added, `None` for an empty lookup.
    fn max_entity_id(&self) -> Option<EntityId>;

    /// Length of the longest entity, 0 for an empty lookup.
    fn max_entity_len(&self) -> usize;

    fn num_tokens_for_entity(&self, entity_id: EntityId) -> Option<usize> {
        self.tokens_for_entity(entity_id).map(|tokens| tokens.len())
    }

    /// Entities containing every one of `tokens`.
    ///
    /// Returns `None` as soon as a token is unknown or the running
    /// intersection becomes empty.
    fn matching_entries<S: AsRef<str>>(&self, tokens: &[S]) -> Option<FxHashSet<EntityId>>
    where
        Self: Sized,
    {
        let (first, rest) = tokens.split_first()?;
        let mut common = self.entity_ids_for_token(first.as_ref())?.into_owned();
        for token in rest {
            if common.is_empty() {
                return None;
            }
            let ids = self.entity_ids_for_token(token.as_ref())?;
            common.retain(|id| ids.contains(id));
        }
        if common.is_empty() {
            None
        } else {
            Some(common)
        }
    }
}

/// In-memory entity dictionary.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    entities: FxHashMap<EntityId, Vec<String>>,
    token_index: FxHashMap<String, FxHashSet<EntityId>>,
    max_entity_id: Option<EntityId>,
    max_entity_len: usize,
}

impl Lookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a lookup from `(id, tokens)` pairs, failing on the first invalid entry.
    pub fn from_entities<I, T, S>(entities: I) -> Result<Self>
    where
        I: IntoIterator<Item = (EntityId, T)>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lookup = Self::new();
        for (entity_id, tokens) in entities {
            let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
            lookup.add(entity_id, tokens)?;
        }
        tracing::debug!(
            entities = lookup.len(),
            tokens = lookup.num_tokens(),
            max_entity_len = lookup.max_entity_len,
            "built entity lookup"
        );
        Ok(lookup)
    }

    /// Add an entity.
    ///
    /// # Errors
    /// Fails if the id is already present, the token list is empty, or a
    /// token is repeated within the entity. The lookup is unchanged on error.
    pub fn add(&mut self, entity_id: EntityId, tokens: Vec<String>) -> Result<()> {
        if tokens.is_empty() {
            return Err(MatchError::EmptyTokens);
        }
        if self.entities.contains_key(&entity_id) {
            return Err(MatchError::DuplicateEntity(entity_id));
        }
        let mut seen = FxHashSet::default();
        for token in &tokens {
            if token.is_empty() {
                return Err(MatchError::invalid_parameter(format!(
                    "entity {} contains an empty token",
                    entity_id
                )));
            }
            if !seen.insert(token.as_str()) {
                return Err(MatchError::DuplicateToken {
                    entity_id,
                    token: token.clone(),
                });
            }
        }

        for token in &tokens {
            self.token_index
                .entry(token.clone())
                .or_default()
                .insert(entity_id);
        }
        self.max_entity_len = self.max_entity_len.max(tokens.len());
        self.max_entity_id = Some(self.max_entity_id.map_or(entity_id, |m| m.max(entity_id)));
        self.entities.insert(entity_id, tokens);
        Ok(())
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of distinct tokens across all entities.
    pub fn num_tokens(&self) -> usize {
        self.token_index.len()
    }

    /// Iterate over `(id, tokens)` in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &[String])> {
        self.entities.iter().map(|(id, tokens)| (*id, tokens.as_slice()))
    }
}

impl EntityLookup for Lookup {
    fn tokens_for_entity(&self, entity_id: EntityId) -> Option<Cow<'_, [String]>> {
        self.entities
            .get(&entity_id)
            .map(|tokens| Cow::Borrowed(tokens.as_slice()))
    }

    fn entity_ids_for_token(&self, token: &str) -> Option<Cow<'_, FxHashSet<EntityId>>> {
        self.token_index.get(token).map(Cow::Borrowed)
    }

    fn max_entity_id(&self) -> Option<EntityId> {
        self.max_entity_id
    }

    fn max_entity_len(&self) -> usize {
        self.max_entity_len
    }
}
