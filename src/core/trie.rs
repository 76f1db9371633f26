//! Prefix tree over entity token sequences.
//!
//! Nodes live in an arena and refer to their children by index, so the tree
//! has a single owner and no reference cycles. A node may be terminal for one
//! entity while also being an interior node on the path of a longer one.

use rustc_hash::FxHashMap;

use super::lookup::Lookup;
use super::types::EntityId;

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: FxHashMap<String, NodeId>,
    entity_id: Option<EntityId>,
}

/// Result of walking a token path with [`Trie::has_tokens`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathInfo {
    /// Every token of the path was found.
    pub exists: bool,
    /// The final node has no children.
    pub is_leaf: bool,
    /// Entity terminating at the final node, if any.
    pub entity_id: Option<EntityId>,
}

impl PathInfo {
    const MISSING: Self = Self {
        exists: false,
        is_leaf: false,
        entity_id: None,
    };
}

#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<TrieNode>,
    max_depth: usize,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
            max_depth: 0,
        }
    }

    /// Build a trie holding every entity of `lookup`.
    ///
    /// Entities are inserted in ascending id order so that, when two entities
    /// share a token sequence, the smaller id owns the terminal node.
    pub fn from_lookup(lookup: &Lookup) -> Self {
        let mut entities: Vec<(EntityId, &[String])> = lookup.iter().collect();
        entities.sort_unstable_by_key(|(id, _)| *id);

        let mut trie = Self::new();
        for (entity_id, tokens) in entities {
            trie.add_tokens(tokens, Some(entity_id));
        }
        tracing::debug!(
            nodes = trie.len(),
            max_depth = trie.max_depth,
            "built entity trie"
        );
        trie
    }

    /// Walk or create the path for `tokens`, stamping `entity_id` on the last
    /// node when given.
    pub fn add_tokens<S: AsRef<str>>(&mut self, tokens: &[S], entity_id: Option<EntityId>) {
        let mut node = ROOT;
        for token in tokens {
            let token = token.as_ref();
            node = match self.nodes[node].children.get(token) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[node].children.insert(token.to_string(), child);
                    child
                }
            };
        }
        self.max_depth = self.max_depth.max(tokens.len());

        let Some(entity_id) = entity_id else {
            return;
        };
        match self.nodes[node].entity_id {
            None => self.nodes[node].entity_id = Some(entity_id),
            Some(existing) if existing != entity_id => {
                tracing::warn!(
                    existing,
                    ignored = entity_id,
                    "entities share a token sequence, keeping the first"
                );
            }
            Some(_) => {}
        }
    }

    /// Walk `tokens` from the root.
    pub fn has_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> PathInfo {
        let mut node = ROOT;
        for token in tokens {
            match self.nodes[node].children.get(token.as_ref()) {
                Some(&child) => node = child,
                None => return PathInfo::MISSING,
            }
        }
        let node = &self.nodes[node];
        PathInfo {
            exists: true,
            is_leaf: node.children.is_empty(),
            entity_id: node.entity_id,
        }
    }

    /// Length of the longest inserted path.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A trie with no paths holds only its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }
}
