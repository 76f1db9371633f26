//! Fixed-capacity sliding window over a token stream.

use std::collections::VecDeque;

use super::error::{MatchError, Result};

/// The most recent `capacity` tokens of a stream, with absolute positions.
///
/// # Example
///
/// ```
/// use entity_extraction::Window;
///
/// let mut window = Window::new(2).unwrap();
/// for token in ["a", "b", "c"] {
///     window.add_token(token);
/// }
/// let view = window.get_tokens().unwrap();
/// assert_eq!(view.tokens, ["b", "c"]);
/// assert_eq!((view.first_index, view.last_index), (1, 2));
/// ```
#[derive(Debug, Clone)]
pub struct Window {
    buffer: VecDeque<String>,
    capacity: usize,
    added: usize,
}

/// Borrowed view of a window's contents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowTokens<'a> {
    pub tokens: &'a [String],
    pub first_index: usize,
    pub last_index: usize,
}

impl Window {
    /// Create an empty window.
    ///
    /// # Errors
    /// Returns [`MatchError::InvalidWindow`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(MatchError::InvalidWindow(capacity));
        }
        Ok(Self {
            buffer: VecDeque::with_capacity(capacity + 1),
            capacity,
            added: 0,
        })
    }

    /// Append a token, evicting from the front once over capacity.
    pub fn add_token(&mut self, token: impl Into<String>) {
        self.added += 1;
        self.buffer.push_back(token.into());
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
        // Keep the ring contiguous so `get_tokens` can hand out one slice.
        self.buffer.make_contiguous();
    }

    /// A new empty window with the same capacity, for starting a fresh stream.
    pub fn cleared(&self) -> Self {
        Self {
            buffer: VecDeque::with_capacity(self.capacity + 1),
            capacity: self.capacity,
            added: 0,
        }
    }

    /// Current tokens plus the absolute indices of the first and last one.
    ///
    /// Returns `None` before the first token is added.
    pub fn get_tokens(&self) -> Option<WindowTokens<'_>> {
        let last_index = self.last_index()?;
        let (tokens, _) = self.buffer.as_slices();
        Some(WindowTokens {
            tokens,
            first_index: (last_index + 1).saturating_sub(tokens.len()),
            last_index,
        })
    }

    /// Absolute index of the most recently added token.
    pub fn last_index(&self) -> Option<usize> {
        self.added.checked_sub(1)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
