//! Small helpers shared across the crate.

// ============================================================================
// INDEXING
// ============================================================================

/// Turns a possibly negative index into a position within `len` items.
///
/// Negative indexes count from the end, so `-1` is the last item. Returns
/// `None` when the index falls outside the collection.
pub fn normalise_index(index: isize, len: usize) -> Option<usize> {
    if index >= 0 {
        let index = index.unsigned_abs();
        return (index < len).then_some(index);
    }
    len.checked_sub(index.unsigned_abs())
}

// ============================================================================
// SLICES
// ============================================================================

/// Concatenates slices into a new vector, keeping the given order.
pub fn merge<T: Clone>(slices: &[&[T]]) -> Vec<T> {
    let total = slices.iter().map(|s| s.len()).sum();
    let mut out = Vec::with_capacity(total);
    for slice in slices {
        out.extend_from_slice(slice);
    }
    out
}

// ============================================================================
// STACK
// ============================================================================

/// A LIFO stack over a `Vec`, with bottom-to-top slice access.
#[derive(Debug, Clone)]
pub struct Stack<T> {
    items: Vec<T>,
}

impl<T> Stack<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Top of the stack.
    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    /// Item at `index` from the bottom; negative indexes count from the top.
    pub fn peek_at(&self, index: isize) -> Option<&T> {
        normalise_index(index, self.items.len()).and_then(|i| self.items.get(i))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items from bottom to top.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Items from top to bottom.
    pub fn iter_from_top(&self) -> impl Iterator<Item = &T> {
        self.items.iter().rev()
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}
