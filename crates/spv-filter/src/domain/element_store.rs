//! Static element store
//!
//! Owned copies of every raw element added to the manager, kept in insertion
//! order so any rebuilt filter can be replayed from scratch.

/// Append-only list of static elements
///
/// Duplicates are kept; the filter treats them as separate insertions.
#[derive(Clone, Debug, Default)]
pub struct ElementStore {
    elements: Vec<Vec<u8>>,
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `element` into the store and return the stored copy
    pub fn push(&mut self, element: &[u8]) -> &[u8] {
        self.elements.push(element.to_vec());
        &self.elements[self.elements.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.elements.iter().map(Vec::as_slice)
    }

    /// Elements appended at or after position `index`
    pub fn since(&self, index: usize) -> impl Iterator<Item = &[u8]> {
        self.elements
            .get(index..)
            .unwrap_or_default()
            .iter()
            .map(Vec::as_slice)
    }
}
