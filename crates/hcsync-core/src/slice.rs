//! Slice helpers

use std::collections::HashSet;
use std::hash::Hash;

/// Split `items` into owned chunks of at most `size` elements.
/// A `size` of zero yields a single chunk.
pub fn split<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    if size == 0 {
        return vec![items.to_vec()];
    }
    items.chunks(size).map(<[T]>::to_vec).collect()
}

/// Remove duplicates, keeping the first occurrence of each element
pub fn unique<T: Eq + Hash + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
