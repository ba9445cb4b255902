use std::sync::Arc;

use tracing::debug;

use crate::descriptor::ImageDescriptor;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// An ordered, immutable list of images produced by one enumeration pass.
///
/// Two collections are equal when they have the same length and the same
/// descriptor at every index. Order matters: the same images in a different
/// order are a different collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collection {
    items: Vec<ImageDescriptor>,
}

impl Collection {
    pub fn new(items: Vec<ImageDescriptor>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ImageDescriptor> {
        self.items.get(index)
    }

    /// Like [`get`](Self::get) but reports the collection length on failure.
    pub fn try_get(&self, index: usize) -> crate::Result<&ImageDescriptor> {
        self.items.get(index).ok_or(CoreError::IndexOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageDescriptor> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[ImageDescriptor] {
        &self.items
    }
}

impl FromIterator<ImageDescriptor> for Collection {
    fn from_iter<I: IntoIterator<Item = ImageDescriptor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a ImageDescriptor;
    type IntoIter = std::slice::Iter<'a, ImageDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// Published state
// ---------------------------------------------------------------------------

/// The currently published collection plus its generation token.
///
/// The generation advances only when a different collection is swapped in,
/// so a background result can tell whether the dataset it was started
/// against is still the live one by comparing a single integer.
#[derive(Debug, Clone)]
pub struct CollectionState {
    current: Arc<Collection>,
    generation: u64,
}

impl CollectionState {
    pub fn new(initial: Collection) -> Self {
        Self {
            current: Arc::new(initial),
            generation: 1,
        }
    }

    pub fn current(&self) -> &Arc<Collection> {
        &self.current
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Swap in `next` if it differs from the current collection.
    ///
    /// Returns `true` when the collection changed (and the generation moved).
    pub fn replace_if_changed(&mut self, next: Collection) -> bool {
        if *self.current == next {
            debug!(generation = self.generation, len = next.len(), "Collection unchanged");
            return false;
        }
        self.current = Arc::new(next);
        self.generation += 1;
        debug!(
            generation = self.generation,
            len = self.current.len(),
            "Collection replaced"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(paths: &[(&str, i32)]) -> Collection {
        paths
            .iter()
            .map(|&(p, o)| ImageDescriptor::new(p, o))
            .collect()
    }

    #[test]
    fn equality_is_ordered_and_elementwise() {
        let a = sample(&[("/a.jpg", 0), ("/b.jpg", 90)]);
        let b = sample(&[("/a.jpg", 0), ("/b.jpg", 90)]);
        let reordered = sample(&[("/b.jpg", 90), ("/a.jpg", 0)]);
        let rotated = sample(&[("/a.jpg", 0), ("/b.jpg", 180)]);
        let shorter = sample(&[("/a.jpg", 0)]);

        assert_eq!(a, a, "reflexive");
        assert_eq!(a, b);
        assert_eq!(b, a, "symmetric");
        assert_ne!(a, reordered);
        assert_ne!(a, rotated);
        assert_ne!(a, shorter);
        assert_ne!(shorter, a);
    }

    #[test]
    fn empty_collections_are_equal() {
        assert_eq!(Collection::empty(), sample(&[]));
        assert!(Collection::empty().is_empty());
    }

    #[test]
    fn try_get_reports_length() {
        let c = sample(&[("/a.jpg", 0)]);
        assert_eq!(c.try_get(0).unwrap().path.to_str(), Some("/a.jpg"));
        match c.try_get(3) {
            Err(CoreError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 3);
                assert_eq!(len, 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn identical_replacement_keeps_generation() {
        let mut state = CollectionState::new(sample(&[("/a.jpg", 0)]));
        let before = state.generation();
        let previous = Arc::clone(state.current());

        assert!(!state.replace_if_changed(sample(&[("/a.jpg", 0)])));
        assert_eq!(state.generation(), before);
        assert!(Arc::ptr_eq(&previous, state.current()));
    }

    #[test]
    fn different_replacement_advances_generation() {
        let mut state = CollectionState::new(sample(&[("/a.jpg", 0)]));
        let before = state.generation();

        assert!(state.replace_if_changed(sample(&[("/new.jpg", 0), ("/a.jpg", 0)])));
        assert_eq!(state.generation(), before + 1);
        assert_eq!(state.current().len(), 2);
    }
}
