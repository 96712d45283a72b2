//! Sorted containers stored entirely inside blobs.
//!
//! A container is a blob holding a packed array of fixed-width elements.
//! [`BlobVector`] gives indexed access; [`BlobSet`] keeps the array sorted by
//! key and binary-searches it. Values may themselves be container handles, so
//! multi-level indices are built by nesting sets.
//!
//! # Design
//!
//! Handles are `Copy` and own nothing on the Rust heap: all state lives in the
//! [`BlobStore`], which every method borrows explicitly. Dropping a handle
//! does not free its blob; call `release`, or use [`scoped`] for temporaries.

use std::cmp::Ordering;

use crate::storage::{BlobError, BlobStore};

mod set;
mod vector;

pub use set::BlobSet;
pub use vector::BlobVector;

/// Widest element a container can hold, in words.
pub const MAX_ELEMENT_WORDS: usize = 8;

/// A fixed-width value that can be packed into container storage.
pub trait Element: Copy {
    /// Encoded width in words. Must not exceed [`MAX_ELEMENT_WORDS`].
    const WORDS: usize;

    /// Encode into exactly `WORDS` words.
    fn store(&self, out: &mut [u64]);

    /// Decode from exactly `WORDS` words.
    fn load(words: &[u64]) -> Self;
}

impl Element for u64 {
    const WORDS: usize = 1;

    fn store(&self, out: &mut [u64]) {
        out[0] = *self;
    }

    fn load(words: &[u64]) -> Self {
        words[0]
    }
}

impl Element for () {
    const WORDS: usize = 0;

    fn store(&self, _out: &mut [u64]) {}

    fn load(_words: &[u64]) -> Self {}
}

/// Key and value packed side by side; the element type of a [`BlobSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair<K, V> {
    pub key: K,
    pub value: V,
}

impl<K: Element, V: Element> Element for Pair<K, V> {
    const WORDS: usize = K::WORDS + V::WORDS;

    fn store(&self, out: &mut [u64]) {
        let (key, value) = out.split_at_mut(K::WORDS);
        self.key.store(key);
        self.value.store(value);
    }

    fn load(words: &[u64]) -> Self {
        let (key, value) = words.split_at(K::WORDS);
        Self {
            key: K::load(key),
            value: V::load(value),
        }
    }
}

/// Total order used to sort a set's keys.
pub trait KeyOrder<K> {
    /// Compare two keys; may consult the store for content-ordered keys.
    fn compare(store: &BlobStore, a: &K, b: &K) -> Result<Ordering, BlobError>;
}

/// Orders keys by their own `Ord` implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericOrder;

impl<K: Ord> KeyOrder<K> for NumericOrder {
    fn compare(_store: &BlobStore, a: &K, b: &K) -> Result<Ordering, BlobError> {
        Ok(a.cmp(b))
    }
}

/// Orders identifier keys by the content of the blobs they name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentOrder;

impl KeyOrder<u64> for ContentOrder {
    fn compare(store: &BlobStore, a: &u64, b: &u64) -> Result<Ordering, BlobError> {
        store.compare(*a, *b)
    }
}

/// A handle to a container that owns a blob.
pub trait Container: Copy {
    /// Allocate an empty container.
    fn create(store: &mut BlobStore) -> Self;

    /// Free the container's blob. The handle must not be used afterwards.
    fn release(self, store: &mut BlobStore) -> Result<(), BlobError>;
}

/// Run `body` with a temporary container that is released afterwards, even
/// when `body` fails.
pub fn scoped<C, R, E>(
    store: &mut BlobStore,
    body: impl FnOnce(&mut BlobStore, C) -> Result<R, E>,
) -> Result<R, E>
where
    C: Container,
    E: From<BlobError>,
{
    let container = C::create(store);
    let result = body(store, container);
    let released = container.release(store);
    let value = result?;
    released?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PageSpace;

    #[test]
    fn test_pair_layout() {
        let pair = Pair {
            key: 7u64,
            value: 9u64,
        };
        let mut words = [0u64; 2];
        pair.store(&mut words);
        assert_eq!(words, [7, 9]);
        assert_eq!(Pair::<u64, u64>::load(&words), pair);
        assert_eq!(<Pair<u64, ()>>::WORDS, 1);
    }

    #[test]
    fn test_scoped_releases_on_error() {
        let mut store = BlobStore::new(PageSpace::in_memory(64));
        let mut seen = None;

        let result: Result<(), BlobError> =
            scoped(&mut store, |store, vector: BlobVector<u64>| {
                vector.push_back(store, 1)?;
                seen = Some(vector.identifier());
                Err(BlobError::NonexistentBlob(999))
            });

        assert!(matches!(result, Err(BlobError::NonexistentBlob(999))));
        let id = seen.expect("body ran");
        assert!(!store.is_live(id));
    }

    #[test]
    fn test_scoped_returns_value() {
        let mut store = BlobStore::new(PageSpace::in_memory(64));
        let total = scoped(&mut store, |store, set: BlobSet<u64>| {
            for key in [5, 3, 5, 1] {
                set.insert(store, key, ())?;
            }
            set.len(store)
        })
        .expect("scoped");
        assert_eq!(total, 3);
        assert_eq!(store.live_count(), 0);
    }
}
