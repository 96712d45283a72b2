//! Sorted set / map over a [`BlobVector`] of key-value pairs.
//!
//! # Invariants
//!
//! - Keys are strictly increasing under the set's [`KeyOrder`].
//! - `insert` never overwrites: an existing key makes it return `false`.

use std::cmp::Ordering;
use std::marker::PhantomData;

use super::{BlobVector, Container, Element, KeyOrder, NumericOrder, Pair};
use crate::storage::{BlobError, BlobStore, Identifier};

/// A sorted set of keys `K`, each carrying a value `V`, ordered by `O`.
///
/// With the default `V = ()` this is a plain set.
#[derive(Debug)]
pub struct BlobSet<K, V = (), O = NumericOrder> {
    entries: BlobVector<Pair<K, V>>,
    marker: PhantomData<fn() -> O>,
}

impl<K, V, O> Clone for BlobSet<K, V, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V, O> Copy for BlobSet<K, V, O> {}

impl<K, V, O> PartialEq for BlobSet<K, V, O> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K, V, O> Eq for BlobSet<K, V, O> {}

impl<K: Element, V: Element, O: KeyOrder<K>> BlobSet<K, V, O> {
    #[must_use]
    pub fn create(store: &mut BlobStore) -> Self {
        Self::from_identifier(store.create_identifier())
    }

    #[must_use]
    pub const fn from_identifier(id: Identifier) -> Self {
        Self {
            entries: BlobVector::from_identifier(id),
            marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn identifier(&self) -> Identifier {
        self.entries.identifier()
    }

    pub fn len(&self, store: &BlobStore) -> Result<usize, BlobError> {
        self.entries.len(store)
    }

    pub fn is_empty(&self, store: &BlobStore) -> Result<bool, BlobError> {
        self.entries.is_empty(store)
    }

    /// Binary search for `key`: `Ok(index)` if present, otherwise
    /// `Err(index)` where it would be inserted.
    pub fn locate(&self, store: &BlobStore, key: &K) -> Result<Result<usize, usize>, BlobError> {
        let mut low = 0;
        let mut high = self.len(store)?;
        while low < high {
            let mid = low + (high - low) / 2;
            let candidate = self.key_at(store, mid)?;
            match O::compare(store, &candidate, key)? {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
                Ordering::Equal => return Ok(Ok(mid)),
            }
        }
        Ok(Err(low))
    }

    /// Index of `key`, if present.
    pub fn find(&self, store: &BlobStore, key: &K) -> Result<Option<usize>, BlobError> {
        Ok(self.locate(store, key)?.ok())
    }

    /// Value stored under `key`, if present.
    pub fn get(&self, store: &BlobStore, key: &K) -> Result<Option<V>, BlobError> {
        match self.find(store, key)? {
            Some(index) => Ok(Some(self.value_at(store, index)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, store: &BlobStore, key: &K) -> Result<bool, BlobError> {
        Ok(self.find(store, key)?.is_some())
    }

    /// Insert `key` with `value`. Returns `false` and leaves the set
    /// unchanged if the key is already present.
    pub fn insert(&self, store: &mut BlobStore, key: K, value: V) -> Result<bool, BlobError> {
        match self.locate(store, &key)? {
            Ok(_) => Ok(false),
            Err(index) => {
                self.entries.insert_at(store, index, Pair { key, value })?;
                Ok(true)
            }
        }
    }

    /// Remove `key`. Returns `false` if it was absent.
    pub fn erase(&self, store: &mut BlobStore, key: &K) -> Result<bool, BlobError> {
        match self.locate(store, key)? {
            Ok(index) => {
                self.entries.erase_at(store, index)?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Remove the entry at `index` without searching for it.
    pub fn remove_at(&self, store: &mut BlobStore, index: usize) -> Result<(), BlobError> {
        self.entries.erase_at(store, index)
    }

    pub fn entry_at(&self, store: &BlobStore, index: usize) -> Result<Pair<K, V>, BlobError> {
        self.entries.read_at(store, index)
    }

    pub fn key_at(&self, store: &BlobStore, index: usize) -> Result<K, BlobError> {
        Ok(self.entry_at(store, index)?.key)
    }

    pub fn value_at(&self, store: &BlobStore, index: usize) -> Result<V, BlobError> {
        Ok(self.entry_at(store, index)?.value)
    }

    /// Replace the value at `index` without touching its key.
    pub fn set_value_at(&self, store: &mut BlobStore, index: usize, value: V) -> Result<(), BlobError> {
        let key = self.key_at(store, index)?;
        self.entries.write_at(store, index, Pair { key, value })
    }

    /// Copy every key out, in order.
    pub fn keys(&self, store: &BlobStore) -> Result<Vec<K>, BlobError> {
        let len = self.len(store)?;
        (0..len).map(|i| self.key_at(store, i)).collect()
    }

    /// Copy every entry out, in order.
    pub fn entries(&self, store: &BlobStore) -> Result<Vec<Pair<K, V>>, BlobError> {
        self.entries.to_vec(store)
    }

    /// Free the backing blob. Nested containers held as values are not
    /// released.
    pub fn release(self, store: &mut BlobStore) -> Result<(), BlobError> {
        self.entries.release(store)
    }
}

impl<K: Element, V: Element, O: KeyOrder<K>> Container for BlobSet<K, V, O> {
    fn create(store: &mut BlobStore) -> Self {
        Self::create(store)
    }

    fn release(self, store: &mut BlobStore) -> Result<(), BlobError> {
        Self::release(self, store)
    }
}
