//! Packed array of fixed-width elements inside one blob.

// Element counts and widths are tiny compared to the u64 bit range.
#![allow(clippy::cast_possible_truncation)]

use std::marker::PhantomData;

use super::{Container, Element, MAX_ELEMENT_WORDS};
use crate::storage::bits::WORD_BITS;
use crate::storage::{BlobError, BlobStore, Identifier};

/// A growable array of `T` stored in a blob.
#[derive(Debug)]
pub struct BlobVector<T> {
    id: Identifier,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for BlobVector<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BlobVector<T> {}

impl<T> PartialEq for BlobVector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for BlobVector<T> {}

impl<T: Element> BlobVector<T> {
    const ELEMENT_BITS: u64 = T::WORDS as u64 * WORD_BITS;

    /// Allocate an empty vector.
    #[must_use]
    pub fn create(store: &mut BlobStore) -> Self {
        Self::from_identifier(store.create_identifier())
    }

    /// Wrap an existing blob.
    #[must_use]
    pub const fn from_identifier(id: Identifier) -> Self {
        Self {
            id,
            marker: PhantomData,
        }
    }

    /// The backing blob.
    #[must_use]
    pub const fn identifier(&self) -> Identifier {
        self.id
    }

    /// Number of elements.
    pub fn len(&self, store: &BlobStore) -> Result<usize, BlobError> {
        let bits = store.size(self.id)?;
        if Self::ELEMENT_BITS == 0 {
            return Ok(0);
        }
        Ok((bits / Self::ELEMENT_BITS) as usize)
    }

    pub fn is_empty(&self, store: &BlobStore) -> Result<bool, BlobError> {
        Ok(store.size(self.id)? == 0)
    }

    const fn offset(index: usize) -> u64 {
        index as u64 * Self::ELEMENT_BITS
    }

    pub fn read_at(&self, store: &BlobStore, index: usize) -> Result<T, BlobError> {
        let mut buf = [0u64; MAX_ELEMENT_WORDS];
        let words = &mut buf[..T::WORDS];
        store.read_words(self.id, Self::offset(index), words)?;
        Ok(T::load(words))
    }

    pub fn write_at(&self, store: &mut BlobStore, index: usize, value: T) -> Result<(), BlobError> {
        let mut buf = [0u64; MAX_ELEMENT_WORDS];
        let words = &mut buf[..T::WORDS];
        value.store(words);
        store.write_words(self.id, Self::offset(index), words)
    }

    /// Insert `value` before `index`, shifting later elements up.
    pub fn insert_at(&self, store: &mut BlobStore, index: usize, value: T) -> Result<(), BlobError> {
        store.insert(self.id, Self::offset(index), Self::ELEMENT_BITS)?;
        self.write_at(store, index, value)
    }

    /// Remove the element at `index`, shifting later elements down.
    pub fn erase_at(&self, store: &mut BlobStore, index: usize) -> Result<(), BlobError> {
        store.erase(self.id, Self::offset(index), Self::ELEMENT_BITS)
    }

    pub fn push_back(&self, store: &mut BlobStore, value: T) -> Result<(), BlobError> {
        let len = self.len(store)?;
        self.insert_at(store, len, value)
    }

    pub fn pop_back(&self, store: &mut BlobStore) -> Result<Option<T>, BlobError> {
        let len = self.len(store)?;
        if len == 0 {
            return Ok(None);
        }
        let value = self.read_at(store, len - 1)?;
        self.erase_at(store, len - 1)?;
        Ok(Some(value))
    }

    /// Remove every element, freeing the storage but keeping the identifier.
    pub fn clear(&self, store: &mut BlobStore) -> Result<(), BlobError> {
        store.set_size(self.id, 0, 0)
    }

    /// Copy every element out.
    pub fn to_vec(&self, store: &BlobStore) -> Result<Vec<T>, BlobError> {
        let len = self.len(store)?;
        (0..len).map(|i| self.read_at(store, i)).collect()
    }

    /// Free the backing blob.
    pub fn release(self, store: &mut BlobStore) -> Result<(), BlobError> {
        store.release_identifier(self.id)
    }
}

impl<T: Element> Container for BlobVector<T> {
    fn create(store: &mut BlobStore) -> Self {
        Self::create(store)
    }

    fn release(self, store: &mut BlobStore) -> Result<(), BlobError> {
        Self::release(self, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::Pair;
    use crate::storage::PageSpace;

    fn new_store() -> BlobStore {
        BlobStore::new(PageSpace::in_memory(256))
    }

    #[test]
    fn test_push_pop() {
        let mut store = new_store();
        let vector = BlobVector::<u64>::create(&mut store);
        assert!(vector.is_empty(&store).expect("is_empty"));

        for value in 10..20 {
            vector.push_back(&mut store, value).expect("push");
        }
        assert_eq!(vector.len(&store).expect("len"), 10);
        assert_eq!(vector.read_at(&store, 3).expect("read"), 13);

        assert_eq!(vector.pop_back(&mut store).expect("pop"), Some(19));
        assert_eq!(vector.len(&store).expect("len"), 9);
    }

    #[test]
    fn test_pop_empty() {
        let mut store = new_store();
        let vector = BlobVector::<u64>::create(&mut store);
        assert_eq!(vector.pop_back(&mut store).expect("pop"), None);
    }

    #[test]
    fn test_insert_and_erase_shift_elements() {
        let mut store = new_store();
        let vector = BlobVector::<u64>::create(&mut store);
        for value in [1, 2, 4, 5] {
            vector.push_back(&mut store, value).expect("push");
        }

        vector.insert_at(&mut store, 2, 3).expect("insert");
        assert_eq!(vector.to_vec(&store).expect("to_vec"), vec![1, 2, 3, 4, 5]);

        vector.erase_at(&mut store, 0).expect("erase");
        vector.erase_at(&mut store, 3).expect("erase");
        assert_eq!(vector.to_vec(&store).expect("to_vec"), vec![2, 3, 4]);
    }

    #[test]
    fn test_multi_word_elements() {
        let mut store = new_store();
        let vector = BlobVector::<Pair<u64, u64>>::create(&mut store);
        for i in 0..100 {
            vector
                .push_back(&mut store, Pair { key: i, value: i * i })
                .expect("push");
        }
        let pair = vector.read_at(&store, 42).expect("read");
        assert_eq!(pair, Pair { key: 42, value: 1764 });

        vector
            .write_at(&mut store, 42, Pair { key: 0, value: 0 })
            .expect("write");
        assert_eq!(vector.read_at(&store, 42).expect("read").value, 0);
        assert_eq!(vector.read_at(&store, 43).expect("read").key, 43);
    }

    #[test]
    fn test_out_of_range_access() {
        let mut store = new_store();
        let vector = BlobVector::<u64>::create(&mut store);
        vector.push_back(&mut store, 1).expect("push");

        assert!(matches!(
            vector.read_at(&store, 1),
            Err(BlobError::OutOfRange { .. })
        ));
        assert!(matches!(
            vector.insert_at(&mut store, 5, 0),
            Err(BlobError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_clear_and_release() {
        let mut store = new_store();
        let vector = BlobVector::<u64>::create(&mut store);
        for value in 0..1000 {
            vector.push_back(&mut store, value).expect("push");
        }
        vector.clear(&mut store).expect("clear");
        assert_eq!(vector.len(&store).expect("len"), 0);
        assert!(store.is_live(vector.identifier()));

        vector.release(&mut store).expect("release");
        assert!(!store.is_live(vector.identifier()));
        assert_eq!(store.space().page_count(), 1);
    }
}
