//! Slot allocator for blobs smaller than half a page.
//!
//! Each slab page serves one power-of-two size class and tracks its slots
//! with a bitmap: 0 = free, 1 = used. Slab bookkeeping is never written to
//! disk; it is rebuilt from the blob table when a database is opened.

// Slot indices and size classes are bounded by WORDS_PER_PAGE.
#![allow(clippy::cast_possible_truncation)]

use std::collections::{BTreeSet, HashMap};

use crate::storage::page::{PageId, WORDS_PER_PAGE_U64};
use crate::storage::space::{PageSpace, SpaceError};

/// Number of bits per byte.
const BITS_PER_BYTE: usize = 8;

/// Largest slot, in words. Bigger blobs get whole pages.
pub const MAX_SLOT_WORDS: u64 = WORDS_PER_PAGE_U64 / 2;

/// Number of size classes (1, 2, 4, ... `MAX_SLOT_WORDS` words).
pub const CLASS_COUNT: usize = MAX_SLOT_WORDS.trailing_zeros() as usize + 1;

/// Size class serving a slot of `words` words.
#[must_use]
pub const fn size_class(words: u64) -> usize {
    words.next_power_of_two().trailing_zeros() as usize
}

/// Slot size of a class, in words.
#[must_use]
pub const fn class_words(class: usize) -> u64 {
    1 << class
}

/// One page carved into equal slots.
#[derive(Debug)]
struct SlabPage {
    class: usize,
    bitmap: Vec<u8>,
    used: u64,
    /// Hint for next free slot search (optimization).
    next_search_hint: u64,
}

impl SlabPage {
    fn new(class: usize) -> Self {
        let slots = Self::slots_for(class);
        Self {
            class,
            bitmap: vec![0u8; (slots as usize).div_ceil(BITS_PER_BYTE)],
            used: 0,
            next_search_hint: 0,
        }
    }

    const fn slots_for(class: usize) -> u64 {
        WORDS_PER_PAGE_U64 / class_words(class)
    }

    const fn slots(&self) -> u64 {
        Self::slots_for(self.class)
    }

    const fn is_full(&self) -> bool {
        self.used == self.slots()
    }

    fn allocate(&mut self) -> Option<u64> {
        if self.is_full() {
            return None;
        }
        let slots = self.slots();
        let slot = (self.next_search_hint..slots)
            .chain(0..self.next_search_hint)
            .find(|&slot| !get_bit(&self.bitmap, slot as usize))?;
        set_bit(&mut self.bitmap, slot as usize);
        self.used += 1;
        self.next_search_hint = slot + 1;
        Some(slot)
    }

    fn mark_used(&mut self, slot: u64) -> bool {
        if get_bit(&self.bitmap, slot as usize) {
            return false;
        }
        set_bit(&mut self.bitmap, slot as usize);
        self.used += 1;
        true
    }

    fn free(&mut self, slot: u64) -> bool {
        if !get_bit(&self.bitmap, slot as usize) {
            return false;
        }
        clear_bit(&mut self.bitmap, slot as usize);
        self.used -= 1;
        if slot < self.next_search_hint {
            self.next_search_hint = slot;
        }
        true
    }
}

/// Allocates word-aligned slots inside slab pages.
#[derive(Debug)]
pub struct SlabAllocator {
    pages: HashMap<PageId, SlabPage>,
    /// Pages with at least one free slot, per class.
    partial: Vec<BTreeSet<PageId>>,
}

impl SlabAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            partial: (0..CLASS_COUNT).map(|_| BTreeSet::new()).collect(),
        }
    }

    /// Allocate a zeroed slot of at least `words` words.
    ///
    /// Returns the slot's word address in the arena.
    pub fn allocate(&mut self, space: &mut PageSpace, words: u64) -> Result<u64, SpaceError> {
        debug_assert!(words > 0 && words <= MAX_SLOT_WORDS);
        let class = size_class(words);

        let page_id = if let Some(&page_id) = self.partial[class].first() {
            page_id
        } else {
            let page_id = space.acquire_page()?;
            self.pages.insert(page_id, SlabPage::new(class));
            self.partial[class].insert(page_id);
            tracing::trace!(page_id, class, "new slab page");
            page_id
        };

        let slab = self
            .pages
            .get_mut(&page_id)
            .ok_or_else(|| SpaceError::Corruption(format!("slab page {page_id} is untracked")))?;
        let slot = slab
            .allocate()
            .ok_or_else(|| SpaceError::Corruption(format!("slab page {page_id} is full")))?;
        if slab.is_full() {
            self.partial[class].remove(&page_id);
        }

        let slot_words = class_words(class);
        let address = page_id * WORDS_PER_PAGE_U64 + slot * slot_words;
        let start = address as usize;
        space.words_mut()[start..start + slot_words as usize].fill(0);
        Ok(address)
    }

    /// Free the slot at `address`. An emptied slab page goes back to the space.
    pub fn free(
        &mut self,
        space: &mut PageSpace,
        address: u64,
        words: u64,
    ) -> Result<(), SpaceError> {
        let class = size_class(words);
        let page_id = address / WORDS_PER_PAGE_U64;
        let slot = (address % WORDS_PER_PAGE_U64) / class_words(class);

        let slab = self
            .pages
            .get_mut(&page_id)
            .filter(|slab| slab.class == class)
            .ok_or_else(|| {
                SpaceError::Corruption(format!("no class {class} slab at page {page_id}"))
            })?;
        if !slab.free(slot) {
            return Err(SpaceError::Corruption(format!(
                "double free of slot {slot} in slab page {page_id}"
            )));
        }

        if slab.used == 0 {
            self.pages.remove(&page_id);
            self.partial[class].remove(&page_id);
            space.release_page(page_id);
            tracing::trace!(page_id, class, "released empty slab page");
        } else {
            self.partial[class].insert(page_id);
        }
        Ok(())
    }

    /// Record an existing slot while rebuilding from the blob table.
    pub fn mark_used(&mut self, address: u64, words: u64) -> Result<(), SpaceError> {
        let class = size_class(words);
        let page_id = address / WORDS_PER_PAGE_U64;
        let slot_words = class_words(class);
        if address % slot_words != 0 {
            return Err(SpaceError::Corruption(format!(
                "slot address {address} is misaligned for class {class}"
            )));
        }

        let slab = self
            .pages
            .entry(page_id)
            .or_insert_with(|| SlabPage::new(class));
        if slab.class != class {
            return Err(SpaceError::Corruption(format!(
                "slab page {page_id} mixes classes {} and {class}",
                slab.class
            )));
        }
        let slot = (address % WORDS_PER_PAGE_U64) / slot_words;
        if !slab.mark_used(slot) {
            return Err(SpaceError::Corruption(format!(
                "slot {slot} of slab page {page_id} is claimed twice"
            )));
        }

        if slab.is_full() {
            self.partial[class].remove(&page_id);
        } else {
            self.partial[class].insert(page_id);
        }
        Ok(())
    }

    /// Number of pages currently serving as slabs.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl Default for SlabAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Get a bit from the bitmap.
fn get_bit(bitmap: &[u8], index: usize) -> bool {
    let byte_index = index / BITS_PER_BYTE;
    let bit_index = index % BITS_PER_BYTE;

    if byte_index >= bitmap.len() {
        return false;
    }

    (bitmap[byte_index] & (1 << bit_index)) != 0
}

/// Set a bit in the bitmap (mark as used).
fn set_bit(bitmap: &mut [u8], index: usize) {
    let byte_index = index / BITS_PER_BYTE;
    let bit_index = index % BITS_PER_BYTE;

    if byte_index < bitmap.len() {
        bitmap[byte_index] |= 1 << bit_index;
    }
}

/// Clear a bit in the bitmap (mark as free).
fn clear_bit(bitmap: &mut [u8], index: usize) {
    let byte_index = index / BITS_PER_BYTE;
    let bit_index = index % BITS_PER_BYTE;

    if byte_index < bitmap.len() {
        bitmap[byte_index] &= !(1 << bit_index);
    }
}
