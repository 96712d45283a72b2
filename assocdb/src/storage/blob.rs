//! Blob store: variable-length bit strings keyed by identifier.
//!
//! # Design
//!
//! The blob table maps each identifier to its exact size in bits and the
//! word address of its storage in the page space. Capacity is derived from
//! the size alone:
//!
//! - up to [`MAX_SLOT_WORDS`] words: a power-of-two slab slot
//! - larger: a run of whole pages taken from the end of the arena
//!
//! A resize that stays within the same capacity happens in place; anything
//! else allocates new storage, copies the preserved prefix and frees the old
//! storage.
//!
//! # Invariants
//!
//! - Bits between a blob's logical size and the end of its capacity are zero.
//! - An identifier is live from `create_identifier` until `release_identifier`;
//!   every other operation on a dead identifier fails with `NonexistentBlob`.
//! - Every mutation runs the modified hook, which evicts interned blobs from
//!   the literal index (see `take_invalidated`).

// Word addresses index the arena on 64-bit targets.
#![allow(clippy::cast_possible_truncation)]

use std::cmp::Ordering;

use crate::storage::bits::{
    BitSpan, BitSpanMut, WORD_BITS, fill_bits, move_bits, read_bits, words_for_bits, write_bits,
};
use crate::storage::chain::{pages_needed, read_chain, write_chain};
use crate::storage::page::{PageId, PageType, WORDS_PER_PAGE_U64};
use crate::storage::slab::{MAX_SLOT_WORDS, SlabAllocator};
use crate::storage::space::{PageSpace, SpaceError};
use crate::storage::superblock::Superblock;

/// Opaque blob identifier. Symbols and container blobs share this space.
pub type Identifier = u64;

const SLOT_LIVE: u64 = 1;
const SLOT_INTERNED: u64 = 1 << 1;

/// Words per persisted blob table entry: size, address, flags.
const TABLE_ENTRY_WORDS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BlobSlot {
    /// Logical size in bits.
    size: u64,
    /// Word address of the storage; meaningless when `size` is 0.
    address: u64,
    flags: u64,
}

impl BlobSlot {
    const fn is_live(&self) -> bool {
        self.flags & SLOT_LIVE != 0
    }

    const fn bit_address(&self) -> u64 {
        self.address * WORD_BITS
    }
}

/// Storage capacity, in words, backing a blob of `size_bits` bits.
#[must_use]
pub const fn capacity_words(size_bits: u64) -> u64 {
    if size_bits == 0 {
        return 0;
    }
    let words = words_for_bits(size_bits);
    if words <= MAX_SLOT_WORDS {
        words.next_power_of_two()
    } else {
        words.div_ceil(WORDS_PER_PAGE_U64) * WORDS_PER_PAGE_U64
    }
}

/// Variable-length bit strings allocated out of a [`PageSpace`].
#[derive(Debug)]
pub struct BlobStore {
    space: PageSpace,
    table: Vec<BlobSlot>,
    free_identifiers: Vec<Identifier>,
    slabs: SlabAllocator,
    /// Interned identifiers whose content changed since the last drain.
    invalidated: Vec<Identifier>,
    /// Pages holding the blob table as of the last checkpoint.
    table_pages: Vec<PageId>,
}

impl BlobStore {
    /// Create an empty store over a fresh page space.
    #[must_use]
    pub fn new(space: PageSpace) -> Self {
        Self {
            space,
            table: Vec::new(),
            free_identifiers: Vec::new(),
            slabs: SlabAllocator::new(),
            invalidated: Vec::new(),
            table_pages: Vec::new(),
        }
    }

    /// Rebuild a store from a loaded page space and its superblock.
    pub fn load(mut space: PageSpace, superblock: &Superblock) -> Result<Self, BlobError> {
        let page_count = space.page_count();
        if superblock.page_count != page_count {
            return Err(corruption(format!(
                "superblock records {} pages, file has {page_count}",
                superblock.page_count
            )));
        }

        let (free_pages, _) = read_chain(
            &space,
            superblock.free_pool_head,
            PageType::FreePool,
            superblock.free_page_count,
        )?;
        if let Some(bad) = free_pages.iter().find(|&&p| p == 0 || p >= page_count) {
            return Err(corruption(format!("free pool lists invalid page {bad}")));
        }
        space.set_free_pages(free_pages);

        let entry_words = superblock
            .blob_table_len
            .checked_mul(TABLE_ENTRY_WORDS as u64)
            .ok_or_else(|| corruption("blob table length overflows".to_string()))?;
        let (entries, table_pages) = read_chain(
            &space,
            superblock.blob_table_head,
            PageType::BlobTable,
            entry_words,
        )?;
        let table: Vec<BlobSlot> = entries
            .chunks_exact(TABLE_ENTRY_WORDS)
            .map(|entry| BlobSlot {
                size: entry[0],
                address: entry[1],
                flags: entry[2],
            })
            .collect();
        if table.len() as u64 != superblock.identifier_count {
            return Err(corruption(format!(
                "blob table holds {} entries, expected {}",
                table.len(),
                superblock.identifier_count
            )));
        }

        let arena_words = space.words().len() as u64;
        let mut slabs = SlabAllocator::new();
        for (id, slot) in table.iter().enumerate() {
            if !slot.is_live() || slot.size == 0 {
                continue;
            }
            let capacity = capacity_words(slot.size);
            if slot.address.saturating_add(capacity) > arena_words {
                return Err(corruption(format!("blob {id} lies outside the page space")));
            }
            if capacity <= MAX_SLOT_WORDS {
                slabs.mark_used(slot.address, capacity)?;
            }
        }

        let free_identifiers = (0..table.len() as u64)
            .rev()
            .filter(|&id| !table[id as usize].is_live())
            .collect();

        tracing::debug!(
            identifiers = table.len(),
            pages = page_count,
            slab_pages = slabs.page_count(),
            "loaded blob store"
        );

        Ok(Self {
            space,
            table,
            free_identifiers,
            slabs,
            invalidated: Vec::new(),
            table_pages,
        })
    }

    /// Write the blob table and free pool chains, seal the root page, and
    /// persist the page space.
    ///
    /// `superblock` must already carry the caller's fields (index roots,
    /// mode); the storage fields are filled in here.
    pub fn checkpoint(&mut self, superblock: &mut Superblock) -> Result<(), BlobError> {
        for page in std::mem::take(&mut self.table_pages).into_iter().rev() {
            self.space.release_page(page);
        }

        let mut entries = Vec::with_capacity(self.table.len() * TABLE_ENTRY_WORDS);
        for slot in &self.table {
            entries.extend_from_slice(&[slot.size, slot.address, slot.flags]);
        }
        let needed = pages_needed(entries.len());
        let mut table_pages = Vec::with_capacity(needed);
        while table_pages.len() < needed {
            match self.space.acquire_page() {
                Ok(page) => table_pages.push(page),
                Err(e) => {
                    // Hand back the partial chain so a later flush can reuse it.
                    for page in table_pages.into_iter().rev() {
                        self.space.release_page(page);
                    }
                    return Err(e.into());
                }
            }
        }
        superblock.blob_table_head =
            write_chain(&mut self.space, &table_pages, PageType::BlobTable, &entries);
        superblock.blob_table_len = self.table.len() as u64;
        self.table_pages = table_pages;

        // The pool chain is threaded through the free pages it describes.
        let free_pages = self.space.free_pages().to_vec();
        let pool_pages = &free_pages[..pages_needed(free_pages.len())];
        superblock.free_pool_head =
            write_chain(&mut self.space, pool_pages, PageType::FreePool, &free_pages);
        superblock.free_page_count = free_pages.len() as u64;

        superblock.page_count = self.space.page_count();
        superblock.identifier_count = self.table.len() as u64;
        superblock.write_to(self.space.page_mut(0));
        self.space.persist()?;
        Ok(())
    }

    /// The underlying page space.
    #[must_use]
    pub const fn space(&self) -> &PageSpace {
        &self.space
    }

    /// Issue a fresh identifier with an empty blob.
    pub fn create_identifier(&mut self) -> Identifier {
        let slot = BlobSlot {
            size: 0,
            address: 0,
            flags: SLOT_LIVE,
        };
        if let Some(id) = self.free_identifiers.pop() {
            self.table[id as usize] = slot;
            return id;
        }
        self.table.push(slot);
        self.table.len() as u64 - 1
    }

    /// Free an identifier's storage and make it eligible for reuse.
    pub fn release_identifier(&mut self, id: Identifier) -> Result<(), BlobError> {
        self.set_size(id, 0, 0)?;
        self.table[id as usize] = BlobSlot::default();
        self.free_identifiers.push(id);
        tracing::trace!(id, "released identifier");
        Ok(())
    }

    /// Whether `id` is currently issued.
    #[must_use]
    pub fn is_live(&self, id: Identifier) -> bool {
        self.table
            .get(id as usize)
            .is_some_and(BlobSlot::is_live)
    }

    /// Number of live identifiers.
    #[must_use]
    pub fn live_count(&self) -> u64 {
        self.table.iter().filter(|slot| slot.is_live()).count() as u64
    }

    /// Total logical size of all blobs, in bits.
    #[must_use]
    pub fn payload_bits(&self) -> u64 {
        self.table.iter().map(|slot| slot.size).sum()
    }

    fn slot(&self, id: Identifier) -> Result<BlobSlot, BlobError> {
        self.table
            .get(id as usize)
            .copied()
            .filter(BlobSlot::is_live)
            .ok_or(BlobError::NonexistentBlob(id))
    }

    /// Logical size of a blob in bits.
    pub fn size(&self, id: Identifier) -> Result<u64, BlobError> {
        Ok(self.slot(id)?.size)
    }

    /// Resize a blob, keeping its first `min(old, size, preserve)` bits.
    ///
    /// A size of 0 frees the storage entirely. All other bits read as zero
    /// afterwards.
    pub fn set_size(&mut self, id: Identifier, size: u64, preserve: u64) -> Result<(), BlobError> {
        let slot = self.slot(id)?;
        let old_capacity = capacity_words(slot.size);
        let new_capacity = capacity_words(size);
        let keep = slot.size.min(size).min(preserve);

        let address = if old_capacity == new_capacity {
            if slot.size > keep {
                fill_bits(
                    self.space.words_mut(),
                    slot.bit_address() + keep,
                    slot.size - keep,
                    false,
                );
            }
            slot.address
        } else {
            let address = if new_capacity == 0 {
                0
            } else {
                self.allocate(new_capacity)?
            };
            if keep > 0 {
                move_bits(
                    self.space.words_mut(),
                    address * WORD_BITS,
                    slot.bit_address(),
                    keep,
                );
            }
            if old_capacity > 0 {
                self.deallocate(slot.address, old_capacity)?;
            }
            address
        };

        let entry = &mut self.table[id as usize];
        entry.size = size;
        entry.address = address;
        tracing::trace!(id, from = slot.size, to = size, "resized blob");
        self.modified(id);
        Ok(())
    }

    fn allocate(&mut self, capacity: u64) -> Result<u64, SpaceError> {
        if capacity <= MAX_SLOT_WORDS {
            return self.slabs.allocate(&mut self.space, capacity);
        }
        let first = self.space.acquire_run(capacity / WORDS_PER_PAGE_U64)?;
        Ok(first * WORDS_PER_PAGE_U64)
    }

    fn deallocate(&mut self, address: u64, capacity: u64) -> Result<(), SpaceError> {
        if capacity <= MAX_SLOT_WORDS {
            return self.slabs.free(&mut self.space, address, capacity);
        }
        let first = address / WORDS_PER_PAGE_U64;
        // Highest page first, so a run at the end of the arena shrinks it.
        for page in (first..first + capacity / WORDS_PER_PAGE_U64).rev() {
            self.space.release_page(page);
        }
        Ok(())
    }

    /// Read-only view of a blob's content.
    pub fn span(&self, id: Identifier) -> Result<BitSpan<'_>, BlobError> {
        let slot = self.slot(id)?;
        BitSpan::new(self.space.words(), slot.bit_address(), slot.size)
            .ok_or_else(|| corruption(format!("blob {id} lies outside the page space")))
    }

    fn span_mut(&mut self, id: Identifier) -> Result<BitSpanMut<'_>, BlobError> {
        let slot = self.slot(id)?;
        BitSpanMut::new(self.space.words_mut(), slot.bit_address(), slot.size)
            .ok_or_else(|| corruption(format!("blob {id} lies outside the page space")))
    }

    fn check_range(&self, id: Identifier, offset: u64, length: u64) -> Result<BlobSlot, BlobError> {
        let slot = self.slot(id)?;
        match offset.checked_add(length) {
            Some(end) if end <= slot.size => Ok(slot),
            _ => Err(BlobError::OutOfRange {
                id,
                offset,
                length,
                size: slot.size,
            }),
        }
    }

    /// Read up to 64 bits.
    pub fn read(&self, id: Identifier, offset: u64, length: u64) -> Result<u64, BlobError> {
        let span = self.span(id)?;
        span.read(offset, length).ok_or(BlobError::OutOfRange {
            id,
            offset,
            length,
            size: span.len(),
        })
    }

    /// Write up to 64 bits.
    pub fn write(
        &mut self,
        id: Identifier,
        offset: u64,
        length: u64,
        value: u64,
    ) -> Result<(), BlobError> {
        let mut span = self.span_mut(id)?;
        let size = span.len();
        span.write(offset, length, value)
            .ok_or(BlobError::OutOfRange {
                id,
                offset,
                length,
                size,
            })?;
        self.modified(id);
        Ok(())
    }

    /// Read `out.len()` whole words starting at bit `offset`.
    pub fn read_words(&self, id: Identifier, offset: u64, out: &mut [u64]) -> Result<(), BlobError> {
        let length = out.len() as u64 * WORD_BITS;
        let slot = self.check_range(id, offset, length)?;
        let start = slot.bit_address() + offset;
        let words = self.space.words();
        if start % WORD_BITS == 0 {
            let first = (start / WORD_BITS) as usize;
            out.copy_from_slice(&words[first..first + out.len()]);
        } else {
            for (i, word) in out.iter_mut().enumerate() {
                *word = read_bits(words, start + i as u64 * WORD_BITS, WORD_BITS);
            }
        }
        Ok(())
    }

    /// Write whole words starting at bit `offset`.
    pub fn write_words(&mut self, id: Identifier, offset: u64, data: &[u64]) -> Result<(), BlobError> {
        let length = data.len() as u64 * WORD_BITS;
        let slot = self.check_range(id, offset, length)?;
        let start = slot.bit_address() + offset;
        let words = self.space.words_mut();
        if start % WORD_BITS == 0 {
            let first = (start / WORD_BITS) as usize;
            words[first..first + data.len()].copy_from_slice(data);
        } else {
            for (i, word) in data.iter().enumerate() {
                write_bits(words, start + i as u64 * WORD_BITS, WORD_BITS, *word);
            }
        }
        self.modified(id);
        Ok(())
    }

    /// Open a zeroed gap of `length` bits at `at`, shifting the tail up.
    pub fn insert(&mut self, id: Identifier, at: u64, length: u64) -> Result<(), BlobError> {
        let size = self.size(id)?;
        let new_size = size.checked_add(length).filter(|_| at <= size);
        let Some(new_size) = new_size else {
            return Err(BlobError::OutOfRange {
                id,
                offset: at,
                length,
                size,
            });
        };
        if length == 0 {
            return Ok(());
        }

        self.set_size(id, new_size, size)?;
        let base = self.slot(id)?.bit_address();
        let words = self.space.words_mut();
        move_bits(words, base + at + length, base + at, size - at);
        fill_bits(words, base + at, length, false);
        self.modified(id);
        Ok(())
    }

    /// Remove `length` bits at `at`, shifting the tail down.
    pub fn erase(&mut self, id: Identifier, at: u64, length: u64) -> Result<(), BlobError> {
        let slot = self.check_range(id, at, length)?;
        if length == 0 {
            return Ok(());
        }

        let base = slot.bit_address();
        let end = at + length;
        move_bits(self.space.words_mut(), base + at, base + end, slot.size - end);
        let new_size = slot.size - length;
        self.set_size(id, new_size, new_size)
    }

    /// Copy `length` bits from `src` at `src_offset` into `dst` at `dst_offset`.
    pub fn slice(
        &mut self,
        dst: Identifier,
        src: Identifier,
        dst_offset: u64,
        src_offset: u64,
        length: u64,
    ) -> Result<(), BlobError> {
        let dst_slot = self.check_range(dst, dst_offset, length)?;
        let src_slot = self.check_range(src, src_offset, length)?;
        if length == 0 {
            return Ok(());
        }

        move_bits(
            self.space.words_mut(),
            dst_slot.bit_address() + dst_offset,
            src_slot.bit_address() + src_offset,
            length,
        );
        self.modified(dst);
        Ok(())
    }

    /// Replace `dst`'s content with a copy of `src`.
    pub fn clone_blob(&mut self, dst: Identifier, src: Identifier) -> Result<(), BlobError> {
        if dst == src {
            return Ok(());
        }
        let size = self.size(src)?;
        self.set_size(dst, size, 0)?;
        self.slice(dst, src, 0, 0, size)
    }

    /// Size-then-content ordering. Equal identifiers compare equal without
    /// looking at their content.
    pub fn compare(&self, a: Identifier, b: Identifier) -> Result<Ordering, BlobError> {
        if a == b {
            return Ok(Ordering::Equal);
        }
        Ok(self.span(a)?.compare(&self.span(b)?))
    }

    /// Copy a blob out as bytes; a trailing partial byte is zero padded.
    pub fn to_bytes(&self, id: Identifier) -> Result<Vec<u8>, BlobError> {
        Ok(self.span(id)?.to_bytes())
    }

    /// Replace a blob's content with `bytes`.
    pub fn write_bytes(&mut self, id: Identifier, bytes: &[u8]) -> Result<(), BlobError> {
        self.set_size(id, bytes.len() as u64 * 8, 0)?;
        let packed: Vec<u64> = bytes
            .chunks(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word[..chunk.len()].copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();
        let slot = self.slot(id)?;
        let first = slot.address as usize;
        self.space.words_mut()[first..first + packed.len()].copy_from_slice(&packed);
        self.modified(id);
        Ok(())
    }

    /// Flag a blob as present in the literal index.
    pub fn set_interned(&mut self, id: Identifier, interned: bool) -> Result<(), BlobError> {
        self.slot(id)?;
        let entry = &mut self.table[id as usize];
        if interned {
            entry.flags |= SLOT_INTERNED;
        } else {
            entry.flags &= !SLOT_INTERNED;
        }
        Ok(())
    }

    /// Whether a blob is flagged as interned.
    #[must_use]
    pub fn is_interned(&self, id: Identifier) -> bool {
        self.slot(id)
            .is_ok_and(|slot| slot.flags & SLOT_INTERNED != 0)
    }

    /// Drain the identifiers evicted by the modified hook.
    pub fn take_invalidated(&mut self) -> Vec<Identifier> {
        std::mem::take(&mut self.invalidated)
    }

    /// Hook run after every mutation of `id`.
    pub fn modified(&mut self, id: Identifier) {
        if let Some(entry) = self.table.get_mut(id as usize) {
            if entry.flags & SLOT_INTERNED != 0 {
                entry.flags &= !SLOT_INTERNED;
                self.invalidated.push(id);
            }
        }
    }
}

fn corruption(message: String) -> BlobError {
    BlobError::Space(SpaceError::Corruption(message))
}

/// Errors from blob operations.
#[derive(Debug)]
pub enum BlobError {
    /// The identifier was never issued or has been released.
    NonexistentBlob(Identifier),
    /// An access reached past the blob's current size.
    OutOfRange {
        id: Identifier,
        offset: u64,
        length: u64,
        size: u64,
    },
    /// The page space failed.
    Space(SpaceError),
}

impl std::fmt::Display for BlobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonexistentBlob(id) => write!(f, "blob {id} does not exist"),
            Self::OutOfRange {
                id,
                offset,
                length,
                size,
            } => write!(
                f,
                "access of {length} bits at {offset} is out of range for blob {id} of {size} bits"
            ),
            Self::Space(e) => write!(f, "page space error: {e}"),
        }
    }
}

impl std::error::Error for BlobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Space(e) => Some(e),
            Self::NonexistentBlob(_) | Self::OutOfRange { .. } => None,
        }
    }
}

impl From<SpaceError> for BlobError {
    fn from(e: SpaceError) -> Self {
        Self::Space(e)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::tempdir;

    use super::*;

    fn new_store() -> BlobStore {
        BlobStore::new(PageSpace::in_memory(1024))
    }

    fn prefix_bits(store: &BlobStore, id: Identifier, count: u64) -> Vec<bool> {
        (0..count)
            .map(|i| store.read(id, i, 1).expect("read") == 1)
            .collect()
    }

    fn bits_of(store: &BlobStore, id: Identifier) -> Vec<bool> {
        prefix_bits(store, id, store.size(id).expect("size"))
    }

    fn fill_random(store: &mut BlobStore, id: Identifier, rng: &mut StdRng) {
        let size = store.size(id).expect("size");
        let mut offset = 0;
        while offset < size {
            let n = (size - offset).min(64);
            store.write(id, offset, n, rng.random()).expect("write");
            offset += n;
        }
    }

    #[test]
    fn test_fresh_identifier_is_empty() {
        let mut store = new_store();
        let id = store.create_identifier();
        assert!(store.is_live(id));
        assert_eq!(store.size(id).expect("size"), 0);
        assert_eq!(store.space().page_count(), 1);
    }

    #[test]
    fn test_read_write_bounds() {
        let mut store = new_store();
        let id = store.create_identifier();
        store.set_size(id, 100, 0).expect("resize");

        store.write(id, 90, 10, 0x3FF).expect("write");
        assert_eq!(store.read(id, 90, 10).expect("read"), 0x3FF);

        assert!(matches!(
            store.write(id, 95, 10, 0),
            Err(BlobError::OutOfRange { size: 100, .. })
        ));
        assert!(matches!(
            store.read(id, 100, 1),
            Err(BlobError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_nonexistent_blob() {
        let mut store = new_store();
        assert!(matches!(store.size(7), Err(BlobError::NonexistentBlob(7))));

        let id = store.create_identifier();
        store.release_identifier(id).expect("release");
        assert!(!store.is_live(id));
        assert!(matches!(
            store.write(id, 0, 1, 1),
            Err(BlobError::NonexistentBlob(_))
        ));
    }

    #[test]
    fn test_identifiers_are_reused_after_release() {
        let mut store = new_store();
        let a = store.create_identifier();
        let b = store.create_identifier();
        store.release_identifier(a).expect("release");

        let c = store.create_identifier();
        assert_eq!(c, a);
        assert_ne!(c, b);
        assert_eq!(store.live_count(), 2);
    }

    #[test]
    fn test_resize_preserves_prefix_across_classes() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut store = new_store();
        let id = store.create_identifier();

        store.set_size(id, 70, 0).expect("resize");
        fill_random(&mut store, id, &mut rng);
        let before = bits_of(&store, id);

        // Grow into a larger slab class, then into a page run.
        store.set_size(id, 5_000, 70).expect("grow");
        assert_eq!(&bits_of(&store, id)[..70], &before[..]);
        assert!(bits_of(&store, id)[70..].iter().all(|b| !b));

        store.set_size(id, 2_000_000, 5_000).expect("grow to pages");
        assert_eq!(prefix_bits(&store, id, 70), before);
        assert_eq!(store.read(id, 1_999_936, 64).expect("read"), 0);

        store.set_size(id, 40, 40).expect("shrink");
        assert_eq!(bits_of(&store, id), &before[..40]);
    }

    #[test]
    fn test_resize_without_preserve_clears_content() {
        let mut store = new_store();
        let id = store.create_identifier();
        store.set_size(id, 64, 0).expect("resize");
        store.write(id, 0, 64, u64::MAX).expect("write");

        store.set_size(id, 64, 0).expect("resize in place");
        assert_eq!(store.read(id, 0, 64).expect("read"), 0);
    }

    #[test]
    fn test_shrink_zeroes_trailing_bits() {
        let mut store = new_store();
        let id = store.create_identifier();
        store.set_size(id, 64, 0).expect("resize");
        store.write(id, 0, 64, u64::MAX).expect("write");

        store.set_size(id, 10, 10).expect("shrink");
        store.set_size(id, 64, 10).expect("grow back");
        assert_eq!(store.read(id, 0, 64).expect("read"), 0x3FF);
    }

    #[test]
    fn test_insert_erase_bit_exactness() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut store = new_store();
        let id = store.create_identifier();

        for _ in 0..200 {
            let size = store.size(id).expect("size");
            if size > 0 && rng.random_bool(0.4) {
                let at = rng.random_range(0..size);
                let length = rng.random_range(0..=size - at);
                let mut model = bits_of(&store, id);
                model.drain(at as usize..(at + length) as usize);

                store.erase(id, at, length).expect("erase");
                assert_eq!(store.size(id).expect("size"), size - length);
                assert_eq!(bits_of(&store, id), model);
            } else {
                let at = rng.random_range(0..=size);
                let length = rng.random_range(0..300);
                let mut model = bits_of(&store, id);
                let gap = vec![false; length as usize];
                model.splice(at as usize..at as usize, gap);

                store.insert(id, at, length).expect("insert");
                assert_eq!(store.size(id).expect("size"), size + length);
                assert_eq!(bits_of(&store, id), model);
                fill_random(&mut store, id, &mut rng);
            }
        }
    }

    #[test]
    fn test_insert_past_end_is_out_of_range() {
        let mut store = new_store();
        let id = store.create_identifier();
        store.set_size(id, 8, 0).expect("resize");
        assert!(matches!(
            store.insert(id, 9, 1),
            Err(BlobError::OutOfRange { .. })
        ));
        assert!(matches!(
            store.erase(id, 4, 5),
            Err(BlobError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_slice_between_blobs() {
        let mut store = new_store();
        let src = store.create_identifier();
        let dst = store.create_identifier();
        store.write_bytes(src, b"hello world").expect("write");
        store.set_size(dst, 5 * 8, 0).expect("resize");

        store.slice(dst, src, 0, 6 * 8, 5 * 8).expect("slice");
        assert_eq!(store.to_bytes(dst).expect("bytes"), b"world");

        assert!(matches!(
            store.slice(dst, src, 8, 0, 5 * 8),
            Err(BlobError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_clone_blob() {
        let mut store = new_store();
        let src = store.create_identifier();
        let dst = store.create_identifier();
        store.write_bytes(src, b"payload").expect("write");
        store.write_bytes(dst, b"something much longer").expect("write");

        store.clone_blob(dst, src).expect("clone");
        assert_eq!(store.to_bytes(dst).expect("bytes"), b"payload");
    }

    #[test]
    fn test_compare_size_then_content() {
        let mut store = new_store();
        let a = store.create_identifier();
        let b = store.create_identifier();
        let c = store.create_identifier();
        store.write_bytes(a, b"bob").expect("write");
        store.write_bytes(b, b"alice").expect("write");
        store.write_bytes(c, b"carol").expect("write");

        assert_eq!(store.compare(a, b).expect("compare"), Ordering::Less);
        assert_eq!(store.compare(b, c).expect("compare"), Ordering::Less);
        assert_eq!(store.compare(c, b).expect("compare"), Ordering::Greater);
        assert_eq!(store.compare(a, a).expect("compare"), Ordering::Equal);

        store.write_bytes(c, b"alice").expect("write");
        assert_eq!(store.compare(b, c).expect("compare"), Ordering::Equal);
    }

    #[test]
    fn test_large_blob_release_shrinks_space() {
        let mut store = new_store();
        let id = store.create_identifier();
        store.set_size(id, 3 * 262_144, 0).expect("resize");
        assert_eq!(store.space().page_count(), 4);

        store.release_identifier(id).expect("release");
        assert_eq!(store.space().page_count(), 1);
    }

    #[test]
    fn test_modified_hook_evicts_interned_blob() {
        let mut store = new_store();
        let id = store.create_identifier();
        store.write_bytes(id, b"x").expect("write");
        store.set_interned(id, true).expect("intern");
        assert!(store.is_interned(id));

        store.write(id, 0, 1, 0).expect("write");
        assert!(!store.is_interned(id));
        assert_eq!(store.take_invalidated(), vec![id]);
        assert!(store.take_invalidated().is_empty());
    }

    #[test]
    fn test_checkpoint_and_load() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("blobs.db");

        let (kept, released, big) = {
            let mut store = BlobStore::new(PageSpace::create(&path, 1024).expect("create"));
            let kept = store.create_identifier();
            let released = store.create_identifier();
            let big = store.create_identifier();
            store.write_bytes(kept, b"persistent").expect("write");
            store.write_bytes(released, b"gone").expect("write");
            store.set_size(big, 300_000, 0).expect("resize");
            store.write(big, 299_990, 10, 0x2AA).expect("write");
            store.release_identifier(released).expect("release");

            let mut superblock = Superblock::new();
            store.checkpoint(&mut superblock).expect("checkpoint");
            (kept, released, big)
        };

        let space = PageSpace::open(&path, 1024).expect("open");
        let superblock = Superblock::read_from(space.page(0)).expect("superblock");
        let mut store = BlobStore::load(space, &superblock).expect("load");

        assert_eq!(store.to_bytes(kept).expect("bytes"), b"persistent");
        assert_eq!(store.read(big, 299_990, 10).expect("read"), 0x2AA);
        assert!(!store.is_live(released));
        assert_eq!(store.create_identifier(), released);

        // Slab bookkeeping was rebuilt: a new small blob must not overlap `kept`.
        let fresh = store.create_identifier();
        store.write_bytes(fresh, b"0123456789").expect("write");
        assert_eq!(store.to_bytes(kept).expect("bytes"), b"persistent");
    }

    #[test]
    fn test_failed_checkpoint_returns_table_pages() {
        // Root, one slab page, one page-sized blob, and room for one more.
        let mut store = BlobStore::new(PageSpace::in_memory(4));
        let small = store.create_identifier();
        store.write_bytes(small, b"slab").expect("write");
        let big = store.create_identifier();
        store.set_size(big, 3_000 * 64, 0).expect("resize");
        assert_eq!(store.space().page_count(), 3);

        // Enough identifiers that the table chain spans two pages.
        for _ in 0..1_400 {
            store.create_identifier();
        }

        let mut superblock = Superblock::new();
        let result = store.checkpoint(&mut superblock);
        assert!(matches!(
            result,
            Err(BlobError::Space(SpaceError::Exhausted { .. }))
        ));
        assert_eq!(store.space().page_count(), 3);
        assert!(store.space().free_pages().is_empty());

        store.release_identifier(big).expect("release");
        assert_eq!(store.space().page_count(), 2);
        store.checkpoint(&mut superblock).expect("checkpoint");
        assert_eq!(store.space().page_count(), 4);
    }
}
