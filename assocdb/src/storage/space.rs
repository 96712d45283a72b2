//! Page-backed address space.
//!
//! A growable linear word arena divided into fixed-size pages. Page `p`
//! occupies words `p * WORDS_PER_PAGE .. (p + 1) * WORDS_PER_PAGE`, so a run
//! of consecutive pages is also a contiguous bit range.
//!
//! # Design
//!
//! - Pages are referenced by integer [`PageId`], never by pointer.
//! - Released pages go onto an index-based LIFO free list. Releasing the
//!   highest page shrinks the arena instead.
//! - Page 0 is the root page and is never acquired or released.
//! - The arena lives in memory; `persist` writes every page to the backing
//!   file. There is no write-ahead log, so anything after the last flush is
//!   lost on a crash.

// Page ids index a Vec on 64-bit targets.
#![allow(clippy::cast_possible_truncation)]

use std::path::Path;

use crate::storage::file::{DatabaseFile, FileError};
use crate::storage::page::{PageId, WORDS_PER_PAGE, WORDS_PER_PAGE_U64};

/// A growable arena of pages with a free list.
#[derive(Debug)]
pub struct PageSpace {
    words: Vec<u64>,
    free_pages: Vec<PageId>,
    max_pages: u64,
    file: Option<DatabaseFile>,
}

impl PageSpace {
    /// Create an arena that is never written to disk.
    #[must_use]
    pub fn in_memory(max_pages: u64) -> Self {
        Self {
            words: vec![0; WORDS_PER_PAGE],
            free_pages: Vec::new(),
            max_pages,
            file: None,
        }
    }

    /// Create a fresh arena backed by a new file.
    pub fn create(path: &Path, max_pages: u64) -> Result<Self, SpaceError> {
        let file = DatabaseFile::create(path)?;
        Ok(Self {
            words: vec![0; WORDS_PER_PAGE],
            free_pages: Vec::new(),
            max_pages,
            file: Some(file),
        })
    }

    /// Load every page of an existing file into a new arena.
    ///
    /// The free list starts empty; the caller restores it from the pool chain.
    pub fn open(path: &Path, max_pages: u64) -> Result<Self, SpaceError> {
        let mut file = DatabaseFile::open(path)?;
        let words = file.read_all()?;
        Ok(Self {
            words,
            free_pages: Vec::new(),
            max_pages,
            file: Some(file),
        })
    }

    /// Number of pages in the arena, including the root page.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        self.words.len() as u64 / WORDS_PER_PAGE_U64
    }

    /// Upper bound on the number of pages.
    #[must_use]
    pub const fn max_pages(&self) -> u64 {
        self.max_pages
    }

    /// Whether the arena is backed by a file.
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        self.file.is_some()
    }

    /// Pages currently on the free list, oldest first.
    #[must_use]
    pub fn free_pages(&self) -> &[PageId] {
        &self.free_pages
    }

    /// Replace the free list (used when loading the pool chain).
    pub fn set_free_pages(&mut self, pages: Vec<PageId>) {
        self.free_pages = pages;
    }

    /// Acquire a zeroed page, reusing a free one when possible.
    pub fn acquire_page(&mut self) -> Result<PageId, SpaceError> {
        if let Some(page) = self.free_pages.pop() {
            self.page_mut(page).fill(0);
            tracing::trace!(page, "reused free page");
            return Ok(page);
        }
        self.grow(1)
    }

    /// Acquire `count` contiguous zeroed pages and return the first.
    ///
    /// Runs longer than one page are always taken from the end of the arena.
    pub fn acquire_run(&mut self, count: u64) -> Result<PageId, SpaceError> {
        if count == 1 {
            return self.acquire_page();
        }
        self.grow(count)
    }

    fn grow(&mut self, count: u64) -> Result<PageId, SpaceError> {
        let first = self.page_count();
        let requested = first.saturating_add(count);
        let exhausted = SpaceError::Exhausted {
            requested,
            max_pages: self.max_pages,
        };
        if requested > self.max_pages {
            return Err(exhausted);
        }
        // The limit may exceed what the host can address or allocate.
        let Some(len) = usize::try_from(requested)
            .ok()
            .and_then(|pages| pages.checked_mul(WORDS_PER_PAGE))
        else {
            return Err(exhausted);
        };
        if self.words.try_reserve_exact(len - self.words.len()).is_err() {
            return Err(exhausted);
        }
        self.words.resize(len, 0);
        tracing::debug!(first, count, total = requested, "grew page space");
        Ok(first)
    }

    /// Return a page to the space.
    pub fn release_page(&mut self, page: PageId) {
        debug_assert!(page != 0 && page < self.page_count());
        if page + 1 == self.page_count() {
            self.words.truncate(page as usize * WORDS_PER_PAGE);
            tracing::trace!(page, "shrank page space");
        } else {
            self.free_pages.push(page);
        }
    }

    /// Borrow one page.
    #[must_use]
    pub fn page(&self, page: PageId) -> &[u64] {
        let start = page as usize * WORDS_PER_PAGE;
        &self.words[start..start + WORDS_PER_PAGE]
    }

    /// Mutably borrow one page.
    pub fn page_mut(&mut self, page: PageId) -> &mut [u64] {
        let start = page as usize * WORDS_PER_PAGE;
        &mut self.words[start..start + WORDS_PER_PAGE]
    }

    /// The whole arena.
    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// The whole arena, mutably.
    pub fn words_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }

    /// Write every page to the backing file and sync it.
    ///
    /// Does nothing for in-memory arenas.
    pub fn persist(&mut self) -> Result<(), SpaceError> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(&self.words)?;
            file.sync()?;
            tracing::debug!(
                path = %file.path().display(),
                pages = self.words.len() / WORDS_PER_PAGE,
                "persisted page space"
            );
        }
        Ok(())
    }
}

/// Errors from the page space.
#[derive(Debug)]
pub enum SpaceError {
    /// The arena cannot grow past its configured limit.
    Exhausted { requested: u64, max_pages: u64 },
    /// File operation failed.
    File(FileError),
    /// Persisted metadata is inconsistent.
    Corruption(String),
}

impl std::fmt::Display for SpaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted {
                requested,
                max_pages,
            } => write!(
                f,
                "page space exhausted: {requested} pages requested, limit is {max_pages}"
            ),
            Self::File(e) => write!(f, "file error: {e}"),
            Self::Corruption(msg) => write!(f, "corrupt page space: {msg}"),
        }
    }
}

impl std::error::Error for SpaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::File(e) => Some(e),
            Self::Exhausted { .. } | Self::Corruption(_) => None,
        }
    }
}

impl From<FileError> for SpaceError {
    fn from(e: FileError) -> Self {
        Self::File(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_space_has_root_page() {
        let space = PageSpace::in_memory(16);
        assert_eq!(space.page_count(), 1);
        assert!(space.free_pages().is_empty());
        assert!(!space.is_persistent());
    }

    #[test]
    fn test_acquire_grows_then_reuses() {
        let mut space = PageSpace::in_memory(16);
        let a = space.acquire_page().expect("acquire");
        let b = space.acquire_page().expect("acquire");
        let c = space.acquire_page().expect("acquire");
        assert_eq!((a, b, c), (1, 2, 3));

        space.page_mut(b)[7] = 42;
        space.release_page(b);
        assert_eq!(space.free_pages(), &[2]);

        let reused = space.acquire_page().expect("acquire");
        assert_eq!(reused, b);
        assert_eq!(space.page(reused)[7], 0);
    }

    #[test]
    fn test_release_high_water_mark_shrinks() {
        let mut space = PageSpace::in_memory(16);
        let _a = space.acquire_page().expect("acquire");
        let b = space.acquire_page().expect("acquire");
        assert_eq!(space.page_count(), 3);

        space.release_page(b);
        assert_eq!(space.page_count(), 2);
        assert!(space.free_pages().is_empty());
    }

    #[test]
    fn test_free_list_is_lifo() {
        let mut space = PageSpace::in_memory(16);
        for _ in 0..5 {
            space.acquire_page().expect("acquire");
        }
        space.release_page(1);
        space.release_page(3);
        assert_eq!(space.acquire_page().expect("acquire"), 3);
        assert_eq!(space.acquire_page().expect("acquire"), 1);
    }

    #[test]
    fn test_acquire_run_is_contiguous_at_end() {
        let mut space = PageSpace::in_memory(16);
        let single = space.acquire_page().expect("acquire");
        let _other = space.acquire_page().expect("acquire");
        space.release_page(single);

        let first = space.acquire_run(3).expect("run");
        assert_eq!(first, 3);
        assert_eq!(space.page_count(), 6);
        assert_eq!(space.free_pages(), &[single]);
    }

    #[test]
    fn test_exhaustion() {
        let mut space = PageSpace::in_memory(3);
        space.acquire_page().expect("acquire");
        space.acquire_page().expect("acquire");

        let result = space.acquire_page();
        assert!(matches!(
            result,
            Err(SpaceError::Exhausted {
                requested: 4,
                max_pages: 3
            })
        ));
        assert!(space.acquire_run(2).is_err());
    }

    #[test]
    fn test_unaddressable_growth_is_exhaustion() {
        let mut space = PageSpace::in_memory(u64::MAX);
        for count in [1 << 50, u64::MAX / 2] {
            let result = space.acquire_run(count);
            assert!(
                matches!(result, Err(SpaceError::Exhausted { .. })),
                "{count} pages"
            );
        }
        assert_eq!(space.page_count(), 1);
        assert_eq!(space.acquire_page().expect("acquire"), 1);
    }
}
