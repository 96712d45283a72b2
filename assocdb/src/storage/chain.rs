//! Page chains for metadata that does not fit in the root page.
//!
//! Both the free-page pool and the blob table are flushed as chains of
//! metadata pages. Each page links to the next one; the last link is 0.
//!
//! # Chain Page Format
//!
//! ```text
//! +----------------+----------------+----------------+------------------+
//! | Page Header    | Next Page ID   | Word Count     | Payload...       |
//! | (1 word)       | (1 word)       | (1 word)       | (variable)       |
//! +----------------+----------------+----------------+------------------+
//! ```

// Payload counts never exceed a page worth of words.
#![allow(clippy::cast_possible_truncation)]

use crate::storage::page::{PageId, PageType, WORDS_PER_PAGE, seal_page, verify_page};
use crate::storage::space::{PageSpace, SpaceError};

const NEXT_OFFSET: usize = 1;
const COUNT_OFFSET: usize = 2;
const PAYLOAD_OFFSET: usize = 3;

/// Maximum payload words per chain page.
pub const PAYLOAD_WORDS_PER_PAGE: usize = WORDS_PER_PAGE - PAYLOAD_OFFSET;

/// Number of chain pages needed for `words` payload words.
#[must_use]
pub const fn pages_needed(words: usize) -> usize {
    words.div_ceil(PAYLOAD_WORDS_PER_PAGE)
}

/// Write `payload` across `pages` and return the head page (0 if empty).
///
/// `pages` must hold exactly `pages_needed(payload.len())` page ids.
pub fn write_chain(
    space: &mut PageSpace,
    pages: &[PageId],
    page_type: PageType,
    payload: &[u64],
) -> PageId {
    debug_assert_eq!(pages.len(), pages_needed(payload.len()));

    for (i, (&page_id, chunk)) in pages
        .iter()
        .zip(payload.chunks(PAYLOAD_WORDS_PER_PAGE))
        .enumerate()
    {
        let next = pages.get(i + 1).copied().unwrap_or(0);
        let page = space.page_mut(page_id);
        page.fill(0);
        page[NEXT_OFFSET] = next;
        page[COUNT_OFFSET] = chunk.len() as u64;
        page[PAYLOAD_OFFSET..PAYLOAD_OFFSET + chunk.len()].copy_from_slice(chunk);
        seal_page(page, page_type);
    }

    pages.first().copied().unwrap_or(0)
}

/// Follow a chain from `head` and return its payload and the pages it used.
///
/// Every page is checksummed, and the total payload must match `expected_len`.
pub fn read_chain(
    space: &PageSpace,
    head: PageId,
    page_type: PageType,
    expected_len: u64,
) -> Result<(Vec<u64>, Vec<PageId>), SpaceError> {
    let mut payload = Vec::new();
    let mut pages = Vec::new();
    let mut current = head;

    while current != 0 {
        if current >= space.page_count() || pages.len() as u64 >= space.page_count() {
            return Err(SpaceError::Corruption(format!(
                "{page_type:?} chain reaches invalid page {current}"
            )));
        }

        let page = space.page(current);
        verify_page(page, page_type)
            .map_err(|e| SpaceError::Corruption(format!("chain page {current}: {e}")))?;

        let count = page[COUNT_OFFSET] as usize;
        if count > PAYLOAD_WORDS_PER_PAGE {
            return Err(SpaceError::Corruption(format!(
                "chain page {current} claims {count} payload words"
            )));
        }

        payload.extend_from_slice(&page[PAYLOAD_OFFSET..PAYLOAD_OFFSET + count]);
        pages.push(current);
        current = page[NEXT_OFFSET];
    }

    if payload.len() as u64 != expected_len {
        return Err(SpaceError::Corruption(format!(
            "{page_type:?} chain holds {} words, expected {expected_len}",
            payload.len()
        )));
    }

    Ok((payload, pages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_needed() {
        assert_eq!(pages_needed(0), 0);
        assert_eq!(pages_needed(1), 1);
        assert_eq!(pages_needed(PAYLOAD_WORDS_PER_PAGE), 1);
        assert_eq!(pages_needed(PAYLOAD_WORDS_PER_PAGE + 1), 2);
    }

    #[test]
    fn test_multi_page_chain() {
        let mut space = PageSpace::in_memory(16);
        let payload: Vec<u64> = (0..PAYLOAD_WORDS_PER_PAGE as u64 * 2 + 10).collect();
        let pages: Vec<PageId> = (0..pages_needed(payload.len()))
            .map(|_| space.acquire_page().expect("acquire"))
            .collect();
        assert_eq!(pages.len(), 3);

        let head = write_chain(&mut space, &pages, PageType::BlobTable, &payload);
        assert_eq!(head, pages[0]);

        let (restored, used) =
            read_chain(&space, head, PageType::BlobTable, payload.len() as u64)
                .expect("read chain");
        assert_eq!(restored, payload);
        assert_eq!(used, pages);
    }

    #[test]
    fn test_empty_chain() {
        let mut space = PageSpace::in_memory(4);
        let head = write_chain(&mut space, &[], PageType::FreePool, &[]);
        assert_eq!(head, 0);
        let (payload, pages) = read_chain(&space, 0, PageType::FreePool, 0).expect("read");
        assert!(payload.is_empty());
        assert!(pages.is_empty());
    }

    #[test]
    fn test_wrong_type_is_corruption() {
        let mut space = PageSpace::in_memory(4);
        let page = space.acquire_page().expect("acquire");
        let head = write_chain(&mut space, &[page], PageType::FreePool, &[5, 6]);

        let result = read_chain(&space, head, PageType::BlobTable, 2);
        assert!(matches!(result, Err(SpaceError::Corruption(_))));
    }

    #[test]
    fn test_length_mismatch_is_corruption() {
        let mut space = PageSpace::in_memory(4);
        let page = space.acquire_page().expect("acquire");
        let head = write_chain(&mut space, &[page], PageType::FreePool, &[5, 6]);

        let result = read_chain(&space, head, PageType::FreePool, 3);
        assert!(matches!(result, Err(SpaceError::Corruption(_))));
    }
}
