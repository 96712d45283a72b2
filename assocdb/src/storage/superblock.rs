//! Root page structure and serialization.
//!
//! The superblock occupies page 0 and records where everything else lives:
//! the blob table chain, the free-page pool chain, and the identifiers of the
//! top-level index containers.

// PAGE_SIZE is a compile-time constant that fits in u32.
#![allow(clippy::cast_possible_truncation)]

use crate::storage::page::{PAGE_SIZE, PageError, PageId, PageType, seal_page, verify_page};

/// Magic number identifying an assocdb file: "ASSOCDB1"
pub const MAGIC: [u8; 8] = *b"ASSOCDB1";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Page size as u32 for storage in the superblock.
const PAGE_SIZE_U32: u32 = PAGE_SIZE as u32;

/// Superblock field offsets, in words.
mod offsets {
    pub const MAGIC: usize = 1;
    pub const VERSION_AND_PAGE_SIZE: usize = 2;
    pub const PAGE_COUNT: usize = 3;
    pub const IDENTIFIER_COUNT: usize = 4;
    pub const BLOB_TABLE_HEAD: usize = 5;
    pub const BLOB_TABLE_LEN: usize = 6;
    pub const FREE_POOL_HEAD: usize = 7;
    pub const FREE_PAGE_COUNT: usize = 8;
    pub const SYMBOL_INDEX: usize = 9;
    pub const LITERAL_INDEX: usize = 10;
    pub const INDEX_MODE: usize = 11;
}

/// Metadata about the database file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Format version number.
    pub format_version: u32,
    /// Page size in bytes (should always be `PAGE_SIZE`).
    pub page_size: u32,
    /// Total number of pages in the file.
    pub page_count: u64,
    /// Number of blob table entries (one past the highest issued identifier).
    pub identifier_count: u64,
    /// First page of the blob table chain (0 when empty).
    pub blob_table_head: PageId,
    /// Number of entries stored in the blob table chain.
    pub blob_table_len: u64,
    /// First page of the free-page pool chain (0 when empty).
    pub free_pool_head: PageId,
    /// Number of free page references in the pool chain.
    pub free_page_count: u64,
    /// Identifier of the top-level symbol index map.
    pub symbol_index: u64,
    /// Identifier of the content-ordered literal index.
    pub literal_index: u64,
    /// Persisted index granularity.
    pub index_mode: u8,
}

impl Superblock {
    /// Create a superblock for a fresh database.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            page_size: PAGE_SIZE_U32,
            page_count: 1,
            identifier_count: 0,
            blob_table_head: 0,
            blob_table_len: 0,
            free_pool_head: 0,
            free_page_count: 0,
            symbol_index: 0,
            literal_index: 0,
            index_mode: 0,
        }
    }

    /// Serialize the superblock into the root page and seal it.
    pub fn write_to(&self, page: &mut [u64]) {
        page.fill(0);
        page[offsets::MAGIC] = u64::from_le_bytes(MAGIC);
        page[offsets::VERSION_AND_PAGE_SIZE] =
            u64::from(self.format_version) | (u64::from(self.page_size) << 32);
        page[offsets::PAGE_COUNT] = self.page_count;
        page[offsets::IDENTIFIER_COUNT] = self.identifier_count;
        page[offsets::BLOB_TABLE_HEAD] = self.blob_table_head;
        page[offsets::BLOB_TABLE_LEN] = self.blob_table_len;
        page[offsets::FREE_POOL_HEAD] = self.free_pool_head;
        page[offsets::FREE_PAGE_COUNT] = self.free_page_count;
        page[offsets::SYMBOL_INDEX] = self.symbol_index;
        page[offsets::LITERAL_INDEX] = self.literal_index;
        page[offsets::INDEX_MODE] = u64::from(self.index_mode);
        seal_page(page, PageType::Root);
    }

    /// Deserialize and validate a superblock from the root page.
    pub fn read_from(page: &[u64]) -> Result<Self, SuperblockError> {
        let magic = page[offsets::MAGIC].to_le_bytes();
        if magic != MAGIC {
            return Err(SuperblockError::InvalidMagic(magic));
        }

        let version_and_size = page[offsets::VERSION_AND_PAGE_SIZE];
        let format_version = version_and_size as u32;
        if format_version != FORMAT_VERSION {
            return Err(SuperblockError::UnsupportedVersion(format_version));
        }

        let page_size = (version_and_size >> 32) as u32;
        if page_size != PAGE_SIZE_U32 {
            return Err(SuperblockError::InvalidPageSize(page_size));
        }

        verify_page(page, PageType::Root).map_err(SuperblockError::Page)?;

        Ok(Self {
            format_version,
            page_size,
            page_count: page[offsets::PAGE_COUNT],
            identifier_count: page[offsets::IDENTIFIER_COUNT],
            blob_table_head: page[offsets::BLOB_TABLE_HEAD],
            blob_table_len: page[offsets::BLOB_TABLE_LEN],
            free_pool_head: page[offsets::FREE_POOL_HEAD],
            free_page_count: page[offsets::FREE_PAGE_COUNT],
            symbol_index: page[offsets::SYMBOL_INDEX],
            literal_index: page[offsets::LITERAL_INDEX],
            index_mode: (page[offsets::INDEX_MODE] & 0xFF) as u8,
        })
    }
}

impl Default for Superblock {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when reading a superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuperblockError {
    /// Invalid magic number.
    InvalidMagic([u8; 8]),
    /// Unsupported format version.
    UnsupportedVersion(u32),
    /// Invalid page size.
    InvalidPageSize(u32),
    /// Header or checksum did not validate.
    Page(PageError),
}

impl std::fmt::Display for SuperblockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMagic(magic) => {
                write!(
                    f,
                    "invalid magic number: {:?}",
                    String::from_utf8_lossy(magic)
                )
            }
            Self::UnsupportedVersion(v) => write!(f, "unsupported format version: {v}"),
            Self::InvalidPageSize(s) => write!(f, "invalid page size: {s}"),
            Self::Page(e) => write!(f, "root page: {e}"),
        }
    }
}

impl std::error::Error for SuperblockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Page(e) => Some(e),
            _ => None,
        }
    }
}
