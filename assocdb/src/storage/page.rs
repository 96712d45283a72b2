//! Page types and constants for the page space.
//!
//! Pages are 32 KiB and addressed as arrays of little-endian `u64` words.
//! Data pages (slabs and blob extents) carry no header; metadata pages
//! (the root page and chain pages) start with a one-word [`PageHeader`].

/// Page size in bytes (32 KiB).
pub const PAGE_SIZE: usize = 32 * 1024;

/// Page size as u64 for offset calculations.
pub const PAGE_SIZE_U64: u64 = PAGE_SIZE as u64;

/// Number of 64-bit words in a page.
pub const WORDS_PER_PAGE: usize = PAGE_SIZE / 8;

/// Words per page as u64.
pub const WORDS_PER_PAGE_U64: u64 = WORDS_PER_PAGE as u64;

/// Number of addressable bits in a page.
pub const BITS_PER_PAGE: u64 = PAGE_SIZE_U64 * 8;

/// A page identifier (0-indexed page number). Page 0 is the root page.
pub type PageId = u64;

/// Page type identifiers stored in metadata page headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    /// Root page (page 0 only)
    Root = 0x01,
    /// Free-page pool chain page
    FreePool = 0x02,
    /// Blob table chain page
    BlobTable = 0x03,
}

impl TryFrom<u8> for PageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Root),
            0x02 => Ok(Self::FreePool),
            0x03 => Ok(Self::BlobTable),
            _ => Err(value),
        }
    }
}

/// Header stored in word 0 of every metadata page.
///
/// Layout (little-endian within the word):
/// - `page_type`: bits 0-7
/// - `flags`: bits 8-15
/// - `checksum`: bits 16-47 (CRC32)
/// - reserved: bits 48-63
#[derive(Debug, Copy, Clone)]
pub struct PageHeader {
    pub page_type: PageType,
    pub flags: u8,
    pub checksum: u32,
}

impl PageHeader {
    /// Size of the page header in words.
    pub const WORDS: usize = 1;

    /// Usable words in a page after the header.
    pub const USABLE_WORDS: usize = WORDS_PER_PAGE - Self::WORDS;

    const CHECKSUM_MASK: u64 = 0xFFFF_FFFF << 16;

    /// Pack the header into a word.
    #[must_use]
    pub fn to_word(self) -> u64 {
        u64::from(self.page_type as u8)
            | (u64::from(self.flags) << 8)
            | (u64::from(self.checksum) << 16)
    }

    /// Unpack a header word.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_word(word: u64) -> Result<Self, PageError> {
        let page_type =
            PageType::try_from((word & 0xFF) as u8).map_err(PageError::InvalidPageType)?;
        Ok(Self {
            page_type,
            flags: ((word >> 8) & 0xFF) as u8,
            checksum: ((word >> 16) & 0xFFFF_FFFF) as u32,
        })
    }
}

/// Compute the CRC32 of a metadata page, treating the checksum field as zero.
#[must_use]
pub fn page_checksum(words: &[u64]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    if let Some((first, rest)) = words.split_first() {
        hasher.update(&(first & !PageHeader::CHECKSUM_MASK).to_le_bytes());
        for word in rest {
            hasher.update(&word.to_le_bytes());
        }
    }
    hasher.finalize()
}

/// Stamp a metadata page with its header and checksum.
pub fn seal_page(words: &mut [u64], page_type: PageType) {
    words[0] = PageHeader {
        page_type,
        flags: 0,
        checksum: 0,
    }
    .to_word();
    let checksum = page_checksum(words);
    words[0] = PageHeader {
        page_type,
        flags: 0,
        checksum,
    }
    .to_word();
}

/// Validate a metadata page's type and checksum.
pub fn verify_page(words: &[u64], expected: PageType) -> Result<(), PageError> {
    let header = PageHeader::from_word(words[0])?;
    if header.page_type != expected {
        return Err(PageError::UnexpectedPageType {
            expected,
            actual: header.page_type,
        });
    }
    let actual = page_checksum(words);
    if actual != header.checksum {
        return Err(PageError::ChecksumMismatch {
            expected: header.checksum,
            actual,
        });
    }
    Ok(())
}

/// Errors related to page operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// Invalid page type byte.
    InvalidPageType(u8),
    /// A metadata page had a different type than the chain expected.
    UnexpectedPageType { expected: PageType, actual: PageType },
    /// Checksum mismatch.
    ChecksumMismatch { expected: u32, actual: u32 },
}

impl std::fmt::Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPageType(v) => write!(f, "invalid page type: 0x{v:02x}"),
            Self::UnexpectedPageType { expected, actual } => {
                write!(f, "expected {expected:?} page, found {actual:?}")
            }
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for PageError {}
