//! Storage engine: a page-backed address space holding variable-length blobs.
//!
//! # Layering
//!
//! - [`bits`]: bit-granular read, write, move and compare over word slices
//! - [`space`]: a growable arena of fixed-size pages with a free list
//! - [`slab`]: power-of-two slot allocation inside pages
//! - [`blob`]: identifiers mapped to resizable bit strings
//!
//! # File Format
//!
//! The database is a single file of 32 KiB pages:
//!
//! - Page 0: superblock (format, chain heads, index roots)
//! - Blob table chain: size, address and flags for every identifier
//! - Free pool chain: ids of free pages, threaded through the free pages
//! - All other pages: slab pages and page runs holding blob content

pub mod bits;
mod blob;
mod chain;
mod file;
mod page;
mod slab;
mod space;
mod superblock;

pub use blob::{BlobError, BlobStore, Identifier, capacity_words};
pub use file::{DatabaseFile, FileError};
pub use page::{PAGE_SIZE, PageError, PageHeader, PageId, PageType, WORDS_PER_PAGE};
pub use space::{PageSpace, SpaceError};
pub use superblock::{Superblock, SuperblockError};
