//! Database file I/O operations.
//!
//! The page space lives in memory between flushes; this module moves whole
//! pages between the arena and the backing file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::storage::page::{PAGE_SIZE, PAGE_SIZE_U64, PageId, WORDS_PER_PAGE};
use crate::storage::superblock::SuperblockError;

/// A database file handle with page-granular I/O.
#[derive(Debug)]
pub struct DatabaseFile {
    file: File,
    path: PathBuf,
}

impl DatabaseFile {
    /// Create a new, empty database file at the given path.
    ///
    /// Returns an error if the file already exists.
    pub fn create(path: &Path) -> Result<Self, FileError> {
        if path.exists() {
            return Err(FileError::AlreadyExists(path.to_path_buf()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(FileError::Io)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing database file.
    pub fn open(path: &Path) -> Result<Self, FileError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(FileError::Io)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every page of the file into a word vector.
    ///
    /// Fails with `Truncated` if the file is empty or not a whole number of pages.
    pub fn read_all(&mut self) -> Result<Vec<u64>, FileError> {
        let len = self.file.metadata().map_err(FileError::Io)?.len();
        if len == 0 || len % PAGE_SIZE_U64 != 0 {
            return Err(FileError::Truncated { len });
        }

        self.file.seek(SeekFrom::Start(0)).map_err(FileError::Io)?;

        #[allow(clippy::cast_possible_truncation)]
        let pages = (len / PAGE_SIZE_U64) as usize;
        let mut words = Vec::with_capacity(pages * WORDS_PER_PAGE);
        let mut buf = vec![0u8; PAGE_SIZE];
        for _ in 0..pages {
            self.file.read_exact(&mut buf).map_err(FileError::Io)?;
            words.extend(buf.chunks_exact(8).map(|chunk| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                u64::from_le_bytes(bytes)
            }));
        }

        Ok(words)
    }

    /// Write a single page.
    pub fn write_page(&mut self, page_id: PageId, words: &[u64]) -> Result<(), FileError> {
        debug_assert_eq!(words.len(), WORDS_PER_PAGE);
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        for word in words {
            buf.extend_from_slice(&word.to_le_bytes());
        }

        self.file
            .seek(SeekFrom::Start(page_id * PAGE_SIZE_U64))
            .map_err(FileError::Io)?;
        self.file.write_all(&buf).map_err(FileError::Io)
    }

    /// Replace the file contents with the given pages.
    pub fn write_all(&mut self, words: &[u64]) -> Result<(), FileError> {
        let mut page_id = 0;
        for page in words.chunks_exact(WORDS_PER_PAGE) {
            self.write_page(page_id, page)?;
            page_id += 1;
        }
        self.file
            .set_len(page_id * PAGE_SIZE_U64)
            .map_err(FileError::Io)
    }

    /// Sync all pending writes to disk.
    pub fn sync(&self) -> Result<(), FileError> {
        self.file.sync_all().map_err(FileError::Io)
    }
}

/// Errors that can occur during file operations.
#[derive(Debug)]
pub enum FileError {
    /// I/O error.
    Io(std::io::Error),
    /// File already exists.
    AlreadyExists(PathBuf),
    /// File length is zero or not a multiple of the page size.
    Truncated { len: u64 },
    /// Superblock error.
    Superblock(SuperblockError),
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::AlreadyExists(p) => write!(f, "file already exists: {}", p.display()),
            Self::Truncated { len } => {
                write!(f, "file length {len} is not a whole number of pages")
            }
            Self::Superblock(e) => write!(f, "superblock error: {e}"),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Superblock(e) => Some(e),
            Self::AlreadyExists(_) | Self::Truncated { .. } => None,
        }
    }
}

impl From<SuperblockError> for FileError {
    fn from(e: SuperblockError) -> Self {
        Self::Superblock(e)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn file_pages(path: &Path) -> u64 {
        std::fs::metadata(path).expect("metadata").len() / PAGE_SIZE_U64
    }

    #[test]
    fn test_create_fails_if_exists() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.db");

        let _file = DatabaseFile::create(&path).expect("create");
        let result = DatabaseFile::create(&path);
        assert!(matches!(result, Err(FileError::AlreadyExists(_))));
    }

    #[test]
    fn test_write_and_read_pages() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.db");

        let mut words = vec![0u64; WORDS_PER_PAGE * 3];
        words[0] = 7;
        words[WORDS_PER_PAGE * 2 + 5] = u64::MAX;

        {
            let mut file = DatabaseFile::create(&path).expect("create");
            file.write_all(&words).expect("write");
            file.sync().expect("sync");
            assert_eq!(file_pages(&path), 3);
        }

        let mut file = DatabaseFile::open(&path).expect("open");
        assert_eq!(file.read_all().expect("read"), words);
    }

    #[test]
    fn test_write_all_shrinks_file() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.db");
        let mut file = DatabaseFile::create(&path).expect("create");

        file.write_all(&vec![1u64; WORDS_PER_PAGE * 4]).expect("write");
        file.write_all(&vec![2u64; WORDS_PER_PAGE]).expect("write");
        assert_eq!(file_pages(&path), 1);
    }

    #[test]
    fn test_empty_file_is_truncated() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.db");
        let mut file = DatabaseFile::create(&path).expect("create");

        assert!(matches!(
            file.read_all(),
            Err(FileError::Truncated { len: 0 })
        ));
    }
}
