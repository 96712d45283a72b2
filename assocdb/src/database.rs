//! High-level database interface.
//!
//! A [`Database`] owns the blob store, the triple index and the literal
//! index, and exposes the primitives the layers above build on: create and
//! destroy symbols, link and unlink triples, and query by pattern.
//!
//! # Durability
//!
//! File-backed databases are written out on [`Database::flush`], on
//! [`Database::close`] and (best effort) on drop. There is no write-ahead
//! log: a crash loses everything since the last flush, and a failure in the
//! middle of an operation can leave some orientations updated and others
//! not.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, DatabaseConfig};
use crate::ontology::{
    IndexError, IndexMode, Literal, LiteralIndex, LiteralValue, QueryShape, Symbol, Triple,
    TripleIndex,
};
use crate::storage::{
    BlobError, BlobStore, FileError, PageSpace, SpaceError, Superblock, SuperblockError,
};

/// An associative database instance.
#[derive(Debug)]
pub struct Database {
    store: BlobStore,
    index: TripleIndex,
    literals: LiteralIndex,
    path: Option<PathBuf>,
    closed: bool,
}

/// Size and shape counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    pub page_count: u64,
    pub free_pages: u64,
    pub live_blobs: u64,
    pub payload_bits: u64,
    pub index_records: u64,
    pub interned_literals: u64,
    pub index_mode: IndexMode,
}

impl Database {
    /// Create a database that lives only in memory.
    #[must_use]
    pub fn in_memory(config: DatabaseConfig) -> Self {
        Self::initialize(PageSpace::in_memory(config.max_pages), config, None)
    }

    /// Create a new database at the given path.
    ///
    /// The path must not already exist.
    pub fn create(path: &Path, config: DatabaseConfig) -> Result<Self, DatabaseError> {
        let space = PageSpace::create(path, config.max_pages)?;
        let mut db = Self::initialize(space, config, Some(path.to_path_buf()));
        db.flush()?;
        tracing::info!(path = %path.display(), mode = %config.index_mode, "created database");
        Ok(db)
    }

    /// Open an existing database at the given path.
    ///
    /// If the stored index mode differs from `config.index_mode`, the index
    /// is migrated.
    pub fn open(path: &Path, config: DatabaseConfig) -> Result<Self, DatabaseError> {
        let space = PageSpace::open(path, config.max_pages)?;
        let superblock = Superblock::read_from(space.page(0)).map_err(FileError::from)?;
        if superblock.page_count > config.max_pages {
            tracing::warn!(
                pages = superblock.page_count,
                max_pages = config.max_pages,
                "database exceeds the configured page limit; it cannot grow"
            );
        }
        let mut store = BlobStore::load(space, &superblock)?;

        let stored_mode = IndexMode::from_u8(superblock.index_mode).ok_or_else(|| {
            DatabaseError::Corruption(format!("unknown index mode {}", superblock.index_mode))
        })?;
        let roots = Symbol::RESERVED
            .into_iter()
            .map(|s| s.0)
            .chain([superblock.symbol_index, superblock.literal_index]);
        for id in roots {
            if !store.is_live(id) {
                return Err(DatabaseError::Corruption(format!(
                    "root identifier {id} is not live"
                )));
            }
        }

        let mut index = TripleIndex::open(superblock.symbol_index, stored_mode);
        if stored_mode != config.index_mode {
            index.set_mode(&mut store, config.index_mode)?;
        }

        tracing::info!(
            path = %path.display(),
            pages = superblock.page_count,
            mode = %index.mode(),
            "opened database"
        );
        Ok(Self {
            store,
            index,
            literals: LiteralIndex::open(superblock.literal_index),
            path: Some(path.to_path_buf()),
            closed: false,
        })
    }

    /// Open an existing database or create a new one if it doesn't exist.
    pub fn open_or_create(path: &Path, config: DatabaseConfig) -> Result<Self, DatabaseError> {
        if path.exists() {
            Self::open(path, config)
        } else {
            Self::create(path, config)
        }
    }

    fn initialize(space: PageSpace, config: DatabaseConfig, path: Option<PathBuf>) -> Self {
        let mut store = BlobStore::new(space);
        for _ in Symbol::RESERVED {
            store.create_identifier();
        }
        let index = TripleIndex::create(&mut store, config.index_mode);
        let literals = LiteralIndex::create(&mut store);
        Self {
            store,
            index,
            literals,
            path,
            closed: false,
        }
    }

    /// Write every page to the backing file. Does nothing in memory.
    pub fn flush(&mut self) -> Result<(), DatabaseError> {
        self.evict_modified_literals()?;
        if !self.store.space().is_persistent() {
            return Ok(());
        }

        let mut superblock = Superblock::new();
        superblock.symbol_index = self.index.identifier();
        superblock.literal_index = self.literals.identifier();
        superblock.index_mode = self.index.mode().to_u8();
        self.store.checkpoint(&mut superblock)?;

        tracing::info!(
            path = ?self.path,
            pages = superblock.page_count,
            identifiers = superblock.identifier_count,
            "flushed database"
        );
        Ok(())
    }

    /// Flush and close the database.
    pub fn close(mut self) -> Result<(), DatabaseError> {
        self.flush()?;
        self.closed = true;
        tracing::info!(path = ?self.path, "closed database");
        Ok(())
    }

    // Symbols and triples

    /// Create a structural symbol with an empty payload.
    pub fn create_symbol(&mut self) -> Symbol {
        Symbol(self.store.create_identifier())
    }

    /// Create a symbol and link `(symbol, attribute, value)` for each pair.
    pub fn create_symbol_with(
        &mut self,
        pairs: &[(Symbol, Symbol)],
    ) -> Result<Symbol, DatabaseError> {
        let symbol = self.create_symbol();
        for &(attribute, value) in pairs {
            self.link(&Triple::new(symbol, attribute, value))?;
        }
        Ok(symbol)
    }

    /// Create a symbol carrying `literal` as its payload.
    pub fn create_literal(&mut self, literal: Literal<'_>) -> Result<Symbol, DatabaseError> {
        let symbol = self.create_symbol();
        if let Err(e) = self.write_literal(symbol, literal) {
            self.discard(symbol);
            return Err(e);
        }
        Ok(symbol)
    }

    fn write_literal(&mut self, symbol: Symbol, literal: Literal<'_>) -> Result<(), DatabaseError> {
        self.store.write_bytes(symbol.0, &literal.to_bytes())?;
        if let Some(tag) = literal.type_symbol() {
            self.index
                .link(&mut self.store, &Triple::new(symbol, Symbol::BLOB_TYPE, tag))?;
        }
        Ok(())
    }

    /// Create a symbol whose payload is `length` bits of `src` at `offset`.
    pub fn create_from_slice(
        &mut self,
        src: Symbol,
        offset: u64,
        length: u64,
    ) -> Result<Symbol, DatabaseError> {
        let size = self.store.size(src.0)?;
        if offset.checked_add(length).is_none_or(|end| end > size) {
            return Err(DatabaseError::OutOfRange {
                symbol: src,
                offset,
                length,
                size,
            });
        }
        let symbol = self.create_symbol();
        if let Err(e) = self.store.set_size(symbol.0, length, 0) {
            self.discard(symbol);
            return Err(e.into());
        }
        self.store.slice(symbol.0, src.0, 0, offset, length)?;
        Ok(symbol)
    }

    /// Drop a symbol whose construction failed part way.
    fn discard(&mut self, symbol: Symbol) {
        if let Err(e) = self.index.destroy(&mut self.store, symbol) {
            tracing::warn!(%symbol, error = %e, "failed to release partially created symbol");
        }
    }

    /// Add a triple. Returns `false` if it was already present.
    pub fn link(&mut self, triple: &Triple) -> Result<bool, DatabaseError> {
        Ok(self.index.link(&mut self.store, triple)?)
    }

    /// Add a triple that must not already exist.
    pub fn link_unique(&mut self, triple: &Triple) -> Result<(), DatabaseError> {
        if self.link(triple)? {
            Ok(())
        } else {
            Err(DatabaseError::AlreadyLinked(*triple))
        }
    }

    /// Remove a triple, releasing symbols it leaves unreferenced. Returns
    /// `false` if it was not present.
    pub fn unlink(&mut self, triple: &Triple) -> Result<bool, DatabaseError> {
        Ok(self.index.unlink(&mut self.store, triple)?)
    }

    /// Remove a triple that must exist.
    pub fn unlink_existing(&mut self, triple: &Triple) -> Result<(), DatabaseError> {
        if self.unlink(triple)? {
            Ok(())
        } else {
            Err(DatabaseError::AlreadyUnlinked(*triple))
        }
    }

    /// Remove every value of `(entity, attribute)`; returns how many.
    pub fn unlink_pair(&mut self, entity: Symbol, attribute: Symbol) -> Result<u64, DatabaseError> {
        Ok(self.index.unlink_pair(&mut self.store, entity, attribute)?)
    }

    /// Remove every triple mentioning `symbol` and release it.
    pub fn destroy(&mut self, symbol: Symbol) -> Result<bool, DatabaseError> {
        Ok(self.index.destroy(&mut self.store, symbol)?)
    }

    pub fn contains(&self, triple: &Triple) -> Result<bool, DatabaseError> {
        Ok(self.index.contains(&self.store, triple)?)
    }

    /// Whether `symbol` is currently allocated.
    #[must_use]
    pub fn exists(&self, symbol: Symbol) -> bool {
        self.store.is_live(symbol.0)
    }

    // Queries

    /// Run a pattern query, calling `callback` once per result.
    ///
    /// The database stays borrowed for the duration; collect results first
    /// to mutate based on them.
    pub fn query(
        &mut self,
        shape: QueryShape,
        pattern: &Triple,
        mut callback: impl FnMut(Triple),
    ) -> Result<u64, DatabaseError> {
        Ok(self
            .index
            .query(&mut self.store, shape, pattern, Some(&mut callback))?)
    }

    /// Number of results a query would report.
    pub fn count(&mut self, shape: QueryShape, pattern: &Triple) -> Result<u64, DatabaseError> {
        Ok(self.index.query(&mut self.store, shape, pattern, None)?)
    }

    pub fn collect(
        &mut self,
        shape: QueryShape,
        pattern: &Triple,
    ) -> Result<Vec<Triple>, DatabaseError> {
        Ok(self.index.collect(&mut self.store, shape, pattern)?)
    }

    // Lifecycle

    /// Make `triple.value` the only value of its entity and attribute.
    pub fn set_solitary(&mut self, triple: &Triple, allow_void: bool) -> Result<(), DatabaseError> {
        Ok(self.index.set_solitary(&mut self.store, triple, allow_void)?)
    }

    pub fn get_solitary(
        &mut self,
        entity: Symbol,
        attribute: Symbol,
    ) -> Result<Option<Symbol>, DatabaseError> {
        Ok(self.index.get_solitary(&mut self.store, entity, attribute)?)
    }

    pub fn value_count(&mut self, entity: Symbol, attribute: Symbol) -> Result<u64, DatabaseError> {
        Ok(self.index.value_count(&mut self.store, entity, attribute)?)
    }

    /// Destroy `symbol` and its Holds descendants unless something holds
    /// them. Returns the number destroyed.
    pub fn scrutinize_existence(&mut self, symbol: Symbol) -> Result<u64, DatabaseError> {
        Ok(self.index.scrutinize_existence(&mut self.store, symbol)?)
    }

    #[must_use]
    pub const fn index_mode(&self) -> IndexMode {
        self.index.mode()
    }

    /// Migrate the index to another granularity.
    pub fn set_index_mode(&mut self, mode: IndexMode) -> Result<(), DatabaseError> {
        Ok(self.index.set_mode(&mut self.store, mode)?)
    }

    // Payloads

    pub fn blob_len(&self, symbol: Symbol) -> Result<u64, DatabaseError> {
        Ok(self.store.size(symbol.0)?)
    }

    /// Resize a payload, keeping at most `preserve` leading bits.
    pub fn set_blob_len(
        &mut self,
        symbol: Symbol,
        bits: u64,
        preserve: u64,
    ) -> Result<(), DatabaseError> {
        Ok(self.store.set_size(symbol.0, bits, preserve)?)
    }

    /// Read up to 64 payload bits.
    pub fn read_bits(&self, symbol: Symbol, offset: u64, length: u64) -> Result<u64, DatabaseError> {
        Ok(self.store.read(symbol.0, offset, length)?)
    }

    /// Write up to 64 payload bits.
    pub fn write_bits(
        &mut self,
        symbol: Symbol,
        offset: u64,
        length: u64,
        value: u64,
    ) -> Result<(), DatabaseError> {
        Ok(self.store.write(symbol.0, offset, length, value)?)
    }

    /// Open a zeroed gap of `length` bits at `at`.
    pub fn insert_bits(&mut self, symbol: Symbol, at: u64, length: u64) -> Result<(), DatabaseError> {
        Ok(self.store.insert(symbol.0, at, length)?)
    }

    /// Remove `length` bits at `at`.
    pub fn erase_bits(&mut self, symbol: Symbol, at: u64, length: u64) -> Result<(), DatabaseError> {
        Ok(self.store.erase(symbol.0, at, length)?)
    }

    /// Copy bits between two payloads.
    pub fn slice(
        &mut self,
        dst: Symbol,
        src: Symbol,
        dst_offset: u64,
        src_offset: u64,
        length: u64,
    ) -> Result<(), DatabaseError> {
        Ok(self
            .store
            .slice(dst.0, src.0, dst_offset, src_offset, length)?)
    }

    /// Size-then-content comparison of two payloads.
    pub fn compare(&self, a: Symbol, b: Symbol) -> Result<Ordering, DatabaseError> {
        Ok(self.store.compare(a.0, b.0)?)
    }

    /// Overwrite `dst`'s payload with a copy of `src`'s.
    pub fn clone_blob(&mut self, dst: Symbol, src: Symbol) -> Result<(), DatabaseError> {
        Ok(self.store.clone_blob(dst.0, src.0)?)
    }

    pub fn read_bytes(&self, symbol: Symbol) -> Result<Vec<u8>, DatabaseError> {
        Ok(self.store.to_bytes(symbol.0)?)
    }

    // Literals

    fn type_tag(&mut self, symbol: Symbol) -> Result<Option<Symbol>, DatabaseError> {
        self.get_solitary(symbol, Symbol::BLOB_TYPE)
    }

    /// Decode a symbol's payload. `None` for structural symbols.
    pub fn literal(&mut self, symbol: Symbol) -> Result<Option<LiteralValue>, DatabaseError> {
        let bytes = self.read_bytes(symbol)?;
        let tag = self.type_tag(symbol)?;
        Ok(LiteralValue::decode(tag, bytes))
    }

    /// Replace a symbol's payload and type tag.
    pub fn overwrite_literal(
        &mut self,
        symbol: Symbol,
        literal: Literal<'_>,
    ) -> Result<(), DatabaseError> {
        self.store.write_bytes(symbol.0, &literal.to_bytes())?;
        match literal.type_symbol() {
            Some(tag) => {
                self.set_solitary(&Triple::new(symbol, Symbol::BLOB_TYPE, tag), false)?;
            }
            None => {
                for tag in self.index.values(&mut self.store, symbol, Symbol::BLOB_TYPE)? {
                    self.index.unlink_without_releasing(
                        &mut self.store,
                        &Triple::new(symbol, Symbol::BLOB_TYPE, tag),
                    )?;
                }
            }
        }
        Ok(())
    }

    fn evict_modified_literals(&mut self) -> Result<(), DatabaseError> {
        let invalidated = self.store.take_invalidated();
        self.literals.evict(&mut self.store, &invalidated)?;
        Ok(())
    }

    /// Deduplicate a literal by content.
    ///
    /// If an equal payload of the same type is already interned, `symbol` is
    /// destroyed and the interned symbol returned. Otherwise `symbol` joins
    /// the literal index, unless an equal payload of another type holds its
    /// place, in which case it is returned as is.
    pub fn intern_literal(&mut self, symbol: Symbol) -> Result<Symbol, DatabaseError> {
        self.evict_modified_literals()?;
        if !self.exists(symbol) {
            return Err(DatabaseError::NonexistentSymbol(symbol));
        }
        if self.store.is_interned(symbol.0) {
            return Ok(symbol);
        }

        let Some(existing) = self.literals.find(&self.store, symbol)? else {
            self.literals.insert(&mut self.store, symbol)?;
            return Ok(symbol);
        };
        if self.type_tag(existing)? != self.type_tag(symbol)? {
            return Ok(symbol);
        }
        self.destroy(symbol)?;
        Ok(existing)
    }

    /// Look up an interned literal by payload and type.
    pub fn find_literal(&mut self, literal: Literal<'_>) -> Result<Option<Symbol>, DatabaseError> {
        self.evict_modified_literals()?;
        let scratch = self.store.create_identifier();
        let found = self
            .store
            .write_bytes(scratch, &literal.to_bytes())
            .and_then(|()| self.literals.find(&self.store, Symbol(scratch)));
        self.store.release_identifier(scratch)?;

        let Some(existing) = found? else {
            return Ok(None);
        };
        Ok((self.type_tag(existing)? == literal.type_symbol()).then_some(existing))
    }

    pub fn stats(&self) -> Result<DatabaseStats, DatabaseError> {
        let space = self.store.space();
        Ok(DatabaseStats {
            page_count: space.page_count(),
            free_pages: space.free_pages().len() as u64,
            live_blobs: self.store.live_count(),
            payload_bits: self.store.payload_bits(),
            index_records: self.index.record_count(&self.store)? as u64,
            interned_literals: self.literals.len(&self.store)? as u64,
            index_mode: self.index.mode(),
        })
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.closed || !self.store.space().is_persistent() {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::error!(error = %e, path = ?self.path, "failed to flush database on drop");
        }
    }
}

/// Plain classification of a [`DatabaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NonexistentSymbol,
    AlreadyLinked,
    AlreadyUnlinked,
    InvalidQueryShape,
    OutOfRange,
    ResourceExhausted,
    File,
    Corruption,
    Config,
}

/// Errors that can occur during database operations.
#[derive(Debug)]
pub enum DatabaseError {
    /// The symbol was never created or has been released.
    NonexistentSymbol(Symbol),
    /// A strict link found the triple already present.
    AlreadyLinked(Triple),
    /// A strict unlink found the triple absent.
    AlreadyUnlinked(Triple),
    /// The query shape has no search routine.
    InvalidQueryShape(QueryShape),
    /// A payload access reached past its size.
    OutOfRange {
        symbol: Symbol,
        offset: u64,
        length: u64,
        size: u64,
    },
    /// The page space hit its configured limit.
    ResourceExhausted { requested: u64, max_pages: u64 },
    /// File I/O error.
    File(FileError),
    /// Persisted state is inconsistent.
    Corruption(String),
    /// Configuration error.
    Config(ConfigError),
}

impl DatabaseError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NonexistentSymbol(_) => ErrorKind::NonexistentSymbol,
            Self::AlreadyLinked(_) => ErrorKind::AlreadyLinked,
            Self::AlreadyUnlinked(_) => ErrorKind::AlreadyUnlinked,
            Self::InvalidQueryShape(_) => ErrorKind::InvalidQueryShape,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            Self::File(_) => ErrorKind::File,
            Self::Corruption(_) => ErrorKind::Corruption,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonexistentSymbol(symbol) => write!(f, "symbol {symbol} does not exist"),
            Self::AlreadyLinked(triple) => write!(f, "triple {triple} is already linked"),
            Self::AlreadyUnlinked(triple) => write!(f, "triple {triple} is not linked"),
            Self::InvalidQueryShape(shape) => write!(f, "invalid query shape {shape}"),
            Self::OutOfRange {
                symbol,
                offset,
                length,
                size,
            } => write!(
                f,
                "access of {length} bits at {offset} is out of range for {symbol} of {size} bits"
            ),
            Self::ResourceExhausted {
                requested,
                max_pages,
            } => write!(
                f,
                "resource exhausted: {requested} pages requested, limit is {max_pages}"
            ),
            Self::File(e) => write!(f, "file error: {e}"),
            Self::Corruption(msg) => write!(f, "corrupt database: {msg}"),
            Self::Config(e) => write!(f, "configuration error: {e}"),
        }
    }
}

impl std::error::Error for DatabaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::File(e) => Some(e),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FileError> for DatabaseError {
    fn from(e: FileError) -> Self {
        Self::File(e)
    }
}

impl From<SuperblockError> for DatabaseError {
    fn from(e: SuperblockError) -> Self {
        Self::File(FileError::from(e))
    }
}

impl From<ConfigError> for DatabaseError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<SpaceError> for DatabaseError {
    fn from(e: SpaceError) -> Self {
        match e {
            SpaceError::Exhausted {
                requested,
                max_pages,
            } => Self::ResourceExhausted {
                requested,
                max_pages,
            },
            SpaceError::File(e) => Self::File(e),
            SpaceError::Corruption(msg) => Self::Corruption(msg),
        }
    }
}

impl From<BlobError> for DatabaseError {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::NonexistentBlob(id) => Self::NonexistentSymbol(Symbol(id)),
            BlobError::OutOfRange {
                id,
                offset,
                length,
                size,
            } => Self::OutOfRange {
                symbol: Symbol(id),
                offset,
                length,
                size,
            },
            BlobError::Space(e) => Self::from(e),
        }
    }
}

impl From<IndexError> for DatabaseError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::NonexistentSymbol(symbol) => Self::NonexistentSymbol(symbol),
            IndexError::InvalidQueryShape(shape) => Self::InvalidQueryShape(shape),
            IndexError::Blob(e) => Self::from(e),
        }
    }
}
