//! Literal payloads and the content-ordered literal index.
//!
//! A literal symbol stores its payload in its own blob. Typed payloads are
//! tagged with a `(symbol, BLOB_TYPE, type)` triple; raw bytes are untagged.
//! Numbers are stored as eight little-endian bytes, text as UTF-8.

use std::borrow::Cow;

use super::Symbol;
use crate::containers::{BlobSet, ContentOrder};
use crate::storage::{BlobError, BlobStore, Identifier};

/// A payload to store in a literal symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
    Natural(u64),
    Integer(i64),
    Float(f64),
}

impl Literal<'_> {
    /// The `BLOB_TYPE` tag for this payload, if it has one.
    #[must_use]
    pub const fn type_symbol(&self) -> Option<Symbol> {
        match self {
            Self::Text(_) => Some(Symbol::TEXT),
            Self::Bytes(_) => None,
            Self::Natural(_) => Some(Symbol::NATURAL),
            Self::Integer(_) => Some(Symbol::INTEGER),
            Self::Float(_) => Some(Symbol::FLOAT),
        }
    }

    /// Encoded payload.
    #[must_use]
    pub fn to_bytes(&self) -> Cow<'_, [u8]> {
        match *self {
            Self::Text(text) => Cow::Borrowed(text.as_bytes()),
            Self::Bytes(bytes) => Cow::Borrowed(bytes),
            Self::Natural(n) => Cow::Owned(n.to_le_bytes().to_vec()),
            Self::Integer(i) => Cow::Owned(i.to_le_bytes().to_vec()),
            Self::Float(x) => Cow::Owned(x.to_le_bytes().to_vec()),
        }
    }
}

impl<'a> From<&'a str> for Literal<'a> {
    fn from(text: &'a str) -> Self {
        Self::Text(text)
    }
}

impl From<u64> for Literal<'_> {
    fn from(n: u64) -> Self {
        Self::Natural(n)
    }
}

impl From<i64> for Literal<'_> {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Literal<'_> {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

/// A decoded literal payload.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Text(String),
    Bytes(Vec<u8>),
    Natural(u64),
    Integer(i64),
    Float(f64),
}

impl LiteralValue {
    /// Decode `bytes` according to `tag`.
    ///
    /// A payload that does not fit its tag (bad UTF-8, wrong width) decodes
    /// as raw bytes. An empty untagged payload is not a literal.
    #[must_use]
    pub fn decode(tag: Option<Symbol>, bytes: Vec<u8>) -> Option<Self> {
        let word = <[u8; 8]>::try_from(bytes.as_slice()).ok();
        let value = match (tag, word) {
            (Some(Symbol::TEXT), _) => match String::from_utf8(bytes) {
                Ok(text) => Self::Text(text),
                Err(e) => Self::Bytes(e.into_bytes()),
            },
            (Some(Symbol::NATURAL), Some(word)) => Self::Natural(u64::from_le_bytes(word)),
            (Some(Symbol::INTEGER), Some(word)) => Self::Integer(i64::from_le_bytes(word)),
            (Some(Symbol::FLOAT), Some(word)) => Self::Float(f64::from_le_bytes(word)),
            (None, _) if bytes.is_empty() => return None,
            _ => Self::Bytes(bytes),
        };
        Some(value)
    }
}

/// Literal symbols sorted by payload content, for deduplication.
///
/// Members are flagged as interned in the blob table. When a member's blob
/// changes, the store reports it through `take_invalidated` and the caller
/// must [`evict`](Self::evict) it before the next lookup.
#[derive(Debug, Clone, Copy)]
pub struct LiteralIndex {
    members: BlobSet<Symbol, (), ContentOrder>,
}

impl LiteralIndex {
    #[must_use]
    pub fn create(store: &mut BlobStore) -> Self {
        Self {
            members: BlobSet::create(store),
        }
    }

    #[must_use]
    pub const fn open(id: Identifier) -> Self {
        Self {
            members: BlobSet::from_identifier(id),
        }
    }

    #[must_use]
    pub const fn identifier(&self) -> Identifier {
        self.members.identifier()
    }

    pub fn len(&self, store: &BlobStore) -> Result<usize, BlobError> {
        self.members.len(store)
    }

    pub fn is_empty(&self, store: &BlobStore) -> Result<bool, BlobError> {
        self.members.is_empty(store)
    }

    /// A member whose payload equals `candidate`'s.
    pub fn find(&self, store: &BlobStore, candidate: Symbol) -> Result<Option<Symbol>, BlobError> {
        match self.members.find(store, &candidate)? {
            Some(index) => Ok(Some(self.members.key_at(store, index)?)),
            None => Ok(None),
        }
    }

    /// Add `symbol`, flagging it as interned. Returns `false` if an
    /// equal payload is already a member.
    pub fn insert(&self, store: &mut BlobStore, symbol: Symbol) -> Result<bool, BlobError> {
        if !self.members.insert(store, symbol, ())? {
            return Ok(false);
        }
        store.set_interned(symbol.0, true)?;
        Ok(true)
    }

    /// Drop members by identifier without comparing content.
    ///
    /// Returns the number removed.
    pub fn evict(&self, store: &mut BlobStore, ids: &[Identifier]) -> Result<usize, BlobError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut removed = 0;
        for index in (0..self.members.len(store)?).rev() {
            let member = self.members.key_at(store, index)?;
            if ids.contains(&member.0) {
                self.members.remove_at(store, index)?;
                removed += 1;
            }
        }
        tracing::debug!(removed, "evicted modified literals");
        Ok(removed)
    }
}
