//! Symbol identifiers.
//!
//! A symbol is a graph node. Its identifier is also the identifier of its
//! payload blob, so a literal symbol carries its content directly and a
//! structural symbol has an empty blob.

use std::cmp::Ordering;
use std::fmt;

use crate::containers::{ContentOrder, Element, KeyOrder};
use crate::storage::{BlobError, BlobStore, Identifier};

/// A graph node identifier.
///
/// # Invariants
///
/// - Identifiers below [`Symbol::FIRST_USER`] are reserved and never released.
/// - A user symbol's identifier is not reissued while it is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Symbol(pub Identifier);

impl Symbol {
    /// Placeholder for unbound or ignored positions.
    pub const VOID: Self = Self(0);
    /// Ownership edge; the root of existence checks.
    pub const HOLDS: Self = Self(1);
    /// Attribute tagging a literal with its type.
    pub const BLOB_TYPE: Self = Self(2);
    pub const TEXT: Self = Self(3);
    pub const NATURAL: Self = Self(4);
    pub const INTEGER: Self = Self(5);
    pub const FLOAT: Self = Self(6);
    /// Conventional owner of top-level symbols.
    pub const ROOT: Self = Self(7);

    /// First identifier handed out to callers.
    pub const FIRST_USER: Identifier = 8;

    /// Every reserved symbol, in identifier order.
    pub const RESERVED: [Self; 8] = [
        Self::VOID,
        Self::HOLDS,
        Self::BLOB_TYPE,
        Self::TEXT,
        Self::NATURAL,
        Self::INTEGER,
        Self::FLOAT,
        Self::ROOT,
    ];

    #[must_use]
    pub const fn identifier(self) -> Identifier {
        self.0
    }

    #[must_use]
    pub const fn is_reserved(self) -> bool {
        self.0 < Self::FIRST_USER
    }

    #[must_use]
    pub const fn is_void(self) -> bool {
        self.0 == Self::VOID.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::VOID => f.write_str("void"),
            Self::HOLDS => f.write_str("holds"),
            Self::BLOB_TYPE => f.write_str("blob-type"),
            Self::TEXT => f.write_str("text"),
            Self::NATURAL => f.write_str("natural"),
            Self::INTEGER => f.write_str("integer"),
            Self::FLOAT => f.write_str("float"),
            Self::ROOT => f.write_str("root"),
            Self(id) => write!(f, "#{id}"),
        }
    }
}

impl From<Identifier> for Symbol {
    fn from(id: Identifier) -> Self {
        Self(id)
    }
}

impl Element for Symbol {
    const WORDS: usize = 1;

    fn store(&self, out: &mut [u64]) {
        out[0] = self.0;
    }

    fn load(words: &[u64]) -> Self {
        Self(words[0])
    }
}

impl KeyOrder<Symbol> for ContentOrder {
    fn compare(store: &BlobStore, a: &Symbol, b: &Symbol) -> Result<Ordering, BlobError> {
        store.compare(a.0, b.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_range() {
        for (i, symbol) in Symbol::RESERVED.iter().enumerate() {
            assert_eq!(symbol.identifier(), i as u64);
            assert!(symbol.is_reserved());
        }
        assert!(!Symbol(Symbol::FIRST_USER).is_reserved());
    }

    #[test]
    fn test_display() {
        assert_eq!(Symbol::HOLDS.to_string(), "holds");
        assert_eq!(Symbol(42).to_string(), "#42");
    }
}
