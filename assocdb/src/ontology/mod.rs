//! The association graph: symbols, triples and the multi-orientation index.
//!
//! # Index Layout
//!
//! ```text
//! records: Set<Symbol, SubIndices>          one record per participating symbol
//!   SubIndices[orientation] -> Map<beta, gamma set id>
//!     gamma set -> Set<Symbol>
//! ```
//!
//! Every level is a [`BlobSet`](crate::containers::BlobSet); there is no other
//! data structure. A triple `(e, a, v)` is present in orientation `EAV` as
//! `records[e].EAV[a] ∋ v`, in `AVE` as `records[a].AVE[v] ∋ e`, and so on.

mod index;
mod lifecycle;
mod literal;
mod query;
mod symbol;
mod triple;

pub use index::{SubIndices, TripleIndex};
pub use literal::{Literal, LiteralIndex, LiteralValue};
pub use query::{Plan, QueryShape, Role, Strategy};
pub use symbol::Symbol;
pub use triple::{ATTRIBUTE, ENTITY, IndexMode, Orientation, Triple, VALUE};

use crate::storage::BlobError;

/// Errors from index operations.
#[derive(Debug)]
pub enum IndexError {
    /// A triple named a symbol that is not live.
    NonexistentSymbol(Symbol),
    /// The query shape has no search routine.
    InvalidQueryShape(QueryShape),
    /// The underlying blob store failed.
    Blob(BlobError),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonexistentSymbol(symbol) => write!(f, "symbol {symbol} does not exist"),
            Self::InvalidQueryShape(shape) => write!(f, "invalid query shape {shape}"),
            Self::Blob(e) => write!(f, "blob error: {e}"),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Blob(e) => Some(e),
            Self::NonexistentSymbol(_) | Self::InvalidQueryShape(_) => None,
        }
    }
}

impl From<BlobError> for IndexError {
    fn from(e: BlobError) -> Self {
        Self::Blob(e)
    }
}
