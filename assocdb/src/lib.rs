// Layers, bottom up:
//  - storage: bit primitives, page arena, blob store, persistence
//  - containers: sorted vectors, sets and maps stored as blobs
//  - ontology: symbols, triples, the multi-orientation index, queries, GC
//  - database: the owned context tying them together
//
// Life of a link:
// 1. The triple's symbols are checked for liveness
// 2. Each active orientation inserts the gamma key under alpha and beta
// 3. Records and nested sets grow blobs, which grow the page arena

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod containers;
pub mod database;
pub mod ontology;
pub mod storage;

mod e2e_tests;
#[cfg(test)]
mod testing;

pub use config::{ConfigError, DatabaseConfig};
pub use database::{Database, DatabaseError, DatabaseStats, ErrorKind};
pub use ontology::{IndexMode, Literal, LiteralValue, QueryShape, Role, Symbol, Triple};
