//! Common helpers for end-to-end tests.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::rngs::StdRng;

use crate::database::Database;
use crate::ontology::{Literal, QueryShape, Role, Symbol, Triple};

pub use crate::testing::{init_tracing, new_test_database, new_test_database_in, shape};

/// Create one text literal per name.
pub fn text_symbols(db: &mut Database, names: &[&str]) -> Vec<Symbol> {
    names
        .iter()
        .map(|name| db.create_literal(Literal::Text(name)).expect("create literal"))
        .collect()
}

/// Create `count` structural symbols.
pub fn structural_symbols(db: &mut Database, count: usize) -> Vec<Symbol> {
    (0..count).map(|_| db.create_symbol()).collect()
}

/// Link `count` random distinct triples drawn from `symbols`.
///
/// Returns the triples in link order.
pub fn link_random(
    db: &mut Database,
    rng: &mut StdRng,
    symbols: &[Symbol],
    count: usize,
) -> Vec<Triple> {
    let mut linked = Vec::with_capacity(count);
    while linked.len() < count {
        let mut pick = || symbols[rng.random_range(0..symbols.len())];
        let triple = Triple::new(pick(), pick(), pick());
        if db.link(&triple).expect("link") {
            linked.push(triple);
        }
    }
    linked
}

/// Results of one query as a set.
pub fn results(db: &mut Database, shape: QueryShape, pattern: &Triple) -> BTreeSet<Triple> {
    db.collect(shape, pattern)
        .expect("query")
        .into_iter()
        .collect()
}

/// Values returned by an `MMV` query on `(entity, attribute)`.
pub fn values_of(db: &mut Database, entity: Symbol, attribute: Symbol) -> BTreeSet<Symbol> {
    let pattern = Triple::new(entity, attribute, Symbol::VOID);
    results(db, shape("MMV"), &pattern)
        .into_iter()
        .map(|triple| triple.value)
        .collect()
}

/// Results of every valid shape over every pattern, keyed by shape and the
/// pattern's matched positions.
///
/// Patterns that agree on the matched positions give the same results, so
/// they are queried once.
pub fn snapshot(
    db: &mut Database,
    patterns: &[Triple],
) -> BTreeMap<(String, Triple), BTreeSet<Triple>> {
    let mut out = BTreeMap::new();
    for shape in QueryShape::all() {
        if shape.plan().is_err() {
            continue;
        }
        for pattern in patterns {
            let mut key = Triple::default();
            for position in 0..3 {
                if shape.role(position) == Role::Match {
                    key.set(position, pattern.get(position));
                }
            }
            if let Entry::Vacant(slot) = out.entry((shape.to_string(), key)) {
                slot.insert(results(db, shape, &key));
            }
        }
    }
    out
}
