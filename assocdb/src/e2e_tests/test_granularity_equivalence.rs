//! Test that every query shape answers the same in every index mode.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::database::{Database, ErrorKind};
use crate::e2e_tests::helpers::*;
use crate::ontology::{IndexMode, QueryShape, Symbol, Triple};

/// Build the same random graph, with some triples unlinked again.
fn populate(mode: IndexMode, seed: u64) -> (Database, Vec<Symbol>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut db = new_test_database_in(mode);
    let symbols = structural_symbols(&mut db, 16);
    let triples = link_random(&mut db, &mut rng, &symbols, 300);
    for triple in triples.iter().filter(|_| rng.random_bool(0.2)) {
        db.unlink(triple).expect("unlink");
    }
    (db, symbols)
}

fn random_patterns(seed: u64, symbols: &[Symbol], count: usize) -> Vec<Triple> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut pick = || symbols[rng.random_range(0..symbols.len())];
            Triple::new(pick(), pick(), pick())
        })
        .collect()
}

#[test]
fn test_modes_agree_on_every_shape() {
    init_tracing();
    for seed in [1, 2, 3] {
        let (mut hexa, symbols) = populate(IndexMode::Hexa, seed);
        let (mut tri, _) = populate(IndexMode::Tri, seed);
        let (mut mono, _) = populate(IndexMode::Mono, seed);
        let patterns = random_patterns(seed + 100, &symbols, 12);

        let expected = snapshot(&mut hexa, &patterns);
        assert_eq!(snapshot(&mut tri, &patterns), expected, "tri, seed {seed}");
        assert_eq!(snapshot(&mut mono, &patterns), expected, "mono, seed {seed}");
    }
}

#[test]
fn test_counts_match_callbacks() {
    let (mut db, symbols) = populate(IndexMode::Tri, 9);
    for pattern in random_patterns(19, &symbols, 4) {
        for shape in QueryShape::all().filter(|shape| shape.plan().is_ok()) {
            let mut seen = 0;
            let count = db.query(shape, &pattern, |_| seen += 1).expect("query");
            assert_eq!(count, seen, "{shape}");
            assert_eq!(db.count(shape, &pattern).expect("count"), count, "{shape}");
        }
    }
}

#[test]
fn test_invalid_shapes_fail_in_every_mode() {
    for mode in IndexMode::ALL {
        let mut db = new_test_database_in(mode);
        let invalid: Vec<QueryShape> = QueryShape::all()
            .filter(|shape| shape.plan().is_err())
            .collect();
        assert_eq!(invalid.len(), 7);
        for shape in invalid {
            let err = db.count(shape, &Triple::default()).expect_err("invalid");
            assert_eq!(err.kind(), ErrorKind::InvalidQueryShape, "{mode} {shape}");
        }
    }
}
