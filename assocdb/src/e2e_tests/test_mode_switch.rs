//! Test switching index granularity with a populated database.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::e2e_tests::helpers::*;
use crate::ontology::{IndexMode, Symbol, Triple};

/// Every linked triple as a pattern, plus one whose attribute and value
/// occur in no triple.
fn patterns_for(triples: &[Triple], symbols: &[Symbol]) -> Vec<Triple> {
    let mut patterns = triples.to_vec();
    patterns.push(Triple::new(symbols[0], Symbol::HOLDS, Symbol::ROOT));
    patterns
}

#[test]
fn test_hexa_to_mono_and_back() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(0x5eed_c0de);
    let mut db = new_test_database_in(IndexMode::Hexa);
    let symbols = structural_symbols(&mut db, 40);
    let triples = link_random(&mut db, &mut rng, &symbols, 1000);
    let everything: BTreeSet<Triple> = triples.iter().copied().collect();
    let patterns = patterns_for(&triples, &symbols);

    let hexa = snapshot(&mut db, &patterns);
    assert_eq!(results(&mut db, shape("VVV"), &Triple::default()), everything);

    db.set_index_mode(IndexMode::Mono).expect("to mono");
    assert_eq!(db.index_mode(), IndexMode::Mono);
    assert_eq!(results(&mut db, shape("VVV"), &Triple::default()), everything);
    assert_eq!(snapshot(&mut db, &patterns), hexa);

    db.set_index_mode(IndexMode::Hexa).expect("back to hexa");
    assert_eq!(results(&mut db, shape("VVV"), &Triple::default()), everything);
    assert_eq!(snapshot(&mut db, &patterns), hexa);
}

#[test]
fn test_tri_matches_hexa_on_every_triple() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut db = new_test_database_in(IndexMode::Hexa);
    let symbols = structural_symbols(&mut db, 25);
    let triples = link_random(&mut db, &mut rng, &symbols, 600);
    let patterns = patterns_for(&triples, &symbols);
    let hexa = snapshot(&mut db, &patterns);

    db.set_index_mode(IndexMode::Tri).expect("to tri");
    assert_eq!(snapshot(&mut db, &patterns), hexa);
}

#[test]
fn test_tri_round_trip_keeps_mutations() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut db = new_test_database_in(IndexMode::Tri);
    let symbols = structural_symbols(&mut db, 12);
    let triples = link_random(&mut db, &mut rng, &symbols, 150);

    db.set_index_mode(IndexMode::Hexa).expect("to hexa");
    for triple in triples.iter().take(50) {
        db.unlink(triple).expect("unlink");
    }
    db.set_index_mode(IndexMode::Mono).expect("to mono");
    db.set_index_mode(IndexMode::Tri).expect("to tri");

    for (i, triple) in triples.iter().enumerate() {
        assert_eq!(db.contains(triple).expect("contains"), i >= 50, "{triple}");
    }
}
