//! Test link/unlink round trips and release of unreferenced symbols.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::database::ErrorKind;
use crate::e2e_tests::helpers::*;
use crate::ontology::{IndexMode, Symbol, Triple};

#[test]
fn test_link_then_unlink_in_every_mode() {
    for mode in IndexMode::ALL {
        let mut db = new_test_database_in(mode);
        let mut rng = StdRng::seed_from_u64(11);
        let symbols = structural_symbols(&mut db, 10);
        let mut triples = link_random(&mut db, &mut rng, &symbols, 120);

        for triple in &triples {
            assert_eq!(db.count(shape("MMM"), triple).expect("count"), 1, "{mode} {triple}");
        }

        triples.shuffle(&mut rng);
        for triple in &triples {
            assert!(db.unlink(triple).expect("unlink"), "{mode} {triple}");
            // Released symbols make point queries miss rather than fail.
            assert_eq!(db.count(shape("MMM"), triple).expect("count"), 0, "{mode} {triple}");
        }

        for symbol in symbols {
            assert!(!db.exists(symbol), "{mode} {symbol}");
        }
        assert_eq!(db.stats().expect("stats").index_records, 0);
    }
}

#[test]
fn test_unlink_releases_only_orphans() {
    let mut db = new_test_database();
    let s = structural_symbols(&mut db, 5);
    let first = Triple::new(s[0], s[1], s[2]);
    let second = Triple::new(s[2], s[3], s[4]);
    db.link(&first).expect("link");
    db.link(&second).expect("link");

    db.unlink(&first).expect("unlink");
    assert!(!db.exists(s[0]));
    assert!(!db.exists(s[1]));
    assert!(db.exists(s[2]));

    // Released symbols no longer turn up as anyone's entity.
    let entities = results(&mut db, shape("VII"), &Triple::default());
    assert_eq!(entities.len(), 1);
    assert_eq!(entities.first().map(|t| t.entity), Some(s[2]));
}

#[test]
fn test_release_frees_payload_storage() {
    let mut db = new_test_database();
    let payload = "x".repeat(4096);
    let literal = db.create_literal(payload.as_str().into()).expect("literal");
    let s = structural_symbols(&mut db, 2);
    let fact = Triple::new(s[0], s[1], literal);
    db.link(&fact).expect("link");

    let before = db.stats().expect("stats").payload_bits;
    db.destroy(literal).expect("destroy");
    let after = db.stats().expect("stats").payload_bits;

    assert!(before - after >= 4096 * 8);
    assert!(!db.exists(literal));
    let err = db.read_bytes(literal).expect_err("released");
    assert_eq!(err.kind(), ErrorKind::NonexistentSymbol);
}

#[test]
fn test_reserved_symbols_are_never_released() {
    let mut db = new_test_database();
    let s = structural_symbols(&mut db, 1);
    let fact = Triple::new(s[0], Symbol::HOLDS, Symbol::ROOT);
    db.link(&fact).expect("link");
    db.unlink(&fact).expect("unlink");

    assert!(db.exists(Symbol::HOLDS));
    assert!(db.exists(Symbol::ROOT));
    assert!(!db.exists(s[0]));
}
