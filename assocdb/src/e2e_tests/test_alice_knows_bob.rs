//! Test a single fact between three text literals.

use crate::e2e_tests::helpers::*;
use crate::ontology::{LiteralValue, Symbol, Triple};

#[test]
fn test_alice_knows_bob() {
    let mut db = new_test_database();
    let names = text_symbols(&mut db, &["alice", "knows", "bob"]);
    let (alice, knows, bob) = (names[0], names[1], names[2]);
    let fact = Triple::new(alice, knows, bob);

    assert!(db.link(&fact).expect("link"));
    assert_eq!(db.count(shape("MMM"), &fact).expect("count"), 1);

    let pattern = Triple::new(alice, knows, Symbol::VOID);
    let found = db.collect(shape("MMV"), &pattern).expect("collect");
    assert_eq!(found, vec![fact]);
    assert_eq!(
        db.literal(found[0].value).expect("decode"),
        Some(LiteralValue::Text("bob".to_string()))
    );
}

#[test]
fn test_reverse_lookups() {
    let mut db = new_test_database();
    let names = text_symbols(&mut db, &["alice", "knows", "bob"]);
    let (alice, knows, bob) = (names[0], names[1], names[2]);
    db.link(&Triple::new(alice, knows, bob)).expect("link");

    // Who knows bob?
    let who = results(&mut db, shape("VMM"), &Triple::new(Symbol::VOID, knows, bob));
    assert_eq!(who.len(), 1);
    assert!(who.contains(&Triple::new(alice, knows, bob)));

    // Which relations does alice have, regardless of target?
    let relations = results(&mut db, shape("MVI"), &Triple::new(alice, Symbol::VOID, Symbol::VOID));
    assert_eq!(relations.len(), 1);
    assert_eq!(relations.first().map(|t| t.attribute), Some(knows));
}

#[test]
fn test_duplicate_link_is_reported() {
    let mut db = new_test_database();
    let names = text_symbols(&mut db, &["alice", "knows", "bob"]);
    let fact = Triple::new(names[0], names[1], names[2]);

    assert!(db.link(&fact).expect("link"));
    assert!(!db.link(&fact).expect("relink"));
    assert_eq!(db.count(shape("MMM"), &fact).expect("count"), 1);
}
