//! Test replacing the single value of an entity-attribute pair.

use std::collections::BTreeSet;

use crate::e2e_tests::helpers::*;
use crate::ontology::{Symbol, Triple};

#[test]
fn test_second_value_replaces_first() {
    let mut db = new_test_database();
    let alice = db.create_literal("alice".into()).expect("alice");
    let knows = db.create_literal("knows".into()).expect("knows");
    let people = structural_symbols(&mut db, 2);
    let (bob, carol) = (people[0], people[1]);

    db.set_solitary(&Triple::new(alice, knows, bob), false)
        .expect("set bob");
    assert_eq!(values_of(&mut db, alice, knows), BTreeSet::from([bob]));

    db.set_solitary(&Triple::new(alice, knows, carol), false)
        .expect("set carol");
    assert_eq!(values_of(&mut db, alice, knows), BTreeSet::from([carol]));
    assert_eq!(db.get_solitary(alice, knows).expect("get"), Some(carol));

    // Nothing else referenced bob.
    assert!(!db.exists(bob));
    assert!(db.exists(carol));
}

#[test]
fn test_replaced_value_with_other_references_survives() {
    let mut db = new_test_database();
    let symbols = structural_symbols(&mut db, 5);
    let (alice, knows, bob, carol, likes) = (
        symbols[0], symbols[1], symbols[2], symbols[3], symbols[4],
    );
    db.link(&Triple::new(carol, likes, bob)).expect("link");

    db.set_solitary(&Triple::new(alice, knows, bob), false)
        .expect("set bob");
    db.set_solitary(&Triple::new(alice, knows, carol), false)
        .expect("set carol");

    assert!(db.exists(bob));
    assert_eq!(values_of(&mut db, carol, likes), BTreeSet::from([bob]));
}

#[test]
fn test_setting_same_value_is_idempotent() {
    let mut db = new_test_database();
    let symbols = structural_symbols(&mut db, 3);
    let fact = Triple::new(symbols[0], symbols[1], symbols[2]);

    db.set_solitary(&fact, false).expect("first");
    db.set_solitary(&fact, false).expect("second");
    assert_eq!(db.value_count(fact.entity, fact.attribute).expect("count"), 1);
}

#[test]
fn test_void_clears_pair() {
    let mut db = new_test_database();
    let symbols = structural_symbols(&mut db, 4);
    let (entity, attribute, other) = (symbols[0], symbols[1], symbols[2]);
    db.link(&Triple::new(entity, other, symbols[3])).expect("keep entity");
    db.link(&Triple::new(other, attribute, symbols[3])).expect("keep attribute");
    for value in structural_symbols(&mut db, 3) {
        db.link(&Triple::new(entity, attribute, value)).expect("link");
    }

    db.set_solitary(&Triple::new(entity, attribute, Symbol::VOID), false)
        .expect("clear");
    assert_eq!(db.value_count(entity, attribute).expect("count"), 0);
    assert!(db.exists(entity));

    db.set_solitary(&Triple::new(entity, attribute, Symbol::VOID), true)
        .expect("void value");
    assert_eq!(db.get_solitary(entity, attribute).expect("get"), Some(Symbol::VOID));
}
