//! Test content-based deduplication of literals.

use crate::e2e_tests::helpers::*;
use crate::ontology::{Literal, LiteralValue, Symbol, Triple};

#[test]
fn test_equal_literals_collapse() {
    let mut db = new_test_database();
    let first = db.create_literal("apple".into()).expect("literal");
    let first = db.intern_literal(first).expect("intern");

    let second = db.create_literal("apple".into()).expect("literal");
    assert_ne!(first, second);
    assert_eq!(db.intern_literal(second).expect("intern"), first);
    assert!(!db.exists(second));

    assert_eq!(db.find_literal("apple".into()).expect("find"), Some(first));
    assert_eq!(db.find_literal("pear".into()).expect("find"), None);
    assert_eq!(db.stats().expect("stats").interned_literals, 1);
}

#[test]
fn test_same_bytes_other_type_stay_apart() {
    let mut db = new_test_database();
    let natural = db.create_literal(Literal::Natural(7)).expect("natural");
    let natural = db.intern_literal(natural).expect("intern");

    let raw = db
        .create_literal(Literal::Bytes(&7u64.to_le_bytes()))
        .expect("bytes");
    assert_eq!(db.intern_literal(raw).expect("intern"), raw);
    assert!(db.exists(raw));

    assert_eq!(db.find_literal(Literal::Natural(7)).expect("find"), Some(natural));
    assert_eq!(db.find_literal(Literal::Integer(7)).expect("find"), None);
}

#[test]
fn test_modified_literal_leaves_index() {
    let mut db = new_test_database();
    let word = db.create_literal("before".into()).expect("literal");
    db.intern_literal(word).expect("intern");
    assert_eq!(db.find_literal("before".into()).expect("find"), Some(word));

    db.overwrite_literal(word, "after".into()).expect("overwrite");
    assert_eq!(db.find_literal("before".into()).expect("find"), None);
    assert_eq!(db.find_literal("after".into()).expect("find"), None);
    assert_eq!(
        db.literal(word).expect("decode"),
        Some(LiteralValue::Text("after".to_string()))
    );

    // Interning again picks up the new content.
    assert_eq!(db.intern_literal(word).expect("intern"), word);
    assert_eq!(db.find_literal("after".into()).expect("find"), Some(word));
}

#[test]
fn test_released_literal_leaves_index() {
    let mut db = new_test_database();
    let s = structural_symbols(&mut db, 2);
    let word = db.create_literal("transient".into()).expect("literal");
    let word = db.intern_literal(word).expect("intern");
    let fact = Triple::new(s[0], s[1], word);
    db.link(&fact).expect("link");

    db.destroy(word).expect("destroy");
    assert_eq!(db.find_literal("transient".into()).expect("find"), None);

    // The freed identifier may be handed out again without confusing lookups.
    let fresh = db.create_literal("transient".into()).expect("literal");
    assert_eq!(db.intern_literal(fresh).expect("intern"), fresh);
    assert_eq!(db.find_literal("transient".into()).expect("find"), Some(fresh));
    assert_eq!(db.stats().expect("stats").interned_literals, 1);
}

#[test]
fn test_literals_sort_by_content_not_identifier() {
    let mut db = new_test_database();
    let words = ["pear", "fig", "apple", "kiwi"];
    let symbols = text_symbols(&mut db, &words);
    for &symbol in &symbols {
        db.intern_literal(symbol).expect("intern");
    }

    let mut by_content = symbols.clone();
    by_content.sort_by(|&a, &b| db.compare(a, b).expect("compare"));
    let decoded: Vec<String> = by_content
        .iter()
        .map(|&symbol| match db.literal(symbol).expect("decode") {
            Some(LiteralValue::Text(text)) => text,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    // Shorter payloads first, then bytewise.
    assert_eq!(decoded, ["fig", "kiwi", "pear", "apple"]);
    assert!(symbols.iter().all(|&symbol| symbol.0 >= Symbol::FIRST_USER));
}
