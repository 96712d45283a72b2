//! Test closing and reopening file-backed databases.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::tempdir;

use crate::config::DatabaseConfig;
use crate::database::{Database, ErrorKind};
use crate::e2e_tests::helpers::*;
use crate::ontology::{IndexMode, LiteralValue, Symbol, Triple};

#[test]
fn test_graph_survives_reopen() {
    init_tracing();
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("graph.db");
    let mut rng = StdRng::seed_from_u64(42);

    let (symbols, triples, before) = {
        let mut db = Database::create(&path, DatabaseConfig::new()).expect("create");
        let symbols = structural_symbols(&mut db, 20);
        let triples = link_random(&mut db, &mut rng, &symbols, 400);
        let before = snapshot(&mut db, &triples);
        db.close().expect("close");
        (symbols, triples, before)
    };

    let mut db = Database::open(&path, DatabaseConfig::new()).expect("open");
    assert_eq!(snapshot(&mut db, &triples), before);
    let everything: BTreeSet<Triple> = triples.iter().copied().collect();
    assert_eq!(results(&mut db, shape("VVV"), &Triple::default()), everything);
    for symbol in symbols {
        assert!(db.exists(symbol));
    }
}

#[test]
fn test_literals_survive_reopen() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("literals.db");

    let (name, count, freed) = {
        let mut db = Database::create(&path, DatabaseConfig::new()).expect("create");
        let name = db.create_literal("persistent".into()).expect("text");
        let count = db.create_literal(1234u64.into()).expect("natural");
        let freed = db.create_literal("discarded".into()).expect("text");
        db.destroy(freed).expect("destroy");
        db.close().expect("close");
        (name, count, freed)
    };

    let mut db = Database::open(&path, DatabaseConfig::new()).expect("open");
    assert_eq!(
        db.literal(name).expect("decode"),
        Some(LiteralValue::Text("persistent".to_string()))
    );
    assert_eq!(db.literal(count).expect("decode"), Some(LiteralValue::Natural(1234)));
    assert!(!db.exists(freed));
}

#[test]
fn test_drop_flushes() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("dropped.db");

    let fact = {
        let mut db = Database::create(&path, DatabaseConfig::new()).expect("create");
        let s = structural_symbols(&mut db, 3);
        let fact = Triple::new(s[0], s[1], s[2]);
        db.link(&fact).expect("link");
        fact
    };

    let db = Database::open(&path, DatabaseConfig::new()).expect("open");
    assert!(db.contains(&fact).expect("contains"));
}

#[test]
fn test_reopen_in_other_mode_migrates() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("modes.db");
    let mut rng = StdRng::seed_from_u64(3);

    let (patterns, before) = {
        let mut db = Database::create(&path, DatabaseConfig::new()).expect("create");
        let symbols = structural_symbols(&mut db, 10);
        let patterns = link_random(&mut db, &mut rng, &symbols, 100);
        let before = snapshot(&mut db, &patterns);
        db.close().expect("close");
        (patterns, before)
    };

    for mode in [IndexMode::Tri, IndexMode::Mono, IndexMode::Hexa] {
        let config = DatabaseConfig::new().with_index_mode(mode);
        let mut db = Database::open(&path, config).expect("open");
        assert_eq!(db.index_mode(), mode);
        assert_eq!(snapshot(&mut db, &patterns), before, "{mode}");
        db.close().expect("close");
    }
}

#[test]
fn test_free_pages_are_reused_after_reopen() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("pages.db");

    {
        let mut db = Database::create(&path, DatabaseConfig::new()).expect("create");
        let big = db.create_symbol();
        db.set_blob_len(big, 8 * 200_000, 0).expect("grow");
        let keep = db.create_symbol();
        db.set_blob_len(keep, 64, 0).expect("grow");
        db.link(&Triple::new(keep, Symbol::HOLDS, Symbol::ROOT)).expect("link");
        db.destroy(big).expect("destroy");
        db.close().expect("close");
    }

    let mut db = Database::open(&path, DatabaseConfig::new()).expect("open");
    let before = db.stats().expect("stats");
    assert!(before.free_pages > 0);

    // A single-page blob comes from the free pool rather than growing the file.
    let page_sized = db.create_symbol();
    db.set_blob_len(page_sized, 64 * 3000, 0).expect("grow");
    let after = db.stats().expect("stats");
    assert_eq!(after.page_count, before.page_count);
    assert_eq!(after.free_pages, before.free_pages - 1);
}

#[test]
fn test_open_missing_file_fails() {
    let dir = tempdir().expect("create temp dir");
    let err = Database::open(&dir.path().join("absent.db"), DatabaseConfig::new())
        .expect_err("missing");
    assert_eq!(err.kind(), ErrorKind::File);
}
