//! Test bit-level payload edits through symbols.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::database::{Database, ErrorKind};
use crate::e2e_tests::helpers::*;
use crate::ontology::Symbol;

fn read_all(db: &Database, symbol: Symbol) -> Vec<bool> {
    let len = db.blob_len(symbol).expect("len");
    (0..len)
        .map(|i| db.read_bits(symbol, i, 1).expect("read") == 1)
        .collect()
}

fn write_all(db: &mut Database, symbol: Symbol, bits: &[bool]) {
    db.set_blob_len(symbol, bits.len() as u64, 0).expect("resize");
    for (i, &bit) in bits.iter().enumerate() {
        db.write_bits(symbol, i as u64, 1, u64::from(bit)).expect("write");
    }
}

#[test]
fn test_insert_then_erase_is_identity() {
    let mut rng = StdRng::seed_from_u64(0xb175);
    let mut db = new_test_database();
    let symbol = db.create_symbol();

    for _ in 0..40 {
        let len = rng.random_range(0..600);
        let original: Vec<bool> = (0..len).map(|_| rng.random_bool(0.5)).collect();
        write_all(&mut db, symbol, &original);

        let at = rng.random_range(0..=len);
        let n = rng.random_range(1..300);
        db.insert_bits(symbol, at as u64, n as u64).expect("insert");

        let grown = read_all(&db, symbol);
        assert_eq!(grown.len(), len + n);
        assert_eq!(grown[..at], original[..at]);
        assert!(grown[at..at + n].iter().all(|&bit| !bit));
        assert_eq!(grown[at + n..], original[at..]);

        db.erase_bits(symbol, at as u64, n as u64).expect("erase");
        assert_eq!(read_all(&db, symbol), original);
    }
}

#[test]
fn test_word_reads_cross_boundaries() {
    let mut db = new_test_database();
    let symbol = db.create_symbol();
    db.set_blob_len(symbol, 200, 0).expect("resize");

    db.write_bits(symbol, 60, 64, 0xDEAD_BEEF_CAFE_F00D).expect("write");
    assert_eq!(db.read_bits(symbol, 60, 64).expect("read"), 0xDEAD_BEEF_CAFE_F00D);
    assert_eq!(db.read_bits(symbol, 0, 60).expect("read"), 0);
    assert_eq!(db.read_bits(symbol, 124, 64).expect("read"), 0);
    assert_eq!(
        db.read_bits(symbol, 0, 65).expect_err("too wide").kind(),
        ErrorKind::OutOfRange
    );
}

#[test]
fn test_resize_preserves_requested_prefix() {
    let mut db = new_test_database();
    let symbol = db.create_literal("preserve me".into()).expect("literal");

    db.set_blob_len(symbol, 8 * 64, 8 * 8).expect("grow");
    let bytes = db.read_bytes(symbol).expect("bytes");
    assert_eq!(&bytes[..8], b"preserve");
    assert!(bytes[8..].iter().all(|&b| b == 0));

    db.set_blob_len(symbol, 4 * 8, 8 * 64).expect("shrink");
    assert_eq!(db.read_bytes(symbol).expect("bytes"), b"pres");
}

#[test]
fn test_slice_between_symbols() {
    let mut db = new_test_database();
    let source = db.create_literal("0123456789".into()).expect("source");
    let target = db.create_literal("abcdefghij".into()).expect("target");

    db.slice(target, source, 2 * 8, 5 * 8, 3 * 8).expect("slice");
    assert_eq!(db.read_bytes(target).expect("bytes"), b"ab567fghij");

    let err = db.slice(target, source, 9 * 8, 0, 2 * 8).expect_err("past end");
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

#[test]
fn test_compare_orders_by_size_then_content() {
    let mut db = new_test_database();
    let short = db.create_literal("zz".into()).expect("short");
    let long = db.create_literal("aaa".into()).expect("long");
    let same = db.create_literal("aaa".into()).expect("same");

    assert_eq!(db.compare(short, long).expect("compare"), std::cmp::Ordering::Less);
    assert_eq!(db.compare(long, same).expect("compare"), std::cmp::Ordering::Equal);
    assert_eq!(db.compare(long, long).expect("compare"), std::cmp::Ordering::Equal);
}
