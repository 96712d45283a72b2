//! Test ownership-rooted collection through Holds edges.

use crate::e2e_tests::helpers::*;
use crate::ontology::{IndexMode, Symbol, Triple};

/// `ROOT holds parent holds child holds grandchild`, plus a label on each.
fn build_tree(db: &mut crate::database::Database) -> [Symbol; 4] {
    let s = structural_symbols(db, 4);
    let (parent, child, grandchild, label) = (s[0], s[1], s[2], s[3]);
    db.link(&Triple::new(Symbol::ROOT, Symbol::HOLDS, parent)).expect("link");
    db.link(&Triple::new(parent, Symbol::HOLDS, child)).expect("link");
    db.link(&Triple::new(child, Symbol::HOLDS, grandchild)).expect("link");
    for node in [parent, child, grandchild] {
        db.link(&Triple::new(node, label, Symbol::ROOT)).expect("label");
    }
    [parent, child, grandchild, label]
}

#[test]
fn test_held_symbols_survive() {
    for mode in IndexMode::ALL {
        let mut db = new_test_database_in(mode);
        let [parent, child, grandchild, _] = build_tree(&mut db);

        assert_eq!(db.scrutinize_existence(parent).expect("scrutinize"), 0, "{mode}");
        assert_eq!(db.scrutinize_existence(child).expect("scrutinize"), 0, "{mode}");
        assert!(db.exists(parent) && db.exists(child) && db.exists(grandchild));
    }
}

#[test]
fn test_unheld_subtree_is_swept() {
    for mode in IndexMode::ALL {
        let mut db = new_test_database_in(mode);
        let [parent, child, grandchild, label] = build_tree(&mut db);

        db.unlink(&Triple::new(Symbol::ROOT, Symbol::HOLDS, parent))
            .expect("unlink");
        // Still labelled, so the unlink alone does not release it.
        assert!(db.exists(parent), "{mode}");

        assert_eq!(db.scrutinize_existence(parent).expect("scrutinize"), 3, "{mode}");
        for node in [parent, child, grandchild] {
            assert!(!db.exists(node), "{mode} {node}");
        }
        // The label lost every use along with the nodes.
        assert!(!db.exists(label), "{mode}");
    }
}

#[test]
fn test_second_holder_keeps_child() {
    let mut db = new_test_database();
    let [parent, child, grandchild, _] = build_tree(&mut db);
    let other = db.create_symbol();
    db.link(&Triple::new(Symbol::ROOT, Symbol::HOLDS, other)).expect("link");
    db.link(&Triple::new(other, Symbol::HOLDS, child)).expect("link");

    db.unlink(&Triple::new(Symbol::ROOT, Symbol::HOLDS, parent))
        .expect("unlink");
    assert_eq!(db.scrutinize_existence(parent).expect("scrutinize"), 1);

    assert!(!db.exists(parent));
    assert!(db.exists(child));
    assert!(db.exists(grandchild));
}
