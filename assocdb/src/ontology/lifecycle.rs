//! Symbol lifecycle: destroying symbols, single-valued attributes, and the
//! Holds-rooted existence sweep.
//!
//! Every operation that removes triples collects the touched symbols first
//! and releases whichever of them end up unreferenced, so no symbol outlives
//! its last triple.

use super::{IndexError, QueryShape, Role, Symbol, Triple, TripleIndex};
use crate::storage::BlobStore;

const MVV: QueryShape = QueryShape::new(Role::Match, Role::Vary, Role::Vary);
const VMV: QueryShape = QueryShape::new(Role::Vary, Role::Match, Role::Vary);
const VVM: QueryShape = QueryShape::new(Role::Vary, Role::Vary, Role::Match);
const MMV: QueryShape = QueryShape::new(Role::Match, Role::Match, Role::Vary);
const VMM: QueryShape = QueryShape::new(Role::Vary, Role::Match, Role::Match);

impl TripleIndex {
    /// Run a query and collect its results.
    pub fn collect(
        &self,
        store: &mut BlobStore,
        shape: QueryShape,
        pattern: &Triple,
    ) -> Result<Vec<Triple>, IndexError> {
        let mut found = Vec::new();
        self.query(store, shape, pattern, Some(&mut |triple| found.push(triple)))?;
        Ok(found)
    }

    /// Every value of `(entity, attribute)`.
    pub fn values(
        &self,
        store: &mut BlobStore,
        entity: Symbol,
        attribute: Symbol,
    ) -> Result<Vec<Symbol>, IndexError> {
        let pattern = Triple::new(entity, attribute, Symbol::VOID);
        Ok(self
            .collect(store, MMV, &pattern)?
            .into_iter()
            .map(|triple| triple.value)
            .collect())
    }

    /// Number of values of `(entity, attribute)`.
    pub fn value_count(
        &self,
        store: &mut BlobStore,
        entity: Symbol,
        attribute: Symbol,
    ) -> Result<u64, IndexError> {
        let pattern = Triple::new(entity, attribute, Symbol::VOID);
        self.query(store, MMV, &pattern, None)
    }

    /// The value of `(entity, attribute)` if there is exactly one.
    pub fn get_solitary(
        &self,
        store: &mut BlobStore,
        entity: Symbol,
        attribute: Symbol,
    ) -> Result<Option<Symbol>, IndexError> {
        let values = self.values(store, entity, attribute)?;
        Ok(match values[..] {
            [value] => Some(value),
            _ => None,
        })
    }

    /// Remove every triple mentioning `symbol` in any position, then release
    /// `symbol` and whatever else was left unreferenced.
    ///
    /// Returns whether any triple was removed.
    pub fn destroy(&self, store: &mut BlobStore, symbol: Symbol) -> Result<bool, IndexError> {
        if !store.is_live(symbol.0) {
            return Err(IndexError::NonexistentSymbol(symbol));
        }

        let mut triples = Vec::new();
        for shape in [MVV, VMV, VVM] {
            let pattern = Triple::new(symbol, symbol, symbol);
            triples.extend(self.collect(store, shape, &pattern)?);
        }
        triples.sort_unstable();
        triples.dedup();

        for triple in &triples {
            self.unlink_without_releasing(store, triple)?;
        }
        let mut dirty: Vec<Symbol> = triples.iter().flat_map(Triple::symbols).collect();
        dirty.sort_unstable();
        dirty.dedup();
        for &other in dirty.iter().filter(|&&other| other != symbol) {
            self.try_release(store, other)?;
        }
        self.try_release(store, symbol)?;

        tracing::debug!(%symbol, triples = triples.len(), "destroyed symbol");
        Ok(!triples.is_empty())
    }

    /// Remove every value of `(entity, attribute)`.
    ///
    /// Returns the number of triples removed.
    pub fn unlink_pair(
        &self,
        store: &mut BlobStore,
        entity: Symbol,
        attribute: Symbol,
    ) -> Result<u64, IndexError> {
        let values = self.values(store, entity, attribute)?;
        for &value in &values {
            self.unlink_without_releasing(store, &Triple::new(entity, attribute, value))?;
        }
        for value in values.iter().copied().chain([entity, attribute]) {
            self.try_release(store, value)?;
        }
        Ok(values.len() as u64)
    }

    /// Make `triple.value` the only value of `(entity, attribute)`.
    ///
    /// With a VOID value and `allow_void` unset, every value is removed and
    /// nothing is linked; the entity may then be released as well.
    pub fn set_solitary(
        &self,
        store: &mut BlobStore,
        triple: &Triple,
        allow_void: bool,
    ) -> Result<(), IndexError> {
        let keep = allow_void || !triple.value.is_void();
        let mut need_link = keep;
        let mut dirty = Vec::new();
        for value in self.values(store, triple.entity, triple.attribute)? {
            if keep && value == triple.value {
                need_link = false;
            } else {
                dirty.push(value);
            }
        }

        if need_link {
            self.link(store, triple)?;
        }
        for &value in &dirty {
            self.unlink_without_releasing(store, &Triple::new(triple.entity, triple.attribute, value))?;
        }

        if !allow_void {
            dirty.push(triple.entity);
        }
        dirty.push(triple.attribute);
        for symbol in dirty {
            self.try_release(store, symbol)?;
        }
        Ok(())
    }

    /// Destroy `symbol` unless something holds it, and repeat for whatever it
    /// held.
    ///
    /// A symbol survives while it is the value of at least one Holds triple.
    /// Returns the number of symbols destroyed.
    pub fn scrutinize_existence(
        &self,
        store: &mut BlobStore,
        symbol: Symbol,
    ) -> Result<u64, IndexError> {
        let mut pending = vec![symbol];
        let mut destroyed = 0;

        while let Some(candidate) = pending.pop() {
            if candidate.is_reserved() || !store.is_live(candidate.0) {
                continue;
            }
            let holders = Triple::new(Symbol::VOID, Symbol::HOLDS, candidate);
            if self.query(store, VMM, &holders, None)? > 0 {
                continue;
            }
            pending.extend(self.values(store, candidate, Symbol::HOLDS)?);
            self.destroy(store, candidate)?;
            destroyed += 1;
        }

        tracing::debug!(%symbol, destroyed, "scrutinized existence");
        Ok(destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::IndexMode;
    use crate::storage::PageSpace;

    fn setup(mode: IndexMode) -> (BlobStore, TripleIndex, Vec<Symbol>) {
        let mut store = BlobStore::new(PageSpace::in_memory(512));
        for _ in 0..Symbol::FIRST_USER {
            store.create_identifier();
        }
        let index = TripleIndex::create(&mut store, mode);
        let symbols = (0..8).map(|_| Symbol(store.create_identifier())).collect();
        (store, index, symbols)
    }

    #[test]
    fn test_destroy_removes_every_position() {
        for mode in IndexMode::ALL {
            let (mut store, index, s) = setup(mode);
            let victim = s[0];
            let triples = [
                Triple::new(victim, s[1], s[2]),
                Triple::new(s[3], victim, s[4]),
                Triple::new(s[5], s[6], victim),
                Triple::new(s[5], s[6], s[7]),
            ];
            for triple in &triples {
                index.link(&mut store, triple).expect("link");
            }

            assert!(index.destroy(&mut store, victim).expect("destroy"));
            assert!(!store.is_live(victim.0), "{mode}");
            for orphan in [s[1], s[2], s[3], s[4]] {
                assert!(!store.is_live(orphan.0), "{mode}: {orphan}");
            }
            for survivor in [s[5], s[6], s[7]] {
                assert!(store.is_live(survivor.0), "{mode}: {survivor}");
            }
            assert!(index.contains(&store, &triples[3]).expect("contains"));
        }
    }

    #[test]
    fn test_destroy_self_referencing_triple() {
        let (mut store, index, s) = setup(IndexMode::Hexa);
        index
            .link(&mut store, &Triple::new(s[0], s[0], s[0]))
            .expect("link");
        assert!(index.destroy(&mut store, s[0]).expect("destroy"));
        assert!(!store.is_live(s[0].0));
        assert_eq!(index.record_count(&store).expect("count"), 0);
    }

    #[test]
    fn test_destroy_unknown_symbol() {
        let (mut store, index, _) = setup(IndexMode::Hexa);
        let result = index.destroy(&mut store, Symbol(9_999));
        assert!(matches!(result, Err(IndexError::NonexistentSymbol(_))));
    }

    #[test]
    fn test_set_solitary_replaces_value() {
        for mode in IndexMode::ALL {
            let (mut store, index, s) = setup(mode);
            let (alice, knows, bob, carol) = (s[0], s[1], s[2], s[3]);

            index
                .set_solitary(&mut store, &Triple::new(alice, knows, bob), false)
                .expect("set");
            index
                .set_solitary(&mut store, &Triple::new(alice, knows, carol), false)
                .expect("set");

            assert_eq!(index.values(&mut store, alice, knows).expect("values"), [carol]);
            assert!(!store.is_live(bob.0), "{mode}: bob is orphaned");
            assert_eq!(
                index.get_solitary(&mut store, alice, knows).expect("get"),
                Some(carol)
            );
        }
    }

    #[test]
    fn test_set_solitary_keeps_existing_value() {
        let (mut store, index, s) = setup(IndexMode::Hexa);
        let triple = Triple::new(s[0], s[1], s[2]);
        index.link(&mut store, &triple).expect("link");
        index
            .link(&mut store, &Triple::new(s[0], s[1], s[3]))
            .expect("link");

        index.set_solitary(&mut store, &triple, false).expect("set");
        assert_eq!(index.values(&mut store, s[0], s[1]).expect("values"), [s[2]]);
        assert!(!store.is_live(s[3].0));
    }

    #[test]
    fn test_set_solitary_void_clears() {
        let (mut store, index, s) = setup(IndexMode::Tri);
        index
            .link(&mut store, &Triple::new(s[0], s[1], s[2]))
            .expect("link");

        index
            .set_solitary(&mut store, &Triple::new(s[0], s[1], Symbol::VOID), false)
            .expect("set");
        assert_eq!(index.value_count(&mut store, s[0], s[1]).expect("count"), 0);
        assert!(!store.is_live(s[0].0));
        assert!(!store.is_live(s[2].0));
    }

    #[test]
    fn test_get_solitary_ambiguous() {
        let (mut store, index, s) = setup(IndexMode::Hexa);
        assert_eq!(index.get_solitary(&mut store, s[0], s[1]).expect("get"), None);
        index
            .link(&mut store, &Triple::new(s[0], s[1], s[2]))
            .expect("link");
        index
            .link(&mut store, &Triple::new(s[0], s[1], s[3]))
            .expect("link");
        assert_eq!(index.get_solitary(&mut store, s[0], s[1]).expect("get"), None);
        assert_eq!(index.value_count(&mut store, s[0], s[1]).expect("count"), 2);
    }

    #[test]
    fn test_unlink_pair() {
        let (mut store, index, s) = setup(IndexMode::Hexa);
        for value in [s[2], s[3], s[4]] {
            index
                .link(&mut store, &Triple::new(s[0], s[1], value))
                .expect("link");
        }
        index
            .link(&mut store, &Triple::new(s[0], s[5], s[2]))
            .expect("link");

        assert_eq!(index.unlink_pair(&mut store, s[0], s[1]).expect("unlink"), 3);
        assert!(store.is_live(s[2].0), "still a value of another pair");
        assert!(!store.is_live(s[3].0));
        assert!(!store.is_live(s[1].0));
        assert!(store.is_live(s[0].0));
    }

    #[test]
    fn test_scrutinize_existence_follows_holds() {
        for mode in IndexMode::ALL {
            let (mut store, index, s) = setup(mode);
            let (parent, child, grandchild, shared, owner) = (s[0], s[1], s[2], s[3], s[4]);
            let holds = |e, v| Triple::new(e, Symbol::HOLDS, v);
            for triple in [
                holds(parent, child),
                holds(child, grandchild),
                holds(child, shared),
                holds(owner, shared),
                holds(Symbol::ROOT, owner),
                Triple::new(grandchild, s[5], s[6]),
            ] {
                index.link(&mut store, &triple).expect("link");
            }

            let destroyed = index
                .scrutinize_existence(&mut store, parent)
                .expect("scrutinize");
            assert_eq!(destroyed, 3, "{mode}");
            for gone in [parent, child, grandchild, s[5], s[6]] {
                assert!(!store.is_live(gone.0), "{mode}: {gone}");
            }
            assert!(store.is_live(shared.0), "{mode}: still held by owner");
            assert!(store.is_live(owner.0));
        }
    }

    #[test]
    fn test_scrutinize_existence_keeps_held_symbol() {
        let (mut store, index, s) = setup(IndexMode::Hexa);
        index
            .link(&mut store, &Triple::new(Symbol::ROOT, Symbol::HOLDS, s[0]))
            .expect("link");
        assert_eq!(index.scrutinize_existence(&mut store, s[0]).expect("scrutinize"), 0);
        assert!(store.is_live(s[0].0));
    }
}
