//! Per-symbol index records and triple link/unlink.
//!
//! # Design
//!
//! Linking a triple touches each of its three symbols as alpha: for every
//! active orientation rooted at that position, the beta map entry and gamma
//! set are created on demand and the gamma symbol inserted. Unlinking
//! reverses this and prunes empty gamma sets and beta entries on the way out.
//!
//! A symbol is referenced while any sub-index in its record is non-empty. In
//! Mono mode attributes and values have no record of their own, so the check
//! falls back to scanning every EAV entry for a mention.
//!
//! # Invariants
//!
//! - A triple is in every active orientation or in none.
//! - No gamma set is empty and no beta map entry points at a released set.
//! - Every record carries a live map for each active orientation.

use super::{IndexError, IndexMode, Orientation, Symbol, Triple};
use crate::containers::{BlobSet, BlobVector, Element, Pair, scoped};
use crate::storage::{BlobStore, Identifier};

/// Beta key to gamma set identifier.
pub(super) type BetaMap = BlobSet<Symbol, Identifier>;
pub(super) type GammaSet = BlobSet<Symbol>;
pub(super) type Records = BlobSet<Symbol, SubIndices>;

/// One map identifier per orientation slot; 0 marks an inactive slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubIndices(pub [Identifier; 6]);

impl SubIndices {
    /// The beta map for `orientation`, if allocated.
    #[must_use]
    pub const fn map(&self, orientation: Orientation) -> Option<BetaMap> {
        match self.0[orientation.slot()] {
            0 => None,
            id => Some(BetaMap::from_identifier(id)),
        }
    }

    const fn set(&mut self, orientation: Orientation, id: Identifier) {
        self.0[orientation.slot()] = id;
    }
}

impl Element for SubIndices {
    const WORDS: usize = 6;

    fn store(&self, out: &mut [u64]) {
        out.copy_from_slice(&self.0);
    }

    fn load(words: &[u64]) -> Self {
        let mut ids = [0; 6];
        ids.copy_from_slice(words);
        Self(ids)
    }
}

/// The triple index: a record per symbol, each holding up to six sub-indices.
#[derive(Debug, Clone, Copy)]
pub struct TripleIndex {
    records: Records,
    mode: IndexMode,
}

impl TripleIndex {
    /// Allocate an empty index.
    #[must_use]
    pub fn create(store: &mut BlobStore, mode: IndexMode) -> Self {
        Self {
            records: Records::create(store),
            mode,
        }
    }

    /// Reattach to an index whose record set is `id`.
    #[must_use]
    pub const fn open(id: Identifier, mode: IndexMode) -> Self {
        Self {
            records: Records::from_identifier(id),
            mode,
        }
    }

    #[must_use]
    pub const fn identifier(&self) -> Identifier {
        self.records.identifier()
    }

    #[must_use]
    pub const fn mode(&self) -> IndexMode {
        self.mode
    }

    pub(super) const fn records(&self) -> Records {
        self.records
    }

    /// Number of symbols with an index record.
    pub fn record_count(&self, store: &BlobStore) -> Result<usize, IndexError> {
        Ok(self.records.len(store)?)
    }

    pub(super) fn record(
        &self,
        store: &BlobStore,
        symbol: Symbol,
    ) -> Result<Option<SubIndices>, IndexError> {
        Ok(self.records.get(store, &symbol)?)
    }

    /// Beta map of `alpha` in `orientation`, if any.
    pub(super) fn beta_map(
        &self,
        store: &BlobStore,
        alpha: Symbol,
        orientation: Orientation,
    ) -> Result<Option<BetaMap>, IndexError> {
        Ok(self
            .record(store, alpha)?
            .and_then(|record| record.map(orientation)))
    }

    /// Find or create `alpha`'s record, allocating every active map it lacks.
    fn ensure_record(&self, store: &mut BlobStore, alpha: Symbol) -> Result<SubIndices, IndexError> {
        let (index, mut record) = match self.records.locate(store, &alpha)? {
            Ok(index) => (Some(index), self.records.value_at(store, index)?),
            Err(_) => (None, SubIndices::default()),
        };

        let mut created = Vec::new();
        for &orientation in self.mode.orientations() {
            if record.map(orientation).is_none() {
                let betas = BetaMap::create(store);
                record.set(orientation, betas.identifier());
                created.push(betas);
            }
        }

        let stored = match index {
            Some(_) if created.is_empty() => Ok(()),
            Some(index) => self.records.set_value_at(store, index, record),
            None => self.records.insert(store, alpha, record).map(|_| ()),
        };
        if let Err(e) = stored {
            for betas in created {
                betas.release(store)?;
            }
            return Err(e.into());
        }
        Ok(record)
    }

    /// Whether `triple` is in the index.
    pub fn contains(&self, store: &BlobStore, triple: &Triple) -> Result<bool, IndexError> {
        let Some(betas) = self.beta_map(store, triple.entity, Orientation::Eav)? else {
            return Ok(false);
        };
        let Some(gammas) = betas.get(store, &triple.attribute)? else {
            return Ok(false);
        };
        Ok(GammaSet::from_identifier(gammas).contains(store, &triple.value)?)
    }

    /// Add `triple` to every active orientation.
    ///
    /// Returns `false` without touching anything if it is already present.
    pub fn link(&self, store: &mut BlobStore, triple: &Triple) -> Result<bool, IndexError> {
        for symbol in triple.symbols() {
            if !store.is_live(symbol.0) {
                return Err(IndexError::NonexistentSymbol(symbol));
            }
        }
        if self.contains(store, triple)? {
            return Ok(false);
        }

        for position in 0..3 {
            let mut orientations = self.mode.rooted_at(position).peekable();
            if orientations.peek().is_none() {
                continue;
            }
            let record = self.ensure_record(store, triple.get(position))?;
            for orientation in orientations {
                let [_, beta, gamma] = orientation.arrange(triple);
                if let Some(betas) = record.map(orientation) {
                    link_in(store, betas, beta, gamma)?;
                }
            }
        }

        if triple.attribute == Symbol::BLOB_TYPE {
            store.modified(triple.entity.0);
        }
        tracing::trace!(%triple, "linked");
        Ok(true)
    }

    /// Remove `triple` and release any of its symbols left unreferenced.
    ///
    /// Returns `false` if the triple was not present.
    pub fn unlink(&self, store: &mut BlobStore, triple: &Triple) -> Result<bool, IndexError> {
        if !self.contains(store, triple)? {
            return Ok(false);
        }
        self.unlink_without_releasing(store, triple)?;
        for symbol in triple.symbols() {
            self.try_release(store, symbol)?;
        }
        Ok(true)
    }

    /// Remove `triple` from every active orientation, leaving its symbols
    /// alive even if they end up unreferenced.
    pub fn unlink_without_releasing(
        &self,
        store: &mut BlobStore,
        triple: &Triple,
    ) -> Result<(), IndexError> {
        for &orientation in self.mode.orientations() {
            let [alpha, beta, gamma] = orientation.arrange(triple);
            if let Some(betas) = self.beta_map(store, alpha, orientation)? {
                unlink_in(store, betas, beta, gamma)?;
            }
        }

        if triple.attribute == Symbol::BLOB_TYPE {
            store.modified(triple.entity.0);
        }
        tracing::trace!(%triple, "unlinked");
        Ok(())
    }

    /// Whether any triple still mentions `symbol`.
    fn is_referenced(
        &self,
        store: &mut BlobStore,
        symbol: Symbol,
        record: Option<SubIndices>,
    ) -> Result<bool, IndexError> {
        if let Some(record) = record {
            for &orientation in self.mode.orientations() {
                if let Some(betas) = record.map(orientation) {
                    if !betas.is_empty(store)? {
                        return Ok(true);
                    }
                }
            }
        }
        if self.mode != IndexMode::Mono {
            return Ok(false);
        }

        let mut mentioned = false;
        self.scan(store, Orientation::Eav, &mut |_, triple| {
            mentioned |= triple.attribute == symbol || triple.value == symbol;
            Ok(())
        })?;
        Ok(mentioned)
    }

    /// Release `symbol` if nothing references it any more.
    ///
    /// Reserved and already released symbols are left alone.
    pub fn try_release(&self, store: &mut BlobStore, symbol: Symbol) -> Result<bool, IndexError> {
        if symbol.is_reserved() || !store.is_live(symbol.0) {
            return Ok(false);
        }
        let record = self.record(store, symbol)?;
        if self.is_referenced(store, symbol, record)? {
            return Ok(false);
        }

        if let Some(record) = record {
            for id in record.0 {
                if id != 0 {
                    BetaMap::from_identifier(id).release(store)?;
                }
            }
            self.records.erase(store, &symbol)?;
        }
        store.release_identifier(symbol.0)?;
        tracing::trace!(%symbol, "released symbol");
        Ok(true)
    }

    /// Visit every triple stored in `orientation`.
    ///
    /// The visitor gets the store back so it can fill scratch containers;
    /// it must not modify the index itself.
    pub(super) fn scan(
        &self,
        store: &mut BlobStore,
        orientation: Orientation,
        visit: &mut dyn FnMut(&mut BlobStore, Triple) -> Result<(), IndexError>,
    ) -> Result<(), IndexError> {
        for r in 0..self.records.len(store)? {
            let Pair { key: alpha, value } = self.records.entry_at(store, r)?;
            let Some(betas) = value.map(orientation) else {
                continue;
            };
            for b in 0..betas.len(store)? {
                let Pair { key: beta, value } = betas.entry_at(store, b)?;
                let gammas = GammaSet::from_identifier(value);
                for g in 0..gammas.len(store)? {
                    let gamma = gammas.key_at(store, g)?;
                    visit(store, orientation.restore([alpha, beta, gamma]))?;
                }
            }
        }
        Ok(())
    }

    /// Switch granularity, building or tearing down orientations as needed.
    ///
    /// Query results are identical before and after.
    pub fn set_mode(&mut self, store: &mut BlobStore, mode: IndexMode) -> Result<(), IndexError> {
        let old = self.mode;
        if old == mode {
            return Ok(());
        }
        let removed: Vec<Orientation> = old
            .orientations()
            .iter()
            .copied()
            .filter(|&o| !mode.is_active(o))
            .collect();
        let added: Vec<Orientation> = mode
            .orientations()
            .iter()
            .copied()
            .filter(|&o| !old.is_active(o))
            .collect();
        tracing::info!(from = %old, to = %mode, "migrating index");

        let mut r = 0;
        while r < self.records.len(store)? {
            let mut record = self.records.value_at(store, r)?;
            for &orientation in &removed {
                if let Some(betas) = record.map(orientation) {
                    release_map(store, betas)?;
                    record.set(orientation, 0);
                }
            }
            let eav = record.map(Orientation::Eav);
            let orphaned = match eav {
                Some(betas) => betas.is_empty(store)?,
                None => true,
            };
            if mode == IndexMode::Mono && orphaned {
                if let Some(betas) = eav {
                    betas.release(store)?;
                }
                self.records.remove_at(store, r)?;
                continue;
            }
            self.records.set_value_at(store, r, record)?;
            r += 1;
        }

        self.mode = mode;
        if !added.is_empty() {
            self.rebuild(store, &added)?;
        }
        for r in 0..self.records.len(store)? {
            let symbol = self.records.key_at(store, r)?;
            self.ensure_record(store, symbol)?;
        }
        Ok(())
    }

    /// Link every EAV triple into `orientations`.
    fn rebuild(&self, store: &mut BlobStore, orientations: &[Orientation]) -> Result<(), IndexError> {
        scoped(store, |store, triples: BlobVector<Triple>| {
            self.scan(store, Orientation::Eav, &mut |store, triple| {
                triples.push_back(store, triple)?;
                Ok(())
            })?;

            let count = triples.len(store)?;
            for i in 0..count {
                let triple = triples.read_at(store, i)?;
                for &orientation in orientations {
                    let [alpha, beta, gamma] = orientation.arrange(&triple);
                    let record = self.ensure_record(store, alpha)?;
                    if let Some(betas) = record.map(orientation) {
                        link_in(store, betas, beta, gamma)?;
                    }
                }
            }
            tracing::debug!(triples = count, "rebuilt orientations");
            Ok(())
        })
    }
}

fn link_in(store: &mut BlobStore, betas: BetaMap, beta: Symbol, gamma: Symbol) -> Result<(), IndexError> {
    let gammas = match betas.get(store, &beta)? {
        Some(id) => GammaSet::from_identifier(id),
        None => {
            let gammas = GammaSet::create(store);
            betas.insert(store, beta, gammas.identifier())?;
            gammas
        }
    };
    gammas.insert(store, gamma, ())?;
    Ok(())
}

fn unlink_in(store: &mut BlobStore, betas: BetaMap, beta: Symbol, gamma: Symbol) -> Result<(), IndexError> {
    let Some(index) = betas.find(store, &beta)? else {
        return Ok(());
    };
    let gammas = GammaSet::from_identifier(betas.value_at(store, index)?);
    gammas.erase(store, &gamma)?;
    if gammas.is_empty(store)? {
        gammas.release(store)?;
        betas.remove_at(store, index)?;
    }
    Ok(())
}

/// Release a beta map together with every gamma set it points at.
fn release_map(store: &mut BlobStore, betas: BetaMap) -> Result<(), IndexError> {
    for b in 0..betas.len(store)? {
        GammaSet::from_identifier(betas.value_at(store, b)?).release(store)?;
    }
    betas.release(store)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PageSpace;

    fn setup(mode: IndexMode) -> (BlobStore, TripleIndex, Vec<Symbol>) {
        let mut store = BlobStore::new(PageSpace::in_memory(512));
        for _ in 0..Symbol::FIRST_USER {
            store.create_identifier();
        }
        let index = TripleIndex::create(&mut store, mode);
        let symbols = (0..6).map(|_| Symbol(store.create_identifier())).collect();
        (store, index, symbols)
    }

    #[test]
    fn test_link_is_idempotent() {
        for mode in IndexMode::ALL {
            let (mut store, index, s) = setup(mode);
            let triple = Triple::new(s[0], s[1], s[2]);

            assert!(index.link(&mut store, &triple).expect("link"));
            assert!(!index.link(&mut store, &triple).expect("link again"));
            assert!(index.contains(&store, &triple).expect("contains"));
        }
    }

    #[test]
    fn test_link_rejects_released_symbol() {
        let (mut store, index, s) = setup(IndexMode::Hexa);
        store.release_identifier(s[2].0).expect("release");

        let result = index.link(&mut store, &Triple::new(s[0], s[1], s[2]));
        assert!(matches!(result, Err(IndexError::NonexistentSymbol(sym)) if sym == s[2]));
        assert_eq!(index.record_count(&store).expect("count"), 0);
    }

    #[test]
    fn test_records_per_mode() {
        let (mut store, index, s) = setup(IndexMode::Mono);
        index
            .link(&mut store, &Triple::new(s[0], s[1], s[2]))
            .expect("link");
        assert_eq!(index.record_count(&store).expect("count"), 1);

        let (mut store, index, s) = setup(IndexMode::Tri);
        index
            .link(&mut store, &Triple::new(s[0], s[1], s[2]))
            .expect("link");
        assert_eq!(index.record_count(&store).expect("count"), 3);
        let record = index.record(&store, s[1]).expect("record").expect("present");
        assert!(record.map(Orientation::Ave).is_some());
        assert!(record.map(Orientation::Aev).is_none());
    }

    #[test]
    fn test_unlink_releases_orphans() {
        for mode in IndexMode::ALL {
            let (mut store, index, s) = setup(mode);
            let kept = Triple::new(s[0], s[1], s[3]);
            let dropped = Triple::new(s[0], s[1], s[2]);
            index.link(&mut store, &kept).expect("link");
            index.link(&mut store, &dropped).expect("link");

            assert!(index.unlink(&mut store, &dropped).expect("unlink"));
            assert!(!store.is_live(s[2].0), "{mode}: value should be released");
            assert!(store.is_live(s[0].0));
            assert!(store.is_live(s[1].0));
            assert!(!index.contains(&store, &dropped).expect("contains"));

            assert!(index.unlink(&mut store, &kept).expect("unlink"));
            for symbol in [s[0], s[1], s[3]] {
                assert!(!store.is_live(symbol.0), "{mode}: {symbol} should be released");
            }
            assert_eq!(index.record_count(&store).expect("count"), 0);
        }
    }

    #[test]
    fn test_unlink_missing_returns_false() {
        let (mut store, index, s) = setup(IndexMode::Hexa);
        let triple = Triple::new(s[0], s[1], s[2]);
        assert!(!index.unlink(&mut store, &triple).expect("unlink"));
        assert!(store.is_live(s[0].0));
    }

    #[test]
    fn test_reserved_symbols_survive_unlink() {
        let (mut store, index, s) = setup(IndexMode::Hexa);
        let triple = Triple::new(s[0], Symbol::HOLDS, s[1]);
        index.link(&mut store, &triple).expect("link");
        index.unlink(&mut store, &triple).expect("unlink");

        assert!(store.is_live(Symbol::HOLDS.0));
        assert!(index.record(&store, Symbol::HOLDS).expect("record").is_some());
    }

    #[test]
    fn test_unlink_frees_index_storage() {
        let (mut store, index, s) = setup(IndexMode::Hexa);
        let live_before = store.live_count();
        let triple = Triple::new(s[0], s[1], s[2]);

        index.link(&mut store, &triple).expect("link");
        assert!(store.live_count() > live_before);
        index.unlink(&mut store, &triple).expect("unlink");

        // Only the three released symbols are gone; no containers leak.
        assert_eq!(store.live_count(), live_before - 3);
    }

    #[test]
    fn test_mode_switch_preserves_triples() {
        let (mut store, mut index, s) = setup(IndexMode::Hexa);
        let triples = [
            Triple::new(s[0], s[1], s[2]),
            Triple::new(s[0], s[1], s[3]),
            Triple::new(s[4], s[1], s[0]),
            Triple::new(s[2], s[5], s[5]),
        ];
        for triple in &triples {
            index.link(&mut store, triple).expect("link");
        }

        for mode in [IndexMode::Mono, IndexMode::Tri, IndexMode::Hexa, IndexMode::Mono] {
            index.set_mode(&mut store, mode).expect("set mode");
            assert_eq!(index.mode(), mode);
            for triple in &triples {
                assert!(index.contains(&store, triple).expect("contains"), "{mode}");
            }
            let mut count = 0;
            for &orientation in mode.orientations() {
                index
                    .scan(&mut store, orientation, &mut |_, _| {
                        count += 1;
                        Ok(())
                    })
                    .expect("scan");
            }
            assert_eq!(count, triples.len() * mode.orientations().len(), "{mode}");
        }

        assert_eq!(index.record_count(&store).expect("count"), 3);
    }

    #[test]
    fn test_mono_release_checks_mentions() {
        let (mut store, index, s) = setup(IndexMode::Mono);
        index
            .link(&mut store, &Triple::new(s[0], s[1], s[2]))
            .expect("link");
        index
            .link(&mut store, &Triple::new(s[3], s[1], s[4]))
            .expect("link");

        index
            .unlink(&mut store, &Triple::new(s[0], s[1], s[2]))
            .expect("unlink");
        assert!(store.is_live(s[1].0), "attribute still used by another triple");
        assert!(!store.is_live(s[0].0));
        assert!(!store.is_live(s[2].0));
    }
}
