//! Pattern queries over the triple index.
//!
//! # Query Shapes
//!
//! Each triple position is independently matched against the pattern
//! (`M`), varied and reported (`V`), or ignored with duplicates collapsed
//! (`I`). Of the 27 shapes, 20 map onto a single sub-index walk; the other 7
//! would need to ignore a field that sits between two bound ones and are
//! rejected.
//!
//! # Fallbacks
//!
//! - Tri mode lacks the inverse orientations. Shapes planned on an inverse
//!   walk the rotation with the same alpha instead and collect the wanted
//!   field into a scratch set.
//! - Mono mode has only EAV. Every other shape becomes a full EAV scan
//!   filtered on the matched fields, deduplicated through a scratch set when
//!   the shape ignores anything.
//!
//! Results are always reported in entity, attribute, value order, with
//! ignored positions set to [`Symbol::VOID`].

use std::fmt;
use std::str::FromStr;

use super::index::GammaSet;
use super::{IndexError, IndexMode, Orientation, Symbol, Triple, TripleIndex};
use crate::containers::{BlobSet, Pair, scoped};
use crate::storage::BlobStore;

/// What a query does with one triple position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Equal to the pattern's symbol.
    Match,
    /// Any symbol; reported in results.
    Vary,
    /// Any symbol; collapsed so each distinct remainder is reported once.
    Ignore,
}

impl Role {
    pub const ALL: [Self; 3] = [Self::Match, Self::Vary, Self::Ignore];

    const fn letter(self) -> char {
        match self {
            Self::Match => 'M',
            Self::Vary => 'V',
            Self::Ignore => 'I',
        }
    }
}

/// Roles for entity, attribute and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryShape {
    pub entity: Role,
    pub attribute: Role,
    pub value: Role,
}

impl QueryShape {
    #[must_use]
    pub const fn new(entity: Role, attribute: Role, value: Role) -> Self {
        Self {
            entity,
            attribute,
            value,
        }
    }

    #[must_use]
    pub const fn role(&self, position: usize) -> Role {
        match position {
            0 => self.entity,
            1 => self.attribute,
            _ => self.value,
        }
    }

    #[must_use]
    pub const fn ignores_any(&self) -> bool {
        matches!(self.entity, Role::Ignore)
            || matches!(self.attribute, Role::Ignore)
            || matches!(self.value, Role::Ignore)
    }

    /// All 27 shapes.
    pub fn all() -> impl Iterator<Item = Self> {
        Role::ALL.into_iter().flat_map(|entity| {
            Role::ALL.into_iter().flat_map(move |attribute| {
                Role::ALL
                    .into_iter()
                    .map(move |value| Self::new(entity, attribute, value))
            })
        })
    }

    /// The sub-index walk answering this shape when every orientation exists.
    pub fn plan(self) -> Result<Plan, IndexError> {
        use Orientation::{Aev, Ave, Eav, Eva, Vae, Vea};
        use Role::{Ignore as I, Match as M, Vary as V};
        use Strategy::{
            Point, ScanAll, ScanAlpha, ScanAlphaBeta, ScanBeta, ScanBetaGamma, ScanGamma,
        };

        let (orientation, strategy) = match (self.entity, self.attribute, self.value) {
            (M, M, M) => (Eav, Point),
            (V, M, M) => (Ave, ScanGamma),
            (M, V, M) => (Vea, ScanGamma),
            (V, V, M) => (Vea, ScanBetaGamma),
            (I, V, M) => (Vae, ScanBeta),
            (V, I, M) => (Vea, ScanBeta),
            (M, M, V) => (Eav, ScanGamma),
            (V, M, V) => (Ave, ScanBetaGamma),
            (I, M, V) => (Ave, ScanBeta),
            (M, V, V) => (Eav, ScanBetaGamma),
            (V, V, V) => (Eav, ScanAll),
            (I, V, V) => (Ave, ScanAlphaBeta),
            (M, I, V) => (Eva, ScanBeta),
            (V, I, V) => (Vea, ScanAlphaBeta),
            (I, I, V) => (Vea, ScanAlpha),
            (V, M, I) => (Aev, ScanBeta),
            (M, V, I) => (Eav, ScanBeta),
            (V, V, I) => (Eav, ScanAlphaBeta),
            (I, V, I) => (Ave, ScanAlpha),
            (V, I, I) => (Eav, ScanAlpha),
            (M, I, M) | (I, M, M) | (I, I, M) | (M, M, I) | (I, M, I) | (M, I, I)
            | (I, I, I) => return Err(IndexError::InvalidQueryShape(self)),
        };
        Ok(Plan {
            orientation,
            strategy,
        })
    }

    /// The reported triple for a `found` match of `pattern`.
    #[must_use]
    pub fn project(self, pattern: &Triple, found: &Triple) -> Triple {
        let mut result = Triple::default();
        for position in 0..3 {
            let symbol = match self.role(position) {
                Role::Match => pattern.get(position),
                Role::Vary => found.get(position),
                Role::Ignore => Symbol::VOID,
            };
            result.set(position, symbol);
        }
        result
    }

    fn matches(self, pattern: &Triple, candidate: &Triple) -> bool {
        (0..3).all(|position| {
            self.role(position) != Role::Match || pattern.get(position) == candidate.get(position)
        })
    }
}

impl fmt::Display for QueryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.entity.letter(),
            self.attribute.letter(),
            self.value.letter()
        )
    }
}

impl FromStr for QueryShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let roles: Vec<Role> = s
            .chars()
            .map(|c| match c.to_ascii_uppercase() {
                'M' => Ok(Role::Match),
                'V' => Ok(Role::Vary),
                'I' => Ok(Role::Ignore),
                other => Err(format!("unknown role {other:?} in shape {s:?}")),
            })
            .collect::<Result<_, _>>()?;
        match roles[..] {
            [entity, attribute, value] => Ok(Self::new(entity, attribute, value)),
            _ => Err(format!("shape {s:?} must have exactly three roles")),
        }
    }
}

/// Canonical search routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Alpha, beta and gamma all bound: membership test.
    Point,
    /// Alpha and beta bound: walk one gamma set.
    ScanGamma,
    /// Alpha bound: walk beta keys only.
    ScanBeta,
    /// Alpha bound: walk betas and their gammas.
    ScanBetaGamma,
    /// Walk alphas with a non-empty sub-index.
    ScanAlpha,
    /// Walk alphas and their betas.
    ScanAlphaBeta,
    /// Walk everything.
    ScanAll,
    /// Alpha bound: walk betas and gammas, reporting distinct gammas.
    CollectGamma,
    /// Walk everything in EAV, filter on matched fields.
    FilteredScan,
}

/// An orientation and the routine to run over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub orientation: Orientation,
    pub strategy: Strategy,
}

/// Counts results and hands projected triples to the callback.
struct Emitter<'a> {
    shape: QueryShape,
    pattern: Triple,
    callback: Option<&'a mut dyn FnMut(Triple)>,
    count: u64,
}

impl Emitter<'_> {
    fn emit(&mut self, found: &Triple) {
        self.count += 1;
        if let Some(callback) = self.callback.as_mut() {
            callback(self.shape.project(&self.pattern, found));
        }
    }
}

impl TripleIndex {
    /// The plan actually executed for `shape` in the current mode.
    pub fn plan_for(&self, shape: QueryShape) -> Result<Plan, IndexError> {
        let plan = shape.plan()?;
        let adapted = match self.mode() {
            IndexMode::Hexa => plan,
            IndexMode::Tri if plan.orientation.is_inverse() => Plan {
                orientation: plan.orientation.rotation(),
                strategy: Strategy::CollectGamma,
            },
            IndexMode::Tri => plan,
            IndexMode::Mono if plan.orientation == Orientation::Eav => plan,
            IndexMode::Mono => Plan {
                orientation: Orientation::Eav,
                strategy: Strategy::FilteredScan,
            },
        };
        Ok(adapted)
    }

    /// Run a query and return the number of results, passing each to
    /// `callback` when one is given.
    ///
    /// Matched symbols that are unknown to the index simply yield nothing.
    pub fn query(
        &self,
        store: &mut BlobStore,
        shape: QueryShape,
        pattern: &Triple,
        callback: Option<&mut dyn FnMut(Triple)>,
    ) -> Result<u64, IndexError> {
        let plan = self.plan_for(shape)?;
        let mut out = Emitter {
            shape,
            pattern: *pattern,
            callback,
            count: 0,
        };
        let o = plan.orientation;
        let [alpha, beta, _] = o.arrange(pattern);

        match plan.strategy {
            Strategy::Point => {
                if self.contains(store, pattern)? {
                    out.emit(pattern);
                }
            }
            Strategy::ScanGamma => {
                if let Some(gammas) = self.gamma_set(store, alpha, o, beta)? {
                    for g in 0..gammas.len(store)? {
                        out.emit(&o.restore([alpha, beta, gammas.key_at(store, g)?]));
                    }
                }
            }
            Strategy::ScanBeta => {
                if let Some(betas) = self.beta_map(store, alpha, o)? {
                    for b in 0..betas.len(store)? {
                        out.emit(&o.restore([alpha, betas.key_at(store, b)?, Symbol::VOID]));
                    }
                }
            }
            Strategy::ScanBetaGamma => {
                if let Some(betas) = self.beta_map(store, alpha, o)? {
                    for b in 0..betas.len(store)? {
                        let Pair { key, value } = betas.entry_at(store, b)?;
                        let gammas = GammaSet::from_identifier(value);
                        for g in 0..gammas.len(store)? {
                            out.emit(&o.restore([alpha, key, gammas.key_at(store, g)?]));
                        }
                    }
                }
            }
            Strategy::ScanAlpha | Strategy::ScanAlphaBeta => {
                self.scan_alphas(store, o, plan.strategy == Strategy::ScanAlphaBeta, &mut out)?;
            }
            Strategy::ScanAll => {
                self.scan(store, o, &mut |_, found| {
                    out.emit(&found);
                    Ok(())
                })?;
            }
            Strategy::CollectGamma => {
                if let Some(betas) = self.beta_map(store, alpha, o)? {
                    scoped(store, |store, distinct: GammaSet| {
                        for b in 0..betas.len(store)? {
                            let gammas = GammaSet::from_identifier(betas.value_at(store, b)?);
                            for g in 0..gammas.len(store)? {
                                distinct.insert(store, gammas.key_at(store, g)?, ())?;
                            }
                        }
                        for d in 0..distinct.len(store)? {
                            let found = distinct.key_at(store, d)?;
                            out.emit(&o.restore([alpha, Symbol::VOID, found]));
                        }
                        Ok::<_, IndexError>(())
                    })?;
                }
            }
            Strategy::FilteredScan => self.filtered_scan(store, &mut out)?,
        }

        tracing::trace!(%shape, orientation = %o, count = out.count, "query");
        Ok(out.count)
    }

    fn gamma_set(
        &self,
        store: &BlobStore,
        alpha: Symbol,
        orientation: Orientation,
        beta: Symbol,
    ) -> Result<Option<GammaSet>, IndexError> {
        let Some(betas) = self.beta_map(store, alpha, orientation)? else {
            return Ok(None);
        };
        Ok(betas.get(store, &beta)?.map(GammaSet::from_identifier))
    }

    fn scan_alphas(
        &self,
        store: &BlobStore,
        orientation: Orientation,
        with_betas: bool,
        out: &mut Emitter<'_>,
    ) -> Result<(), IndexError> {
        let records = self.records();
        for r in 0..records.len(store)? {
            let Pair { key: alpha, value } = records.entry_at(store, r)?;
            let Some(betas) = value.map(orientation) else {
                continue;
            };
            if !with_betas {
                if !betas.is_empty(store)? {
                    out.emit(&orientation.restore([alpha, Symbol::VOID, Symbol::VOID]));
                }
                continue;
            }
            for b in 0..betas.len(store)? {
                let beta = betas.key_at(store, b)?;
                out.emit(&orientation.restore([alpha, beta, Symbol::VOID]));
            }
        }
        Ok(())
    }

    fn filtered_scan(&self, store: &mut BlobStore, out: &mut Emitter<'_>) -> Result<(), IndexError> {
        let shape = out.shape;
        let pattern = out.pattern;
        if !shape.ignores_any() {
            return self.scan(store, Orientation::Eav, &mut |_, found| {
                if shape.matches(&pattern, &found) {
                    out.emit(&found);
                }
                Ok(())
            });
        }

        scoped(store, |store, distinct: BlobSet<Triple>| {
            self.scan(store, Orientation::Eav, &mut |store, found| {
                if shape.matches(&pattern, &found) {
                    distinct.insert(store, shape.project(&pattern, &found), ())?;
                }
                Ok(())
            })?;
            for d in 0..distinct.len(store)? {
                out.emit(&distinct.key_at(store, d)?);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::storage::PageSpace;

    fn shape(s: &str) -> QueryShape {
        s.parse().expect("valid shape")
    }

    struct Fixture {
        store: BlobStore,
        index: TripleIndex,
        s: Vec<Symbol>,
    }

    impl Fixture {
        fn new(mode: IndexMode) -> Self {
            let mut store = BlobStore::new(PageSpace::in_memory(512));
            for _ in 0..Symbol::FIRST_USER {
                store.create_identifier();
            }
            let index = TripleIndex::create(&mut store, mode);
            let s = (0..8).map(|_| Symbol(store.create_identifier())).collect();
            Self { store, index, s }
        }

        fn link(&mut self, e: usize, a: usize, v: usize) {
            let triple = Triple::new(self.s[e], self.s[a], self.s[v]);
            self.index.link(&mut self.store, &triple).expect("link");
        }

        fn results(&mut self, shape_str: &str, pattern: Triple) -> BTreeSet<Triple> {
            let mut found = Vec::new();
            let count = self
                .index
                .query(
                    &mut self.store,
                    shape(shape_str),
                    &pattern,
                    Some(&mut |t| found.push(t)),
                )
                .expect("query");
            assert_eq!(count, found.len() as u64);
            let set: BTreeSet<Triple> = found.iter().copied().collect();
            assert_eq!(set.len(), found.len(), "{shape_str} reported duplicates");
            set
        }
    }

    #[test]
    fn test_shape_parse_and_display() {
        assert_eq!(shape("mvi").to_string(), "MVI");
        assert!("MV".parse::<QueryShape>().is_err());
        assert!("MVX".parse::<QueryShape>().is_err());
        assert_eq!(QueryShape::all().count(), 27);
    }

    #[test]
    fn test_invalid_shapes() {
        let invalid: Vec<String> = QueryShape::all()
            .filter(|s| s.plan().is_err())
            .map(|s| s.to_string())
            .collect();
        assert_eq!(invalid, ["MMI", "MIM", "MII", "IMM", "IMI", "IIM", "III"]);

        let mut fixture = Fixture::new(IndexMode::Hexa);
        let result = fixture.index.query(
            &mut fixture.store,
            shape("MIM"),
            &Triple::default(),
            None,
        );
        assert!(matches!(result, Err(IndexError::InvalidQueryShape(_))));
    }

    #[test]
    fn test_plans_respect_mode() {
        let hexa = TripleIndex::open(0, IndexMode::Hexa);
        let tri = TripleIndex::open(0, IndexMode::Tri);
        let mono = TripleIndex::open(0, IndexMode::Mono);

        let plan = tri.plan_for(shape("IVM")).expect("plan");
        assert_eq!(plan.orientation, Orientation::Vea);
        assert_eq!(plan.strategy, Strategy::CollectGamma);
        assert_eq!(
            hexa.plan_for(shape("IVM")).expect("plan").orientation,
            Orientation::Vae
        );

        assert_eq!(
            mono.plan_for(shape("VMM")).expect("plan").strategy,
            Strategy::FilteredScan
        );
        assert_eq!(
            mono.plan_for(shape("MMV")).expect("plan").strategy,
            Strategy::ScanGamma
        );

        for s in QueryShape::all() {
            if let Ok(plan) = tri.plan_for(s) {
                assert!(IndexMode::Tri.is_active(plan.orientation), "{s}");
            }
        }
    }

    #[test]
    fn test_vary_and_ignore_results() {
        let mut f = Fixture::new(IndexMode::Hexa);
        // s0 knows s1, s0 knows s2, s3 knows s1, s0 likes s1
        f.link(0, 4, 1);
        f.link(0, 4, 2);
        f.link(3, 4, 1);
        f.link(0, 5, 1);
        let (s, void) = (f.s.clone(), Symbol::VOID);

        let values = f.results("MMV", Triple::new(s[0], s[4], void));
        assert_eq!(
            values,
            BTreeSet::from([Triple::new(s[0], s[4], s[1]), Triple::new(s[0], s[4], s[2])])
        );

        // Distinct attributes linking anything to s1.
        let attributes = f.results("IVM", Triple::new(void, void, s[1]));
        assert_eq!(
            attributes,
            BTreeSet::from([Triple::new(void, s[4], s[1]), Triple::new(void, s[5], s[1])])
        );

        let entities = f.results("VII", Triple::default());
        assert_eq!(
            entities,
            BTreeSet::from([Triple::new(s[0], void, void), Triple::new(s[3], void, void)])
        );

        assert_eq!(f.results("VVV", Triple::default()).len(), 4);
        assert_eq!(f.results("MMM", Triple::new(s[3], s[4], s[1])).len(), 1);
        assert!(f.results("MMM", Triple::new(s[3], s[4], s[2])).is_empty());
    }

    #[test]
    fn test_unknown_symbol_yields_nothing() {
        let mut f = Fixture::new(IndexMode::Tri);
        f.link(0, 1, 2);
        let unknown = f.s[7];
        for s in ["MVV", "VMV", "VVM", "MIV"] {
            let pattern = Triple::new(unknown, unknown, unknown);
            assert!(f.results(s, pattern).is_empty(), "{s}");
        }
    }

    #[test]
    fn test_count_without_callback() {
        let mut f = Fixture::new(IndexMode::Mono);
        f.link(0, 1, 2);
        f.link(3, 1, 2);
        let pattern = Triple::new(Symbol::VOID, f.s[1], f.s[2]);
        let count = f
            .index
            .query(&mut f.store, shape("VMM"), &pattern, None)
            .expect("query");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_modes_agree_on_every_shape() {
        let mut fixtures: Vec<Fixture> = IndexMode::ALL.into_iter().map(Fixture::new).collect();
        let edges = [
            (0, 1, 2),
            (0, 1, 3),
            (0, 4, 2),
            (2, 1, 0),
            (3, 3, 3),
            (5, 4, 2),
            (5, 1, 6),
            (6, 6, 0),
        ];
        for fixture in &mut fixtures {
            for &(e, a, v) in &edges {
                fixture.link(e, a, v);
            }
        }

        let symbols = fixtures[0].s.clone();
        for s in QueryShape::all().filter(|s| s.plan().is_ok()) {
            for &anchor in &symbols[..7] {
                let pattern = Triple::new(anchor, anchor, anchor);
                let expected = fixtures[2].results(&s.to_string(), pattern);
                for fixture in &mut fixtures[..2] {
                    let mode = fixture.index.mode();
                    assert_eq!(
                        fixture.results(&s.to_string(), pattern),
                        expected,
                        "{s} in {mode} for {anchor}"
                    );
                }
            }
        }
    }
}
