//! Triples, index orientations and index granularity.

use std::fmt;
use std::str::FromStr;

use super::Symbol;
use crate::containers::Element;

/// Position of the entity in a triple.
pub const ENTITY: usize = 0;
/// Position of the attribute in a triple.
pub const ATTRIBUTE: usize = 1;
/// Position of the value in a triple.
pub const VALUE: usize = 2;

/// A fact: `entity` has `attribute` with `value`.
///
/// Triples are identified structurally; the index holds each at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Triple {
    pub entity: Symbol,
    pub attribute: Symbol,
    pub value: Symbol,
}

impl Triple {
    #[must_use]
    pub const fn new(entity: Symbol, attribute: Symbol, value: Symbol) -> Self {
        Self {
            entity,
            attribute,
            value,
        }
    }

    /// The symbol at `position` (0 entity, 1 attribute, 2 value).
    #[must_use]
    pub const fn get(&self, position: usize) -> Symbol {
        match position {
            ENTITY => self.entity,
            ATTRIBUTE => self.attribute,
            _ => self.value,
        }
    }

    pub const fn set(&mut self, position: usize, symbol: Symbol) {
        match position {
            ENTITY => self.entity = symbol,
            ATTRIBUTE => self.attribute = symbol,
            _ => self.value = symbol,
        }
    }

    /// The three symbols, entity first.
    #[must_use]
    pub const fn symbols(&self) -> [Symbol; 3] {
        [self.entity, self.attribute, self.value]
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.entity, self.attribute, self.value)
    }
}

impl Element for Triple {
    const WORDS: usize = 3;

    fn store(&self, out: &mut [u64]) {
        out[0] = self.entity.0;
        out[1] = self.attribute.0;
        out[2] = self.value.0;
    }

    fn load(words: &[u64]) -> Self {
        Self::new(Symbol(words[0]), Symbol(words[1]), Symbol(words[2]))
    }
}

/// Key order of a sub-index.
///
/// An orientation names which triple position becomes the alpha (the symbol
/// owning the record), the beta (map key) and the gamma (set member). The
/// first three are rotations of EAV; the last three swap beta and gamma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Eav,
    Ave,
    Vea,
    Eva,
    Aev,
    Vae,
}

impl Orientation {
    pub const ALL: [Self; 6] = [
        Self::Eav,
        Self::Ave,
        Self::Vea,
        Self::Eva,
        Self::Aev,
        Self::Vae,
    ];

    /// Triple positions of alpha, beta and gamma.
    #[must_use]
    pub const fn positions(self) -> [usize; 3] {
        match self {
            Self::Eav => [ENTITY, ATTRIBUTE, VALUE],
            Self::Ave => [ATTRIBUTE, VALUE, ENTITY],
            Self::Vea => [VALUE, ENTITY, ATTRIBUTE],
            Self::Eva => [ENTITY, VALUE, ATTRIBUTE],
            Self::Aev => [ATTRIBUTE, ENTITY, VALUE],
            Self::Vae => [VALUE, ATTRIBUTE, ENTITY],
        }
    }

    /// Slot of this orientation in an index record.
    #[must_use]
    pub const fn slot(self) -> usize {
        self as usize
    }

    /// The rotation whose alpha is `position`.
    #[must_use]
    pub const fn forward(position: usize) -> Self {
        match position {
            ENTITY => Self::Eav,
            ATTRIBUTE => Self::Ave,
            _ => Self::Vea,
        }
    }

    /// The inverted orientation whose alpha is `position`.
    #[must_use]
    pub const fn inverse(position: usize) -> Self {
        match position {
            ENTITY => Self::Eva,
            ATTRIBUTE => Self::Aev,
            _ => Self::Vae,
        }
    }

    /// The rotation sharing this orientation's alpha.
    #[must_use]
    pub const fn rotation(self) -> Self {
        Self::forward(self.positions()[0])
    }

    #[must_use]
    pub const fn is_inverse(self) -> bool {
        matches!(self, Self::Eva | Self::Aev | Self::Vae)
    }

    /// Reorder a triple into alpha, beta, gamma.
    #[must_use]
    pub const fn arrange(self, triple: &Triple) -> [Symbol; 3] {
        let [a, b, g] = self.positions();
        [triple.get(a), triple.get(b), triple.get(g)]
    }

    /// Rebuild a triple from alpha, beta, gamma.
    #[must_use]
    pub const fn restore(self, keys: [Symbol; 3]) -> Triple {
        let [a, b, g] = self.positions();
        let mut triple = Triple::new(Symbol::VOID, Symbol::VOID, Symbol::VOID);
        triple.set(a, keys[0]);
        triple.set(b, keys[1]);
        triple.set(g, keys[2]);
        triple
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Eav => "EAV",
            Self::Ave => "AVE",
            Self::Vea => "VEA",
            Self::Eva => "EVA",
            Self::Aev => "AEV",
            Self::Vae => "VAE",
        };
        f.write_str(name)
    }
}

/// How many orientations the index maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexMode {
    /// EAV only.
    Mono,
    /// The three rotations.
    Tri,
    /// Rotations and their inverses.
    #[default]
    Hexa,
}

impl IndexMode {
    pub const ALL: [Self; 3] = [Self::Mono, Self::Tri, Self::Hexa];

    /// Orientations maintained in this mode.
    #[must_use]
    pub fn orientations(self) -> &'static [Orientation] {
        match self {
            Self::Mono => &Orientation::ALL[..1],
            Self::Tri => &Orientation::ALL[..3],
            Self::Hexa => &Orientation::ALL,
        }
    }

    #[must_use]
    pub fn is_active(self, orientation: Orientation) -> bool {
        self.orientations().contains(&orientation)
    }

    /// Orientations rooted at triple `position`.
    pub fn rooted_at(self, position: usize) -> impl Iterator<Item = Orientation> {
        self.orientations()
            .iter()
            .copied()
            .filter(move |o| o.positions()[0] == position)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mono => "mono",
            Self::Tri => "tri",
            Self::Hexa => "hexa",
        }
    }

    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Mono => 1,
            Self::Tri => 3,
            Self::Hexa => 6,
        }
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Mono),
            3 => Some(Self::Tri),
            6 => Some(Self::Hexa),
            _ => None,
        }
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mono" => Ok(Self::Mono),
            "tri" => Ok(Self::Tri),
            "hexa" => Ok(Self::Hexa),
            other => Err(format!("expected mono, tri or hexa, got {other:?}")),
        }
    }
}
