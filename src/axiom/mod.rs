//! Normalized axiom model.
//!
//! Concepts, roles and features are interned integer ids handed out by a
//! [`Vocabulary`]. The saturation engine only ever sees the eight restricted
//! inclusion shapes of [`Axiom`]; translating a richer ontology language into
//! these shapes is the caller's job.

pub mod datatype;
pub mod vocab;

pub use datatype::{Datatype, Literal, Operator};
pub use vocab::Vocabulary;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Interned concept identifier.
///
/// Ids are dense: the vocabulary hands them out in order starting with the
/// two sentinels, so a concept id doubles as an index into per-concept
/// tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Concept(u32);

impl Concept {
    /// The universal concept `⊤`.
    pub const TOP: Self = Self(0);
    /// The empty concept `⊥`.
    pub const BOTTOM: Self = Self(1);

    /// Wrap a raw id. Whether the id is known is checked when axioms are loaded.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the underlying `u32` value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// The id as a table index.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is `⊤` or `⊥`.
    pub fn is_sentinel(self) -> bool {
        self == Self::TOP || self == Self::BOTTOM
    }
}

impl std::fmt::Display for Concept {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::TOP => write!(f, "⊤"),
            Self::BOTTOM => write!(f, "⊥"),
            Self(raw) => write!(f, "c:{raw}"),
        }
    }
}

/// Interned role (binary relation) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Role(u32);

impl Role {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r:{}", self.0)
    }
}

/// Interned feature (concrete-domain attribute) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Feature(u32);

impl Feature {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "f:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Normal forms
// ---------------------------------------------------------------------------

/// One of the eight normal forms the completion rules are written against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axiom {
    /// `left ⊓ right ⊑ sup`. Operands are stored in ascending order.
    Conjunction {
        left: Concept,
        right: Concept,
        sup: Concept,
    },
    /// `sub ⊑ ∃role.filler`.
    Existential {
        sub: Concept,
        role: Role,
        filler: Concept,
    },
    /// `∃role.filler ⊑ sup`.
    ExistentialSub {
        role: Role,
        filler: Concept,
        sup: Concept,
    },
    /// `sub ⊑ sup` over roles.
    RoleInclusion { sub: Role, sup: Role },
    /// `first ∘ second ⊑ sup`.
    RoleChain { first: Role, second: Role, sup: Role },
    /// `sub ⊑ sup`.
    Subsumption { sub: Concept, sup: Concept },
    /// `sub ⊑ (feature op value)`.
    DatatypeSup { sub: Concept, restriction: Datatype },
    /// `(feature op value) ⊑ sup`.
    DatatypeSub { restriction: Datatype, sup: Concept },
}

impl Axiom {
    /// `sub ⊑ sup`
    pub fn subsumption(sub: Concept, sup: Concept) -> Self {
        Axiom::Subsumption { sub, sup }
    }

    /// `a ⊓ b ⊑ sup`
    pub fn conjunction(a: Concept, b: Concept, sup: Concept) -> Self {
        let (left, right) = if a <= b { (a, b) } else { (b, a) };
        Axiom::Conjunction { left, right, sup }
    }

    /// `sub ⊑ ∃role.filler`
    pub fn existential(sub: Concept, role: Role, filler: Concept) -> Self {
        Axiom::Existential { sub, role, filler }
    }

    /// `∃role.filler ⊑ sup`
    pub fn existential_sub(role: Role, filler: Concept, sup: Concept) -> Self {
        Axiom::ExistentialSub { role, filler, sup }
    }

    /// `sub ⊑ sup` over roles
    pub fn role_inclusion(sub: Role, sup: Role) -> Self {
        Axiom::RoleInclusion { sub, sup }
    }

    /// `first ∘ second ⊑ sup`
    pub fn role_chain(first: Role, second: Role, sup: Role) -> Self {
        Axiom::RoleChain { first, second, sup }
    }

    /// `sub ⊑ restriction`
    pub fn datatype_sup(sub: Concept, restriction: Datatype) -> Self {
        Axiom::DatatypeSup { sub, restriction }
    }

    /// `restriction ⊑ sup`
    pub fn datatype_sub(restriction: Datatype, sup: Concept) -> Self {
        Axiom::DatatypeSub { restriction, sup }
    }

    /// All concept ids this axiom mentions.
    ///
    /// Datatype restrictions are not concepts until the vocabulary assigns
    /// them a synthetic id, so they are not listed here.
    pub fn concepts_in_axiom(&self) -> Vec<Concept> {
        match *self {
            Axiom::Conjunction { left, right, sup } => vec![left, right, sup],
            Axiom::Existential { sub, filler, .. } => vec![sub, filler],
            Axiom::ExistentialSub { filler, sup, .. } => vec![filler, sup],
            Axiom::RoleInclusion { .. } | Axiom::RoleChain { .. } => Vec::new(),
            Axiom::Subsumption { sub, sup } => vec![sub, sup],
            Axiom::DatatypeSup { sub, .. } => vec![sub],
            Axiom::DatatypeSub { sup, .. } => vec![sup],
        }
    }

    /// All role ids this axiom mentions.
    pub fn roles_in_axiom(&self) -> Vec<Role> {
        match *self {
            Axiom::Existential { role, .. } | Axiom::ExistentialSub { role, .. } => vec![role],
            Axiom::RoleInclusion { sub, sup } => vec![sub, sup],
            Axiom::RoleChain { first, second, sup } => vec![first, second, sup],
            _ => Vec::new(),
        }
    }

    /// Whether this axiom changes the role hierarchy (NF4/NF5).
    pub fn is_role_axiom(&self) -> bool {
        matches!(self, Axiom::RoleInclusion { .. } | Axiom::RoleChain { .. })
    }

    /// Concepts whose appearance in a superconcept set makes this axiom fire.
    ///
    /// `DatatypeSub` is triggered by restrictions on its feature rather than
    /// by a concept and reports no triggers here.
    pub fn trigger_concepts(&self) -> Vec<Concept> {
        match *self {
            Axiom::Conjunction { left, right, .. } => vec![left, right],
            Axiom::Existential { sub, .. } => vec![sub],
            Axiom::ExistentialSub { filler, .. } => vec![filler],
            Axiom::Subsumption { sub, .. } => vec![sub],
            Axiom::DatatypeSup { sub, .. } => vec![sub],
            Axiom::RoleInclusion { .. } | Axiom::RoleChain { .. } | Axiom::DatatypeSub { .. } => {
                Vec::new()
            }
        }
    }
}

impl std::fmt::Display for Axiom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axiom::Conjunction { left, right, sup } => write!(f, "{left} ⊓ {right} ⊑ {sup}"),
            Axiom::Existential { sub, role, filler } => write!(f, "{sub} ⊑ ∃{role}.{filler}"),
            Axiom::ExistentialSub { role, filler, sup } => write!(f, "∃{role}.{filler} ⊑ {sup}"),
            Axiom::RoleInclusion { sub, sup } => write!(f, "{sub} ⊑ {sup}"),
            Axiom::RoleChain { first, second, sup } => write!(f, "{first} ∘ {second} ⊑ {sup}"),
            Axiom::Subsumption { sub, sup } => write!(f, "{sub} ⊑ {sup}"),
            Axiom::DatatypeSup { sub, restriction } => write!(f, "{sub} ⊑ ({restriction})"),
            Axiom::DatatypeSub { restriction, sup } => write!(f, "({restriction}) ⊑ {sup}"),
        }
    }
}
