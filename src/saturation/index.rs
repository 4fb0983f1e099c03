//! Axiom index: told axioms keyed by the concept that triggers them.
//!
//! Every completion rule looks up the axioms triggered by one concept, so a
//! rule firing costs a few hash lookups rather than a scan of the axiom base.
//! Role inclusions are closed reflexively and transitively up front; role
//! chains are indexed by both of their components.

use std::collections::{HashMap, HashSet, VecDeque};

use dashmap::DashMap;

use crate::axiom::{Axiom, Concept, Datatype, Feature, Role, Vocabulary};
use crate::error::AxiomError;

// ---------------------------------------------------------------------------
// Role hierarchy
// ---------------------------------------------------------------------------

/// Reflexive-transitive role inclusion closure plus indexed role chains.
#[derive(Debug, Clone, Default)]
pub struct RoleHierarchy {
    /// For role r, every s with `r ⊑* s` (r itself first).
    supers: Vec<Vec<Role>>,
    /// `first → [(second, sup)]` for every `first ∘ second ⊑ sup`.
    chains_by_first: HashMap<Role, Vec<(Role, Role)>>,
    /// `second → [(first, sup)]` for every `first ∘ second ⊑ sup`.
    chains_by_second: HashMap<Role, Vec<(Role, Role)>>,
}

impl RoleHierarchy {
    /// Build the closure over `role_count` roles.
    pub fn build<'a>(axioms: impl IntoIterator<Item = &'a Axiom>, role_count: usize) -> Self {
        let mut direct: Vec<Vec<Role>> = vec![Vec::new(); role_count];
        let mut chains_by_first: HashMap<Role, Vec<(Role, Role)>> = HashMap::new();
        let mut chains_by_second: HashMap<Role, Vec<(Role, Role)>> = HashMap::new();

        for axiom in axioms {
            match *axiom {
                Axiom::RoleInclusion { sub, sup } => direct[sub.index()].push(sup),
                Axiom::RoleChain { first, second, sup } => {
                    chains_by_first.entry(first).or_default().push((second, sup));
                    chains_by_second.entry(second).or_default().push((first, sup));
                }
                _ => {}
            }
        }

        // BFS up from each role to collect every generalization.
        let supers = (0..role_count)
            .map(|start| {
                let start = Role::new(start as u32);
                let mut visited = HashSet::from([start]);
                let mut order = vec![start];
                let mut queue = VecDeque::from([start]);
                while let Some(current) = queue.pop_front() {
                    for &parent in &direct[current.index()] {
                        if visited.insert(parent) {
                            order.push(parent);
                            queue.push_back(parent);
                        }
                    }
                }
                order
            })
            .collect();

        Self {
            supers,
            chains_by_first,
            chains_by_second,
        }
    }

    /// Every role `s` with `role ⊑* s`, including `role`.
    ///
    /// Empty for roles interned after the hierarchy was built.
    pub fn supers_of(&self, role: Role) -> &[Role] {
        self.supers
            .get(role.index())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `sub ⊑* sup`.
    pub fn is_sub_role(&self, sub: Role, sup: Role) -> bool {
        self.supers
            .get(sub.index())
            .is_some_and(|s| s.contains(&sup))
            || sub == sup
    }

    /// `(second, sup)` for every chain starting with `first`.
    pub fn chains_with_first(&self, first: Role) -> &[(Role, Role)] {
        self.chains_by_first
            .get(&first)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// `(first, sup)` for every chain ending with `second`.
    pub fn chains_with_second(&self, second: Role) -> &[(Role, Role)] {
        self.chains_by_second
            .get(&second)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Axiom index
// ---------------------------------------------------------------------------

/// Told axioms indexed by trigger concept, shared read-only by all workers.
#[derive(Debug, Default)]
pub struct AxiomIndex {
    /// NF6 and NF7: `sub → [sup]` (NF7 targets are synthetic concepts).
    subsumptions: HashMap<Concept, Vec<Concept>>,
    /// NF1: `operand → [(other operand, sup)]`.
    conjunctions: HashMap<Concept, Vec<(Concept, Concept)>>,
    /// NF2: `sub → [(role, filler)]`.
    existentials: HashMap<Concept, Vec<(Role, Concept)>>,
    /// NF3: `filler → [(role, sup)]`.
    existential_subs: HashMap<Concept, Vec<(Role, Concept)>>,
    /// NF8: `feature → [(restriction concept, sup)]`.
    datatype_subs: HashMap<Feature, Vec<(Concept, Concept)>>,
    /// Synthetic concept → its restriction, for every restriction mentioned.
    restrictions: HashMap<Concept, Datatype>,
    /// Memoized `entails(left, right)` answers keyed by synthetic concepts.
    entailments: DashMap<(Concept, Concept), bool>,
    roles: RoleHierarchy,
}

impl AxiomIndex {
    /// Index the given axioms. Feature restrictions are interned into `vocab`.
    pub fn build<'a>(axioms: impl IntoIterator<Item = &'a Axiom>, vocab: &mut Vocabulary) -> Self {
        let axioms: Vec<&Axiom> = axioms.into_iter().collect();
        let mut index = Self {
            roles: RoleHierarchy::build(axioms.iter().copied(), vocab.role_count()),
            ..Default::default()
        };

        for axiom in axioms {
            match axiom {
                Axiom::Conjunction { left, right, sup } => {
                    index
                        .conjunctions
                        .entry(*left)
                        .or_default()
                        .push((*right, *sup));
                    if left != right {
                        index
                            .conjunctions
                            .entry(*right)
                            .or_default()
                            .push((*left, *sup));
                    }
                }
                Axiom::Existential { sub, role, filler } => {
                    index
                        .existentials
                        .entry(*sub)
                        .or_default()
                        .push((*role, *filler));
                }
                Axiom::ExistentialSub { role, filler, sup } => {
                    index
                        .existential_subs
                        .entry(*filler)
                        .or_default()
                        .push((*role, *sup));
                }
                Axiom::Subsumption { sub, sup } => {
                    index.subsumptions.entry(*sub).or_default().push(*sup);
                }
                Axiom::DatatypeSup { sub, restriction } => {
                    let synthetic = vocab.restriction_concept(restriction);
                    index.restrictions.insert(synthetic, restriction.clone());
                    index.subsumptions.entry(*sub).or_default().push(synthetic);
                }
                Axiom::DatatypeSub { restriction, sup } => {
                    let synthetic = vocab.restriction_concept(restriction);
                    index.restrictions.insert(synthetic, restriction.clone());
                    index
                        .datatype_subs
                        .entry(restriction.feature)
                        .or_default()
                        .push((synthetic, *sup));
                }
                Axiom::RoleInclusion { .. } | Axiom::RoleChain { .. } => {}
            }
        }
        index
    }

    pub fn subsumptions(&self, sub: Concept) -> &[Concept] {
        slice_of(&self.subsumptions, &sub)
    }

    pub fn conjunctions(&self, operand: Concept) -> &[(Concept, Concept)] {
        slice_of(&self.conjunctions, &operand)
    }

    pub fn existentials(&self, sub: Concept) -> &[(Role, Concept)] {
        slice_of(&self.existentials, &sub)
    }

    pub fn existential_subs(&self, filler: Concept) -> &[(Role, Concept)] {
        slice_of(&self.existential_subs, &filler)
    }

    pub fn roles(&self) -> &RoleHierarchy {
        &self.roles
    }

    /// The restriction behind a synthetic concept, if `concept` is one.
    pub fn restriction(&self, concept: Concept) -> Option<&Datatype> {
        self.restrictions.get(&concept)
    }

    /// Superconcepts implied by holding restriction concept `held`.
    ///
    /// Each restriction pair is compared at most once per index; the answer
    /// is memoized so the comparison is shared by every context.
    pub fn datatype_consequences(&self, held: Concept) -> Result<Vec<Concept>, AxiomError> {
        let Some(restriction) = self.restrictions.get(&held) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for &(candidate, sup) in slice_of(&self.datatype_subs, &restriction.feature) {
            if candidate == held || self.entails(held, restriction, candidate)? {
                out.push(sup);
            }
        }
        Ok(out)
    }

    fn entails(
        &self,
        held: Concept,
        restriction: &Datatype,
        candidate: Concept,
    ) -> Result<bool, AxiomError> {
        if let Some(known) = self.entailments.get(&(held, candidate)) {
            return Ok(*known);
        }
        let answer = match self.restrictions.get(&candidate) {
            Some(other) => restriction.entails(other)?,
            None => false,
        };
        self.entailments.insert((held, candidate), answer);
        Ok(answer)
    }
}

fn slice_of<'a, K: std::hash::Hash + Eq, V>(map: &'a HashMap<K, Vec<V>>, key: &K) -> &'a [V] {
    map.get(key).map(|v| v.as_slice()).unwrap_or(&[])
}
