//! Vocabulary: bidirectional name ↔ id interning for concepts, roles and features.
//!
//! Ids are dense and handed out in insertion order. `⊤` and `⊥` are interned
//! first so they always receive [`Concept::TOP`] and [`Concept::BOTTOM`].
//! Feature restrictions get *synthetic* concept ids so the saturation engine
//! can treat them like atomic concepts; synthetic concepts never appear in
//! the taxonomy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AxiomError;

use super::{Axiom, Concept, Datatype, Feature, Role};

const TOP_NAME: &str = "⊤";
const BOTTOM_NAME: &str = "⊥";

/// Name tables for concepts, roles and features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    concept_names: Vec<String>,
    concept_ids: HashMap<String, Concept>,
    role_names: Vec<String>,
    role_ids: HashMap<String, Role>,
    feature_names: Vec<String>,
    feature_ids: HashMap<String, Feature>,
    /// Synthetic concept → the restriction it stands for.
    restrictions: HashMap<Concept, Datatype>,
    /// Restriction → its synthetic concept.
    restriction_ids: HashMap<Datatype, Concept>,
}

impl Vocabulary {
    /// Create a vocabulary holding only `⊤` and `⊥`.
    pub fn new() -> Self {
        let mut vocab = Self {
            concept_names: Vec::new(),
            concept_ids: HashMap::new(),
            role_names: Vec::new(),
            role_ids: HashMap::new(),
            feature_names: Vec::new(),
            feature_ids: HashMap::new(),
            restrictions: HashMap::new(),
            restriction_ids: HashMap::new(),
        };
        vocab.concept(TOP_NAME);
        vocab.concept(BOTTOM_NAME);
        vocab
    }

    /// Intern a concept name, returning its existing id if already known.
    pub fn concept(&mut self, name: &str) -> Concept {
        if let Some(&id) = self.concept_ids.get(name) {
            return id;
        }
        let id = Concept::new(self.concept_names.len() as u32);
        self.concept_names.push(name.to_string());
        self.concept_ids.insert(name.to_string(), id);
        id
    }

    /// Intern a role name.
    pub fn role(&mut self, name: &str) -> Role {
        if let Some(&id) = self.role_ids.get(name) {
            return id;
        }
        let id = Role::new(self.role_names.len() as u32);
        self.role_names.push(name.to_string());
        self.role_ids.insert(name.to_string(), id);
        id
    }

    /// Intern a feature name.
    pub fn feature(&mut self, name: &str) -> Feature {
        if let Some(&id) = self.feature_ids.get(name) {
            return id;
        }
        let id = Feature::new(self.feature_names.len() as u32);
        self.feature_names.push(name.to_string());
        self.feature_ids.insert(name.to_string(), id);
        id
    }

    /// The synthetic concept standing for a feature restriction, allocating it on first use.
    pub fn restriction_concept(&mut self, restriction: &Datatype) -> Concept {
        if let Some(&id) = self.restriction_ids.get(restriction) {
            return id;
        }
        let id = Concept::new(self.concept_names.len() as u32);
        self.concept_names.push(format!("({restriction})"));
        self.restrictions.insert(id, restriction.clone());
        self.restriction_ids.insert(restriction.clone(), id);
        id
    }

    /// Look up a concept by name without interning it.
    pub fn lookup_concept(&self, name: &str) -> Option<Concept> {
        self.concept_ids.get(name).copied()
    }

    /// Look up a role by name without interning it.
    pub fn lookup_role(&self, name: &str) -> Option<Role> {
        self.role_ids.get(name).copied()
    }

    /// The name of a concept, falling back to its numeric form.
    pub fn concept_name(&self, id: Concept) -> String {
        self.concept_names
            .get(id.index())
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// The name of a role, falling back to its numeric form.
    pub fn role_name(&self, id: Role) -> String {
        self.role_names
            .get(id.index())
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// The synthetic concept of an already interned restriction.
    pub fn lookup_restriction(&self, restriction: &Datatype) -> Option<Concept> {
        self.restriction_ids.get(restriction).copied()
    }

    /// The restriction behind a synthetic concept.
    pub fn restriction(&self, id: Concept) -> Option<&Datatype> {
        self.restrictions.get(&id)
    }

    /// Synthetic concepts of every restriction on `feature`, ascending.
    pub fn restrictions_on(&self, feature: Feature) -> Vec<Concept> {
        let mut ids: Vec<Concept> = self
            .restrictions
            .iter()
            .filter(|(_, restriction)| restriction.feature == feature)
            .map(|(&id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    /// Whether a concept was allocated for a feature restriction.
    pub fn is_synthetic(&self, id: Concept) -> bool {
        self.restrictions.contains_key(&id)
    }

    /// Number of concepts, synthetic ones included.
    pub fn concept_count(&self) -> usize {
        self.concept_names.len()
    }

    pub fn role_count(&self) -> usize {
        self.role_names.len()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// All named (non-synthetic) concepts in id order.
    pub fn named_concepts(&self) -> impl Iterator<Item = Concept> + '_ {
        (0..self.concept_names.len() as u32)
            .map(Concept::new)
            .filter(|c| !self.is_synthetic(*c))
    }

    /// Cross-check the tables of a decoded vocabulary.
    pub(crate) fn check_tables(&self) -> Result<(), String> {
        if self.concept_names.get(Concept::TOP.index()).map(String::as_str) != Some(TOP_NAME)
            || self.concept_names.get(Concept::BOTTOM.index()).map(String::as_str) != Some(BOTTOM_NAME)
        {
            return Err("vocabulary does not start with ⊤ and ⊥".to_string());
        }
        let concepts = self.concept_names.len();
        if let Some((name, id)) = self.concept_ids.iter().find(|(_, id)| id.index() >= concepts) {
            return Err(format!("concept {name:?} has id {id} of {concepts}"));
        }
        if let Some((name, id)) = self.role_ids.iter().find(|(_, id)| id.index() >= self.role_names.len()) {
            return Err(format!("role {name:?} has id {id} of {}", self.role_names.len()));
        }
        let features = self.feature_names.len();
        if let Some((name, id)) = self.feature_ids.iter().find(|(_, id)| id.get() as usize >= features) {
            return Err(format!("feature {name:?} has id {id} of {features}"));
        }
        for (id, restriction) in &self.restrictions {
            if id.index() >= concepts || restriction.feature.get() as usize >= features {
                return Err(format!("restriction {id} ({restriction}) is out of range"));
            }
            if self.restriction_ids.get(restriction) != Some(id) {
                return Err(format!("restriction {id} ({restriction}) has no reverse entry"));
            }
        }
        if self.restriction_ids.len() != self.restrictions.len() {
            return Err("restriction tables disagree".to_string());
        }
        Ok(())
    }

    /// Check that every id mentioned by `axiom` is known.
    pub fn validate(&self, axiom: &Axiom) -> Result<(), AxiomError> {
        for concept in axiom.concepts_in_axiom() {
            if concept.index() >= self.concept_names.len() {
                return Err(AxiomError::UnknownConcept {
                    id: concept.get(),
                    known: self.concept_names.len(),
                });
            }
        }
        for role in axiom.roles_in_axiom() {
            if role.index() >= self.role_names.len() {
                return Err(AxiomError::UnknownRole {
                    id: role.get(),
                    known: self.role_names.len(),
                });
            }
        }
        if let Axiom::DatatypeSup { restriction, .. } | Axiom::DatatypeSub { restriction, .. } =
            axiom
        {
            if restriction.feature.get() as usize >= self.feature_names.len() {
                return Err(AxiomError::UnknownFeature {
                    id: restriction.feature.get(),
                    known: self.feature_names.len(),
                });
            }
        }
        Ok(())
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}
