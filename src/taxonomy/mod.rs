//! Classified taxonomy: equivalence-class nodes linked into a DAG.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Node ids
//! follow representative order (the lowest concept id of each class), so
//! the same axioms always produce the same arena regardless of how many
//! workers built it. Synthetic restriction concepts never appear here.

pub mod builder;

use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::axiom::{Concept, Vocabulary};

pub use builder::{DirectSubsumption, Reduction, ReductionStats, TaxonomyBuilder};

/// Index of a node in the taxonomy arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n:{}", self.0)
    }
}

/// One equivalence class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Members in ascending id order; the first is the representative.
    pub equivalents: Vec<Concept>,
    /// Direct parents, ascending.
    pub parents: Vec<NodeId>,
    /// Direct children, ascending.
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn representative(&self) -> Concept {
        self.equivalents[0]
    }
}

/// The classified concept hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    nodes: Vec<Node>,
    node_of: HashMap<Concept, NodeId>,
    top: NodeId,
    bottom: NodeId,
}

impl Taxonomy {
    /// Assemble a taxonomy from a finished arena.
    pub(crate) fn from_nodes(nodes: Vec<Node>, top: NodeId, bottom: NodeId) -> Self {
        let node_of = nodes
            .iter()
            .flat_map(|node| node.equivalents.iter().map(move |&c| (c, node.id)))
            .collect();
        Self {
            nodes,
            node_of,
            top,
            bottom,
        }
    }

    /// Cross-check a decoded arena: ids in range and the concept index in
    /// agreement with the nodes.
    pub(crate) fn check_links(&self, concept_count: usize) -> Result<(), String> {
        let len = self.nodes.len();
        if self.top.index() >= len || self.bottom.index() >= len {
            return Err(format!("sentinel node out of range ({len} nodes)"));
        }
        let mut classified = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.id.index() != i {
                return Err(format!("node {} stored at slot {i}", node.id));
            }
            if node.equivalents.is_empty() {
                return Err(format!("node {} has no members", node.id));
            }
            if let Some(c) = node.equivalents.iter().find(|c| c.index() >= concept_count) {
                return Err(format!("node {} holds unknown concept {c}", node.id));
            }
            if let Some(link) = node.parents.iter().chain(&node.children).find(|l| l.index() >= len) {
                return Err(format!("node {} links to missing node {link}", node.id));
            }
            if node.equivalents.iter().any(|c| self.node_of.get(c) != Some(&node.id)) {
                return Err(format!("node {} is not indexed by its members", node.id));
            }
            classified += node.equivalents.len();
        }
        if classified != self.node_of.len() {
            return Err("concept index disagrees with the nodes".to_string());
        }
        Ok(())
    }

    /// Node holding `⊤`.
    pub fn top(&self) -> NodeId {
        self.top
    }

    /// Node holding `⊥` and every unsatisfiable concept.
    ///
    /// Equal to [`Taxonomy::top`] when `⊤` itself is unsatisfiable.
    pub fn bottom(&self) -> NodeId {
        self.bottom
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of equivalence classes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node a concept belongs to, if it was classified.
    pub fn node_of(&self, concept: Concept) -> Option<NodeId> {
        self.node_of.get(&concept).copied()
    }

    /// Lowest-id member of the concept's equivalence class.
    pub fn representative(&self, concept: Concept) -> Option<Concept> {
        self.node_of(concept).map(|id| self.node(id).representative())
    }

    /// Every member of the concept's equivalence class, itself included.
    pub fn equivalents(&self, concept: Concept) -> &[Concept] {
        match self.node_of(concept) {
            Some(id) => &self.node(id).equivalents,
            None => &[],
        }
    }

    /// Representatives of the concept's direct parents.
    pub fn parents(&self, concept: Concept) -> Vec<Concept> {
        self.linked(concept, |node| &node.parents)
    }

    /// Representatives of the concept's direct children.
    pub fn children(&self, concept: Concept) -> Vec<Concept> {
        self.linked(concept, |node| &node.children)
    }

    fn linked(&self, concept: Concept, links: impl Fn(&Node) -> &Vec<NodeId>) -> Vec<Concept> {
        self.node_of(concept)
            .map(|id| {
                links(self.node(id))
                    .iter()
                    .map(|&n| self.node(n).representative())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `concept` is unsatisfiable.
    pub fn is_unsatisfiable(&self, concept: Concept) -> bool {
        self.node_of(concept) == Some(self.bottom)
    }

    /// Representatives of every strict ancestor, ascending.
    pub fn ancestors(&self, concept: Concept) -> Vec<Concept> {
        let Some(start) = self.node_of(concept) else {
            return Vec::new();
        };
        self.ancestor_nodes(start)
            .into_iter()
            .map(|id| self.node(id).representative())
            .collect()
    }

    fn ancestor_nodes(&self, start: NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for &parent in &self.node(current).parents {
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        seen
    }

    /// Whether `descendant` is strictly below `ancestor`.
    ///
    /// Members of the same equivalence class are not descendants of each
    /// other. Concepts missing from the taxonomy are never descendants.
    pub fn is_descendant(&self, descendant: Concept, ancestor: Concept) -> bool {
        let (Some(low), Some(high)) = (self.node_of(descendant), self.node_of(ancestor)) else {
            return false;
        };
        if low == high {
            return false;
        }
        self.ancestor_nodes(low).contains(&high)
    }

    /// Render the hierarchy as an indented tree, one line per node.
    ///
    /// Nodes reachable through several parents are printed under each of them.
    pub fn render(&self, vocab: &Vocabulary) -> String {
        let mut out = String::new();
        self.render_node(self.top, 0, vocab, &mut out);
        out
    }

    fn render_node(&self, id: NodeId, depth: usize, vocab: &Vocabulary, out: &mut String) {
        let node = self.node(id);
        let names: Vec<String> = node
            .equivalents
            .iter()
            .map(|&c| vocab.concept_name(c))
            .collect();
        out.push_str(&"  ".repeat(depth));
        out.push_str(&names.join(" ≡ "));
        out.push('\n');
        for &child in &node.children {
            if child != self.bottom {
                self.render_node(child, depth + 1, vocab, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(raw: u32) -> Concept {
        Concept::new(raw)
    }

    /// ⊤ ← {2, 5} ← 3 ← ⊥, plus ⊤ ← 4 ← ⊥
    fn sample() -> Taxonomy {
        let node = |id: u32, equivalents: Vec<u32>, parents: Vec<u32>, children: Vec<u32>| Node {
            id: NodeId(id),
            equivalents: equivalents.into_iter().map(c).collect(),
            parents: parents.into_iter().map(NodeId).collect(),
            children: children.into_iter().map(NodeId).collect(),
        };
        Taxonomy::from_nodes(
            vec![
                node(0, vec![0], vec![], vec![2, 4]),
                node(1, vec![1], vec![3, 4], vec![]),
                node(2, vec![2, 5], vec![0], vec![3]),
                node(3, vec![3], vec![2], vec![1]),
                node(4, vec![4], vec![0], vec![1]),
            ],
            NodeId(0),
            NodeId(1),
        )
    }

    #[test]
    fn dangling_links_are_detected() {
        let mut tax = sample();
        assert!(tax.check_links(6).is_ok());
        assert!(tax.check_links(5).is_err());
        tax.nodes[3].parents.push(NodeId(9));
        assert!(tax.check_links(6).unwrap_err().contains("missing node n:9"));
    }

    #[test]
    fn queries_resolve_through_representatives() {
        let tax = sample();
        assert_eq!(tax.representative(c(5)), Some(c(2)));
        assert_eq!(tax.equivalents(c(5)), &[c(2), c(5)]);
        assert_eq!(tax.parents(c(3)), vec![c(2)]);
        assert_eq!(tax.children(c(5)), vec![c(3)]);
        assert_eq!(tax.children(Concept::TOP), vec![c(2), c(4)]);
        assert!(tax.parents(c(99)).is_empty());
        assert!(tax.equivalents(c(99)).is_empty());
    }

    #[test]
    fn descendant_is_strict_and_transitive() {
        let tax = sample();
        assert!(tax.is_descendant(c(3), Concept::TOP));
        assert!(tax.is_descendant(c(3), c(5)));
        assert!(!tax.is_descendant(c(2), c(5)));
        assert!(!tax.is_descendant(c(4), c(2)));
        assert!(tax.is_descendant(Concept::BOTTOM, c(4)));
        assert_eq!(tax.ancestors(c(3)), vec![Concept::TOP, c(2)]);
    }

    #[test]
    fn render_indents_children() {
        let mut vocab = Vocabulary::new();
        for name in ["A", "B", "C", "D"] {
            vocab.concept(name);
        }
        let text = sample().render(&vocab);
        assert_eq!(text, "⊤\n  A ≡ D\n    B\n  C\n");
    }
}
