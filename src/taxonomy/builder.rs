//! Taxonomy construction from saturated contexts.
//!
//! Two passes over the frozen superconcept sets:
//!
//! 1. **Reduction** (parallel, `rayon`): each named concept is classified as
//!    unsatisfiable or gets its equivalence class and direct superconcepts.
//!    Results land in the shared [`DirectSubsumption`] map. Entries whose
//!    inputs did not change since the previous build are kept as they are.
//! 2. **Linking** (worker pool): representatives become nodes; a queue of
//!    to-link nodes is drained, each worker wiring one node to its parents.
//!    Nodes that never gain a child end up as parents of `⊥`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::{DashMap, DashSet};
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::axiom::{Concept, Vocabulary};
use crate::error::{ReasonResult, ReasonerError};
use crate::progress::{Phase, ProgressHandle};
use crate::saturation::ConceptSet;
use crate::saturation::context::Context;
use crate::saturation::scheduler::{WorkQueue, run_workers};

use super::{Node, NodeId, Taxonomy};

/// What saturation says about one named concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reduction {
    /// `⊥` was derived.
    Unsatisfiable,
    Satisfiable {
        /// Named concepts mutually subsuming this one, ascending, itself included.
        equivalents: Vec<Concept>,
        /// Representatives of the direct superconcept classes, ascending.
        parents: Vec<Concept>,
    },
}

/// Concept → its reduction. Written concurrently during the reduction pass.
pub type DirectSubsumption = DashMap<Concept, Reduction>;

/// Counters from one reduction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReductionStats {
    /// Concepts whose entry was recomputed.
    pub reduced: usize,
    /// Concepts whose previous entry was kept.
    pub reused: usize,
}

/// Builds a [`Taxonomy`] from contexts at fixpoint.
pub struct TaxonomyBuilder<'a> {
    pool: &'a ThreadPool,
    contexts: &'a [Context],
    vocab: &'a Vocabulary,
    progress: &'a ProgressHandle,
    report_every: usize,
}

impl<'a> TaxonomyBuilder<'a> {
    pub fn new(
        pool: &'a ThreadPool,
        contexts: &'a [Context],
        vocab: &'a Vocabulary,
        progress: &'a ProgressHandle,
        report_every: usize,
    ) -> Self {
        Self {
            pool,
            contexts,
            vocab,
            progress,
            report_every,
        }
    }

    /// Run both passes.
    pub fn build(&self, direct: &DirectSubsumption) -> ReasonResult<(Taxonomy, ReductionStats)> {
        let stats = self.reduce(direct)?;
        let taxonomy = self.link(direct)?;
        Ok((taxonomy, stats))
    }

    /// Fill `direct` for every named concept.
    ///
    /// An existing entry is kept unless the concept's own superconcept set,
    /// or that of one of its superconcepts, changed since the last build.
    pub fn reduce(&self, direct: &DirectSubsumption) -> ReasonResult<ReductionStats> {
        let named: Vec<Concept> = self.vocab.named_concepts().collect();
        let total = named.len();
        let reduced = AtomicUsize::new(0);
        let visited = AtomicUsize::new(0);

        self.pool.install(|| {
            named.par_iter().try_for_each(|&concept| {
                if self.progress.is_cancelled() {
                    return Err(ReasonerError::Cancelled);
                }
                let (supers, changed) = self.snapshot(concept);
                let stale = changed
                    || !direct.contains_key(&concept)
                    || supers.iter().any(|held| self.is_changed(held));
                if stale {
                    direct.insert(concept, self.reduce_one(concept, &supers));
                    reduced.fetch_add(1, Ordering::Relaxed);
                }

                let done = visited.fetch_add(1, Ordering::Relaxed) + 1;
                if self.report_every > 0 && done % self.report_every == 0 {
                    self.progress.report(Phase::Reduction, done, total);
                }
                Ok(())
            })
        })?;

        let reduced = reduced.into_inner();
        let stats = ReductionStats {
            reduced,
            reused: total - reduced,
        };
        tracing::debug!(reduced = stats.reduced, reused = stats.reused, "reduction finished");
        self.progress.report(Phase::Reduction, total, total);
        Ok(stats)
    }

    /// A copy of the concept's superconcepts and its changed flag.
    fn snapshot(&self, concept: Concept) -> (ConceptSet, bool) {
        let state = self.contexts[concept.index()].state();
        (state.supers.clone(), state.changed)
    }

    fn is_changed(&self, concept: Concept) -> bool {
        self.contexts[concept.index()].state().changed
    }

    /// Whether `sub`'s context has derived `sup`.
    fn subsumed_by(&self, sub: Concept, sup: Concept) -> bool {
        self.contexts[sub.index()].state().supers.contains(sup)
    }

    fn reduce_one(&self, concept: Concept, supers: &ConceptSet) -> Reduction {
        if supers.contains(Concept::BOTTOM) {
            return Reduction::Unsatisfiable;
        }

        let mut equivalents = Vec::new();
        // Antichain of direct superconcept classes seen so far, each held by
        // its lowest id.
        let mut direct: Vec<Concept> = Vec::new();
        for held in supers.iter() {
            if self.vocab.is_synthetic(held) {
                continue;
            }
            if held == concept || self.subsumed_by(held, concept) {
                equivalents.push(held);
                continue;
            }

            let mut implied = false;
            let mut merged = false;
            let mut evicted = Vec::new();
            for (slot, &kept) in direct.iter().enumerate() {
                let below = self.subsumed_by(held, kept);
                let above = self.subsumed_by(kept, held);
                if below && above {
                    merged = true;
                    if held < kept {
                        evicted.push(slot);
                    }
                    break;
                }
                if above {
                    implied = true;
                    break;
                }
                if below {
                    evicted.push(slot);
                }
            }

            if implied || (merged && evicted.is_empty()) {
                continue;
            }
            for slot in evicted.into_iter().rev() {
                direct.swap_remove(slot);
            }
            direct.push(held);
        }

        equivalents.sort();
        direct.sort();
        Reduction::Satisfiable {
            equivalents,
            parents: direct,
        }
    }

    /// Turn the reduction map into a linked node arena.
    pub fn link(&self, direct: &DirectSubsumption) -> ReasonResult<Taxonomy> {
        let mut unsatisfiable = Vec::new();
        let mut classes: Vec<(Vec<Concept>, Vec<Concept>)> = Vec::new();
        for concept in self.vocab.named_concepts() {
            let Some(entry) = direct.get(&concept) else {
                continue;
            };
            match entry.value() {
                Reduction::Unsatisfiable => unsatisfiable.push(concept),
                Reduction::Satisfiable {
                    equivalents,
                    parents,
                } => {
                    if equivalents.first() == Some(&concept) {
                        classes.push((equivalents.clone(), parents.clone()));
                    }
                }
            }
        }

        if unsatisfiable.contains(&Concept::TOP) {
            tracing::warn!(concepts = unsatisfiable.len(), "⊤ is unsatisfiable, taxonomy collapses");
            let only = NodeId::new(0);
            let node = Node {
                id: only,
                equivalents: unsatisfiable,
                parents: Vec::new(),
                children: Vec::new(),
            };
            return Ok(Taxonomy::from_nodes(vec![node], only, only));
        }

        // Representative order: ⊤ (id 0) first, then ⊥ (id 1), then the rest.
        let bottom_rep = unsatisfiable.first().copied().unwrap_or(Concept::BOTTOM);
        let mut reps: Vec<(Concept, Vec<Concept>, Vec<Concept>)> = classes
            .into_iter()
            .map(|(equivalents, parents)| (equivalents[0], equivalents, parents))
            .collect();
        reps.push((bottom_rep, unsatisfiable, Vec::new()));
        reps.sort_by_key(|(rep, _, _)| *rep);

        let node_of: HashMap<Concept, NodeId> = reps
            .iter()
            .enumerate()
            .map(|(i, (rep, _, _))| (*rep, NodeId::new(i as u32)))
            .collect();
        let top = node_of[&Concept::TOP];
        let bottom = node_of[&bottom_rep];

        let slots: Vec<LinkSlot> = reps.iter().map(|_| LinkSlot::default()).collect();
        let leaves: DashSet<NodeId> = DashSet::new();
        let queue: WorkQueue<NodeId> = WorkQueue::new();
        for id in (0..reps.len() as u32).map(NodeId::new) {
            if id != bottom {
                leaves.insert(id);
                queue.push(id);
            }
        }

        let total = queue.len();
        let linked = AtomicUsize::new(0);
        run_workers(self.pool, &queue, self.progress, |id| {
            let (_, _, parents) = &reps[id.index()];
            for parent in parents {
                let parent_id = node_of[parent];
                slots[id.index()].parents().insert(parent_id);
                slots[parent_id.index()].children().insert(id);
                leaves.remove(&parent_id);
            }
            let done = linked.fetch_add(1, Ordering::Relaxed) + 1;
            if self.report_every > 0 && done % self.report_every == 0 {
                self.progress.report(Phase::Linking, done, total);
            }
            Ok(())
        })?;

        for leaf in leaves.iter() {
            slots[leaf.index()].children().insert(bottom);
            slots[bottom.index()].parents().insert(*leaf);
        }

        let nodes: Vec<Node> = reps
            .into_iter()
            .zip(slots)
            .enumerate()
            .map(|(i, ((_, equivalents, _), slot))| {
                let (parents, children) = slot.into_links();
                Node {
                    id: NodeId::new(i as u32),
                    equivalents,
                    parents,
                    children,
                }
            })
            .collect();
        self.progress.report(Phase::Linking, total, total);
        Ok(Taxonomy::from_nodes(nodes, top, bottom))
    }
}

/// Per-node link sets guarded separately so two workers can wire
/// different ends of the arena at once.
#[derive(Default)]
struct LinkSlot {
    parents: Mutex<BTreeSet<NodeId>>,
    children: Mutex<BTreeSet<NodeId>>,
}

impl LinkSlot {
    fn parents(&self) -> std::sync::MutexGuard<'_, BTreeSet<NodeId>> {
        self.parents.lock().expect("node parents lock poisoned")
    }

    fn children(&self) -> std::sync::MutexGuard<'_, BTreeSet<NodeId>> {
        self.children.lock().expect("node children lock poisoned")
    }

    fn into_links(self) -> (Vec<NodeId>, Vec<NodeId>) {
        let parents = self
            .parents
            .into_inner()
            .expect("node parents lock poisoned");
        let children = self
            .children
            .into_inner()
            .expect("node children lock poisoned");
        (parents.into_iter().collect(), children.into_iter().collect())
    }
}
