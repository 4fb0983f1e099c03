//! Saturation: run completion rules over every context until global fixpoint.
//!
//! - [`concept_set`]: compact integer set for derived superconcepts
//! - [`context`]: per-concept state, todo queue and activation flag
//! - [`index`]: told axioms indexed by trigger concept, role closure
//! - [`rules`]: the completion rules
//! - [`scheduler`]: shared dirty-context queue and worker pool

pub mod concept_set;
pub mod context;
pub mod index;
pub mod rules;
pub mod scheduler;

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::ThreadPool;

use crate::axiom::Concept;
use crate::error::ReasonResult;
use crate::progress::{Phase, ProgressHandle};

use self::context::Context;
use self::index::AxiomIndex;
use self::rules::RuleEngine;
use self::scheduler::{WorkQueue, run_workers};

pub use self::concept_set::ConceptSet;

/// Counters from one saturation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaturationStats {
    /// Contexts dequeued (a context may be dequeued several times).
    pub activations: usize,
    /// Todo entries applied.
    pub entries: usize,
}

/// Drive every context with pending entries to global fixpoint.
///
/// Returns once the dirty queue is empty and no context is owned. On error
/// or cancellation some contexts may be left active with pending entries;
/// the caller must reset them before saturating again.
pub fn saturate(
    pool: &ThreadPool,
    contexts: &[Context],
    index: &AxiomIndex,
    progress: &ProgressHandle,
    report_every: usize,
) -> ReasonResult<SaturationStats> {
    let engine = RuleEngine::new(index, contexts);
    let queue: WorkQueue<Concept> = WorkQueue::new();
    for ctx in contexts {
        if ctx.has_pending() && ctx.try_activate() {
            queue.push(ctx.concept());
        }
    }

    let dirty = queue.len();
    let activations = AtomicUsize::new(0);
    let entries = AtomicUsize::new(0);
    tracing::debug!(dirty, contexts = contexts.len(), "saturation started");

    run_workers(pool, &queue, progress, |concept| {
        let ctx = &contexts[concept.index()];
        let applied = engine.process(ctx, &mut |woken| queue.push(woken))?;
        entries.fetch_add(applied, Ordering::Relaxed);

        ctx.deactivate();
        // Entries that landed between the last pop and the release would
        // otherwise be stranded: their sender saw the flag still set.
        if ctx.has_pending() && ctx.try_activate() {
            queue.push(concept);
        }

        let done = activations.fetch_add(1, Ordering::Relaxed) + 1;
        if report_every > 0 && done % report_every == 0 {
            progress.report(Phase::Saturation, done, dirty.max(done));
        }
        Ok(())
    })?;

    let stats = SaturationStats {
        activations: activations.into_inner(),
        entries: entries.into_inner(),
    };
    progress.report(Phase::Saturation, stats.activations, stats.activations);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axiom::{Axiom, Vocabulary};
    use crate::saturation::scheduler::build_pool;

    fn run(axioms: &[Axiom], vocab: &mut Vocabulary, threads: usize) -> Vec<Context> {
        let index = AxiomIndex::build(axioms, vocab);
        let contexts: Vec<Context> = (0..vocab.concept_count() as u32)
            .map(|raw| Context::new(Concept::new(raw)))
            .collect();
        let pool = build_pool(threads).unwrap();
        saturate(&pool, &contexts, &index, &ProgressHandle::none(), 0).unwrap();
        contexts
    }

    #[test]
    fn chain_saturates_with_many_workers() {
        let mut vocab = Vocabulary::new();
        let concepts: Vec<Concept> = (0..200).map(|i| vocab.concept(&format!("C{i}"))).collect();
        let axioms: Vec<Axiom> = concepts
            .windows(2)
            .map(|w| Axiom::subsumption(w[0], w[1]))
            .collect();
        let contexts = run(&axioms, &mut vocab, 8);

        let first = contexts[concepts[0].index()].state();
        // Every chain member, itself and ⊤.
        assert_eq!(first.supers.len(), 201);
        for ctx in &contexts {
            assert!(!ctx.is_active(), "context {} left active", ctx.concept());
            assert!(!ctx.has_pending());
        }
    }

    #[test]
    fn results_do_not_depend_on_worker_count() {
        let mut vocab = Vocabulary::new();
        let r = vocab.role("r");
        let concepts: Vec<Concept> = (0..60).map(|i| vocab.concept(&format!("C{i}"))).collect();
        let mut axioms = Vec::new();
        for (i, w) in concepts.windows(3).enumerate() {
            if i % 2 == 0 {
                axioms.push(Axiom::existential(w[0], r, w[1]));
                axioms.push(Axiom::existential_sub(r, w[1], w[2]));
            } else {
                axioms.push(Axiom::conjunction(w[0], w[1], w[2]));
                axioms.push(Axiom::subsumption(w[0], w[1]));
            }
        }

        let single = run(&axioms, &mut vocab.clone(), 1);
        let many = run(&axioms, &mut vocab, 6);
        for (a, b) in single.iter().zip(&many) {
            assert_eq!(a.state().supers, b.state().supers);
        }
    }
}
