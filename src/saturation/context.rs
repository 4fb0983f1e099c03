//! Per-concept reasoning state.
//!
//! A [`Context`] owns everything derived about one concept: its
//! superconcepts and its role links to other contexts. Other workers never
//! touch that state directly; they append [`Entry`] values to the todo queue
//! and the single owner folds them in.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use serde::{Deserialize, Serialize};

use crate::axiom::{Concept, Role};
use crate::error::{ReasonResult, ReasonerError};

use super::concept_set::ConceptSet;

/// A pending consequence for the owning context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// The owner is subsumed by the concept.
    Subsumer(Concept),
    /// Re-run every rule triggered by an already derived concept.
    Refire(Concept),
    /// `owner ⊑ ∃role.filler`.
    Successor { role: Role, filler: Concept },
    /// `source ⊑ ∃role.owner`.
    Predecessor { role: Role, source: Concept },
}

/// Derived facts about one concept. Only the owning worker mutates this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextState {
    /// S(A): every derived superconcept, including A and ⊤.
    pub supers: ConceptSet,
    /// Role → fillers F with `A ⊑ ∃role.F`, closed under role inclusion.
    pub successors: BTreeMap<Role, ConceptSet>,
    /// Role → sources P with `P ⊑ ∃role.A`, closed under role inclusion.
    pub predecessors: BTreeMap<Role, ConceptSet>,
    /// Set when `supers` grew since the last taxonomy build.
    #[serde(skip)]
    pub changed: bool,
}

impl ContextState {
    /// Fresh state for a context about to be re-seeded.
    fn cleared(&mut self) {
        self.supers.clear();
        self.successors.clear();
        self.predecessors.clear();
        self.changed = true;
    }

    /// Every predecessor regardless of role.
    pub fn all_predecessors(&self) -> ConceptSet {
        let mut all = ConceptSet::new();
        for sources in self.predecessors.values() {
            all.union_with(sources);
        }
        all
    }

    /// Every successor filler regardless of role.
    pub fn all_successors(&self) -> ConceptSet {
        let mut all = ConceptSet::new();
        for fillers in self.successors.values() {
            all.union_with(fillers);
        }
        all
    }

    /// Drop every predecessor link from `source`.
    pub fn forget_predecessor(&mut self, source: Concept) {
        for sources in self.predecessors.values_mut() {
            sources.remove(source);
        }
    }
}

/// Reasoning state for a single concept.
#[derive(Debug)]
pub struct Context {
    concept: Concept,
    /// Set while the context is queued or being processed.
    active: AtomicBool,
    todo: Mutex<VecDeque<Entry>>,
    state: Mutex<ContextState>,
}

impl Context {
    /// A context seeded with `A ⊑ A` and `A ⊑ ⊤`.
    pub fn new(concept: Concept) -> Self {
        Self {
            concept,
            active: AtomicBool::new(false),
            todo: Mutex::new(seed_entries(concept)),
            state: Mutex::new(ContextState::default()),
        }
    }

    /// A context restored from saved state with nothing pending.
    pub fn restored(concept: Concept, state: ContextState) -> Self {
        Self {
            concept,
            active: AtomicBool::new(false),
            todo: Mutex::new(VecDeque::new()),
            state: Mutex::new(state),
        }
    }

    pub fn concept(&self) -> Concept {
        self.concept
    }

    /// Append an entry. Returns true if the caller must schedule this context.
    pub fn push(&self, entry: Entry) -> bool {
        self.todo
            .lock()
            .expect("context todo lock poisoned")
            .push_back(entry);
        self.try_activate()
    }

    /// Append an entry without touching the activation flag.
    ///
    /// Only valid while no saturation is running; the next run picks the
    /// context up because it has pending work.
    pub fn seed(&self, entry: Entry) {
        self.todo
            .lock()
            .expect("context todo lock poisoned")
            .push_back(entry);
    }

    /// Take the next pending entry.
    pub fn pop(&self) -> Option<Entry> {
        self.todo
            .lock()
            .expect("context todo lock poisoned")
            .pop_front()
    }

    pub fn has_pending(&self) -> bool {
        !self
            .todo
            .lock()
            .expect("context todo lock poisoned")
            .is_empty()
    }

    /// Claim the activation flag. True if this call flipped it.
    pub fn try_activate(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the activation flag.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Open the derived state for the owning worker.
    ///
    /// Fails with [`ReasonerError::ContextContention`] if another worker
    /// already holds it, which means the activation protocol was broken.
    pub fn open(&self) -> ReasonResult<MutexGuard<'_, ContextState>> {
        match self.state.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(ReasonerError::ContextContention {
                concept: self.concept.get(),
            }),
            Err(TryLockError::Poisoned(_)) => panic!("context state lock poisoned"),
        }
    }

    /// Read the derived state outside of saturation.
    pub fn state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().expect("context state lock poisoned")
    }

    /// Discard everything derived and re-seed the context.
    pub fn reset(&self) {
        self.state().cleared();
        *self.todo.lock().expect("context todo lock poisoned") = seed_entries(self.concept);
        self.deactivate();
    }

    /// Discard pending entries and release the flag, keeping derived state.
    pub fn abandon(&self) {
        self.todo
            .lock()
            .expect("context todo lock poisoned")
            .clear();
        self.deactivate();
    }
}

fn seed_entries(concept: Concept) -> VecDeque<Entry> {
    VecDeque::from([Entry::Subsumer(concept), Entry::Subsumer(Concept::TOP)])
}
