//! Completion rules.
//!
//! [`RuleEngine::process`] drains one context's todo queue. Each entry is
//! matched exhaustively against the entry kinds and folded into the owner's
//! state; consequences for other contexts are appended to their queues and
//! reported to the scheduler when that wakes them up.
//!
//! | entry | rules |
//! |---|---|
//! | `Subsumer(B)` new | NF6/NF7 `B ⊑ C`, NF1 `B ⊓ B' ⊑ C`, NF2 `B ⊑ ∃r.F`, NF3 towards predecessors, ⊥ towards predecessors, NF8 restriction entailment |
//! | `Successor(r, F)` | role closure, predecessor link in F, chains with the owner in the middle |
//! | `Predecessor(r, P)` | NF3 back to P, ⊥ back to P, chains with the owner in the middle |

use std::collections::VecDeque;

use crate::axiom::{Concept, Role};
use crate::error::ReasonResult;

use super::context::{Context, ContextState, Entry};
use super::index::AxiomIndex;

/// Applies completion rules against a shared index and context table.
pub struct RuleEngine<'a> {
    index: &'a AxiomIndex,
    contexts: &'a [Context],
}

/// Routes consequences: to the owner's local queue or to another context.
struct Outbox<'s> {
    owner: Concept,
    local: VecDeque<Entry>,
    contexts: &'s [Context],
    schedule: &'s mut dyn FnMut(Concept),
}

impl Outbox<'_> {
    fn local(&mut self, entry: Entry) {
        self.local.push_back(entry);
    }

    fn send(&mut self, target: Concept, entry: Entry) {
        if target == self.owner {
            self.local.push_back(entry);
        } else if self.contexts[target.index()].push(entry) {
            (self.schedule)(target);
        }
    }
}

impl<'a> RuleEngine<'a> {
    pub fn new(index: &'a AxiomIndex, contexts: &'a [Context]) -> Self {
        Self { index, contexts }
    }

    /// Process `ctx` until its queue is empty. Returns the number of entries applied.
    ///
    /// The caller must hold the context's activation flag. `schedule` receives
    /// every other context whose flag this call flipped.
    pub fn process(
        &self,
        ctx: &Context,
        schedule: &mut dyn FnMut(Concept),
    ) -> ReasonResult<usize> {
        let mut state = ctx.open()?;
        let mut out = Outbox {
            owner: ctx.concept(),
            local: VecDeque::new(),
            contexts: self.contexts,
            schedule,
        };

        let mut applied = 0;
        loop {
            let entry = match out.local.pop_front() {
                Some(entry) => entry,
                None => match ctx.pop() {
                    Some(entry) => entry,
                    None => break,
                },
            };
            applied += 1;
            self.apply(entry, &mut state, &mut out)?;
        }
        Ok(applied)
    }

    fn apply(&self, entry: Entry, state: &mut ContextState, out: &mut Outbox<'_>) -> ReasonResult<()> {
        match entry {
            Entry::Subsumer(concept) => {
                if state.supers.insert(concept) {
                    state.changed = true;
                    self.fire(concept, state, out)?;
                }
            }
            Entry::Refire(concept) => {
                if state.supers.contains(concept) {
                    self.fire(concept, state, out)?;
                }
            }
            Entry::Successor { role, filler } => self.add_successor(role, filler, state, out),
            Entry::Predecessor { role, source } => self.add_predecessor(role, source, state, out),
        }
        Ok(())
    }

    /// Every rule triggered by the owner holding `concept`.
    fn fire(&self, concept: Concept, state: &ContextState, out: &mut Outbox<'_>) -> ReasonResult<()> {
        for &sup in self.index.subsumptions(concept) {
            out.local(Entry::Subsumer(sup));
        }

        for &(other, sup) in self.index.conjunctions(concept) {
            if state.supers.contains(other) {
                out.local(Entry::Subsumer(sup));
            }
        }

        for &(role, filler) in self.index.existentials(concept) {
            out.local(Entry::Successor { role, filler });
        }

        for &(role, sup) in self.index.existential_subs(concept) {
            if let Some(sources) = state.predecessors.get(&role) {
                for source in sources.iter() {
                    out.send(source, Entry::Subsumer(sup));
                }
            }
        }

        if concept == Concept::BOTTOM {
            for source in state.all_predecessors().iter() {
                out.send(source, Entry::Subsumer(Concept::BOTTOM));
            }
        }

        for sup in self.index.datatype_consequences(concept)? {
            out.local(Entry::Subsumer(sup));
        }
        Ok(())
    }

    fn add_successor(&self, role: Role, filler: Concept, state: &mut ContextState, out: &mut Outbox<'_>) {
        let roles = self.index.roles();
        let owner = out.owner;
        for &sup_role in roles.supers_of(role) {
            if !state.successors.entry(sup_role).or_default().insert(filler) {
                continue;
            }
            out.send(
                filler,
                Entry::Predecessor {
                    role: sup_role,
                    source: owner,
                },
            );
            // P -first-> owner -sup_role-> filler
            for &(first, chained) in roles.chains_with_second(sup_role) {
                if let Some(sources) = state.predecessors.get(&first) {
                    for source in sources.iter() {
                        out.send(
                            source,
                            Entry::Successor {
                                role: chained,
                                filler,
                            },
                        );
                    }
                }
            }
        }
    }

    fn add_predecessor(&self, role: Role, source: Concept, state: &mut ContextState, out: &mut Outbox<'_>) {
        if !state.predecessors.entry(role).or_default().insert(source) {
            return;
        }

        for held in state.supers.iter() {
            for &(nf3_role, sup) in self.index.existential_subs(held) {
                if nf3_role == role {
                    out.send(source, Entry::Subsumer(sup));
                }
            }
        }

        if state.supers.contains(Concept::BOTTOM) {
            out.send(source, Entry::Subsumer(Concept::BOTTOM));
        }

        // source -role-> owner -second-> filler
        for &(second, chained) in self.index.roles().chains_with_first(role) {
            if let Some(fillers) = state.successors.get(&second) {
                for filler in fillers.iter() {
                    out.send(
                        source,
                        Entry::Successor {
                            role: chained,
                            filler,
                        },
                    );
                }
            }
        }
    }
}
