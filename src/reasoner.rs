//! Reasoner facade: the load → classify → query → prune lifecycle.
//!
//! The `Reasoner` owns the vocabulary, the told axioms, one context per
//! concept and the worker pool. Every operation checks the lifecycle state
//! first and fails with a usage error rather than doing partial work.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use crate::axiom::{Axiom, Concept, Vocabulary};
use crate::error::{ReasonResult, ReasonerError};
use crate::progress::{Phase, ProgressHandle};
use crate::saturation::context::{Context, Entry};
use crate::saturation::index::AxiomIndex;
use crate::saturation::saturate;
use crate::saturation::scheduler::build_pool;
use crate::taxonomy::{DirectSubsumption, Taxonomy, TaxonomyBuilder};

/// Upper bound on `num_threads`.
const MAX_THREADS: usize = 1024;

/// Configuration for a [`Reasoner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReasonerConfig {
    /// Worker threads for saturation and linking. `0` uses available parallelism.
    pub num_threads: usize,
    /// Report progress every this many units of work. `0` disables periodic reports.
    pub report_every: usize,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            report_every: 1024,
        }
    }
}

impl ReasonerConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ReasonResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ReasonerError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ReasonResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ReasonerError::ConfigRead {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> ReasonResult<String> {
        toml::to_string_pretty(self).map_err(|e| ReasonerError::InvalidConfig {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> ReasonResult<()> {
        if self.num_threads > MAX_THREADS {
            return Err(ReasonerError::InvalidConfig {
                message: format!(
                    "num_threads must be at most {MAX_THREADS}, got {}",
                    self.num_threads
                ),
            });
        }
        Ok(())
    }
}

/// Lifecycle state of a [`Reasoner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonerState {
    /// No axioms loaded yet.
    Unloaded,
    /// Axioms loaded, or edited since the last classification.
    Loaded,
    /// Taxonomy current with the told axioms.
    Classified,
    /// Saturation state discarded; only the taxonomy remains.
    Pruned,
    /// The last classification was cancelled or failed.
    Invalidated,
}

impl std::fmt::Display for ReasonerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReasonerState::Unloaded => write!(f, "Unloaded"),
            ReasonerState::Loaded => write!(f, "Loaded"),
            ReasonerState::Classified => write!(f, "Classified"),
            ReasonerState::Pruned => write!(f, "Pruned"),
            ReasonerState::Invalidated => write!(f, "Invalidated"),
        }
    }
}

/// Edits since the last successful classification.
#[derive(Debug, Default)]
struct PendingEdits {
    added: Vec<Axiom>,
    removed: Vec<Axiom>,
    /// A role axiom changed; incremental reuse is impossible.
    reset_all: bool,
}

impl PendingEdits {
    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && !self.reset_all
    }
}

/// Counters from one `classify()` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyStats {
    /// Whether saturation started from existing state.
    pub incremental: bool,
    /// Contexts reset before saturating.
    pub reset: usize,
    /// Context activations during saturation.
    pub activations: usize,
    /// Todo entries applied.
    pub entries: usize,
    /// Direct-subsumption entries recomputed.
    pub reduced: usize,
    /// Direct-subsumption entries reused from the previous run.
    pub reused: usize,
}

/// A concurrent EL++ subsumption classifier.
pub struct Reasoner {
    pub(crate) config: ReasonerConfig,
    pool: ThreadPool,
    pub(crate) vocab: Vocabulary,
    /// Told axioms in load order.
    pub(crate) axioms: Vec<Axiom>,
    told: HashSet<Axiom>,
    pub(crate) contexts: Vec<Context>,
    direct: DirectSubsumption,
    pub(crate) taxonomy: Option<Arc<Taxonomy>>,
    pending: PendingEdits,
    pub(crate) state: ReasonerState,
    last_stats: ClassifyStats,
}

impl std::fmt::Debug for Reasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reasoner")
            .field("state", &self.state)
            .field("threads", &self.pool.current_num_threads())
            .field("concepts", &self.vocab.concept_count())
            .field("axioms", &self.axioms.len())
            .finish()
    }
}

impl Reasoner {
    /// Create an empty reasoner with a fresh vocabulary.
    pub fn new(config: ReasonerConfig) -> ReasonResult<Self> {
        Self::with_vocabulary(Vocabulary::new(), config)
    }

    /// Create an empty reasoner over an existing vocabulary.
    pub fn with_vocabulary(vocab: Vocabulary, config: ReasonerConfig) -> ReasonResult<Self> {
        config.validate()?;
        let pool = build_pool(config.num_threads)?;
        tracing::info!(
            threads = pool.current_num_threads(),
            concepts = vocab.concept_count(),
            "initializing reasoner"
        );
        Ok(Self {
            config,
            pool,
            vocab,
            axioms: Vec::new(),
            told: HashSet::new(),
            contexts: Vec::new(),
            direct: DirectSubsumption::new(),
            taxonomy: None,
            pending: PendingEdits::default(),
            state: ReasonerState::Unloaded,
            last_stats: ClassifyStats::default(),
        })
    }

    /// Reassemble a reasoner from saved parts. Contexts must be at fixpoint.
    pub(crate) fn restore(
        config: ReasonerConfig,
        vocab: Vocabulary,
        axioms: Vec<Axiom>,
        contexts: Vec<Context>,
        taxonomy: Taxonomy,
        state: ReasonerState,
    ) -> ReasonResult<Self> {
        let mut reasoner = Self::with_vocabulary(vocab, config)?;
        reasoner.told = axioms.iter().cloned().collect();
        reasoner.axioms = axioms;
        reasoner.contexts = contexts;
        reasoner.taxonomy = Some(Arc::new(taxonomy));
        reasoner.state = state;
        Ok(reasoner)
    }

    pub fn state(&self) -> ReasonerState {
        self.state
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Mutable access for interning new names between loads.
    pub fn vocabulary_mut(&mut self) -> &mut Vocabulary {
        &mut self.vocab
    }

    /// Told axioms in load order.
    pub fn axioms(&self) -> &[Axiom] {
        &self.axioms
    }

    /// Counters from the last successful `classify()`.
    pub fn last_stats(&self) -> ClassifyStats {
        self.last_stats
    }

    /// Worker threads in the pool.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn reject_pruned(&self, operation: &'static str) -> ReasonResult<()> {
        if self.state == ReasonerState::Pruned {
            return Err(ReasonerError::Pruned { operation });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Add told axioms. Does not saturate.
    ///
    /// Every axiom is validated against the vocabulary first; one unknown id
    /// rejects the whole batch and nothing is applied. Axioms already told
    /// are ignored.
    pub fn load_axioms(&mut self, axioms: &[Axiom], progress: &ProgressHandle) -> ReasonResult<()> {
        self.reject_pruned("load_axioms")?;
        for axiom in axioms {
            self.vocab.validate(axiom)?;
        }

        let mut added = 0;
        for (i, axiom) in axioms.iter().enumerate() {
            if self.told.insert(axiom.clone()) {
                self.axioms.push(axiom.clone());
                self.pending.reset_all |= axiom.is_role_axiom();
                self.pending.added.push(axiom.clone());
                added += 1;
            }
            if self.config.report_every > 0 && (i + 1) % self.config.report_every == 0 {
                progress.report(Phase::Loading, i + 1, axioms.len());
            }
        }
        progress.report(Phase::Loading, axioms.len(), axioms.len());

        self.ensure_contexts();
        if added > 0 || self.state == ReasonerState::Unloaded {
            self.mark_dirty();
        }
        tracing::info!(added, told = self.axioms.len(), "axioms loaded");
        Ok(())
    }

    /// Add told axioms from an iterator.
    pub fn load_axiom_iter<I>(&mut self, axioms: I, progress: &ProgressHandle) -> ReasonResult<()>
    where
        I: IntoIterator<Item = Axiom>,
    {
        let batch: Vec<Axiom> = axioms.into_iter().collect();
        self.load_axioms(&batch, progress)
    }

    /// Remove told axioms. Returns how many were actually told.
    ///
    /// Derived facts are invalidated conservatively at the next `classify()`:
    /// every context that could have used a removed axiom is re-derived.
    pub fn retract_axioms(&mut self, axioms: &[Axiom]) -> ReasonResult<usize> {
        self.reject_pruned("retract_axioms")?;
        let mut removed = 0;
        for axiom in axioms {
            if !self.told.remove(axiom) {
                continue;
            }
            removed += 1;
            self.pending.reset_all |= axiom.is_role_axiom();
            // Never saturated: forgetting the addition is enough.
            if let Some(pos) = self.pending.added.iter().position(|a| a == axiom) {
                self.pending.added.swap_remove(pos);
            } else {
                self.pending.removed.push(axiom.clone());
            }
        }
        if removed > 0 {
            self.axioms.retain(|axiom| self.told.contains(axiom));
            self.mark_dirty();
        }
        tracing::info!(removed, told = self.axioms.len(), "axioms retracted");
        Ok(removed)
    }

    fn mark_dirty(&mut self) {
        if matches!(
            self.state,
            ReasonerState::Unloaded | ReasonerState::Classified
        ) {
            self.state = ReasonerState::Loaded;
        }
    }

    /// One context per interned concept.
    fn ensure_contexts(&mut self) {
        let known = self.contexts.len() as u32;
        let wanted = self.vocab.concept_count() as u32;
        self.contexts
            .extend((known..wanted).map(|raw| Context::new(Concept::new(raw))));
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    /// Saturate and build the taxonomy.
    ///
    /// The first call saturates everything; later calls start from the
    /// previous fixpoint and only re-process what the edits touched. On
    /// cancellation or failure the reasoner becomes `Invalidated` and the
    /// next call starts over.
    pub fn classify(&mut self, progress: &ProgressHandle) -> ReasonResult<&mut Self> {
        let state = self.state;
        match state {
            ReasonerState::Unloaded => {
                return Err(ReasonerError::InvalidState {
                    operation: "classify",
                    state: state.to_string(),
                });
            }
            ReasonerState::Pruned => return Err(ReasonerError::Pruned { operation: "classify" }),
            ReasonerState::Classified if self.pending.is_empty() => return Ok(self),
            _ => {}
        }

        let started = Instant::now();
        match self.run_classification(progress) {
            Ok(stats) => {
                self.last_stats = stats;
                self.state = ReasonerState::Classified;
                let nodes = self.taxonomy.as_ref().map_or(0, |t| t.len());
                tracing::info!(
                    concepts = self.vocab.concept_count(),
                    nodes,
                    incremental = stats.incremental,
                    reset = stats.reset,
                    activations = stats.activations,
                    reduced = stats.reduced,
                    reused = stats.reused,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "classification finished"
                );
                Ok(self)
            }
            Err(err) => {
                for ctx in &self.contexts {
                    ctx.abandon();
                }
                self.state = ReasonerState::Invalidated;
                if err.is_cancellation() {
                    tracing::info!("classification cancelled");
                } else {
                    tracing::warn!(error = %err, "classification failed");
                }
                Err(err)
            }
        }
    }

    fn run_classification(&mut self, progress: &ProgressHandle) -> ReasonResult<ClassifyStats> {
        let index = AxiomIndex::build(&self.axioms, &mut self.vocab);
        self.ensure_contexts();

        let incremental = self.taxonomy.is_some()
            && self.state != ReasonerState::Invalidated
            && !self.pending.reset_all;
        let edits = std::mem::take(&mut self.pending);

        let reset = if incremental {
            let reset = self.invalidate(&edits.removed);
            self.refire(&edits.added);
            reset
        } else {
            for ctx in &self.contexts {
                ctx.reset();
            }
            self.direct.clear();
            self.contexts.len()
        };
        tracing::debug!(
            incremental,
            reset,
            added = edits.added.len(),
            removed = edits.removed.len(),
            "saturation seeded"
        );

        let saturation = saturate(
            &self.pool,
            &self.contexts,
            &index,
            progress,
            self.config.report_every,
        )?;

        let builder = TaxonomyBuilder::new(
            &self.pool,
            &self.contexts,
            &self.vocab,
            progress,
            self.config.report_every,
        );
        let (taxonomy, reduction) = builder.build(&self.direct)?;
        for ctx in &self.contexts {
            ctx.state().changed = false;
        }
        self.taxonomy = Some(Arc::new(taxonomy));

        Ok(ClassifyStats {
            incremental,
            reset,
            activations: saturation.activations,
            entries: saturation.entries,
            reduced: reduction.reduced,
            reused: reduction.reused,
        })
    }

    /// Concepts whose presence in a superconcept set lets `axiom` fire.
    fn triggers_of(&self, axiom: &Axiom) -> Vec<Concept> {
        match axiom {
            Axiom::DatatypeSub { restriction, .. } => self.vocab.restrictions_on(restriction.feature),
            _ => axiom.trigger_concepts(),
        }
    }

    /// Reset every context that may have used one of `removed`.
    ///
    /// Affected: contexts holding a trigger of a removed axiom, closed under
    /// "is a predecessor of an affected context". Their predecessor links in
    /// surviving successors are dropped so the links are rebuilt on
    /// re-derivation. Returns the number of contexts reset.
    fn invalidate(&self, removed: &[Axiom]) -> usize {
        if removed.is_empty() {
            return 0;
        }
        let triggers: BTreeSet<Concept> = removed.iter().flat_map(|a| self.triggers_of(a)).collect();

        let mut affected: BTreeSet<Concept> = BTreeSet::new();
        let mut frontier: Vec<Concept> = self
            .contexts
            .iter()
            .filter(|ctx| {
                let state = ctx.state();
                triggers.iter().any(|&t| state.supers.contains(t))
            })
            .map(|ctx| ctx.concept())
            .collect();
        while let Some(concept) = frontier.pop() {
            if !affected.insert(concept) {
                continue;
            }
            let predecessors = self.contexts[concept.index()].state().all_predecessors();
            frontier.extend(predecessors.iter().filter(|p| !affected.contains(p)));
        }

        for &concept in &affected {
            let ctx = &self.contexts[concept.index()];
            let successors = ctx.state().all_successors();
            for successor in successors.iter() {
                if !affected.contains(&successor) {
                    self.contexts[successor.index()]
                        .state()
                        .forget_predecessor(concept);
                }
            }
            ctx.reset();
        }
        for &concept in &affected {
            self.direct.remove(&concept);
        }
        affected.len()
    }

    /// Queue a re-fire of every trigger of `added` in contexts already holding it.
    fn refire(&self, added: &[Axiom]) {
        let triggers: BTreeSet<Concept> = added.iter().flat_map(|a| self.triggers_of(a)).collect();
        if triggers.is_empty() {
            return;
        }
        for ctx in &self.contexts {
            let held: Vec<Concept> = {
                let state = ctx.state();
                triggers
                    .iter()
                    .copied()
                    .filter(|&t| state.supers.contains(t))
                    .collect()
            };
            for trigger in held {
                ctx.seed(Entry::Refire(trigger));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether a taxonomy matching the told axioms is available.
    pub fn is_classified(&self) -> bool {
        matches!(
            self.state,
            ReasonerState::Classified | ReasonerState::Pruned
        )
    }

    /// The classified taxonomy. Valid in `Classified` and `Pruned`.
    pub fn get_classified_ontology(&self, progress: &ProgressHandle) -> ReasonResult<Arc<Taxonomy>> {
        if progress.is_cancelled() {
            return Err(ReasonerError::Cancelled);
        }
        match (&self.taxonomy, self.is_classified()) {
            (Some(taxonomy), true) => Ok(Arc::clone(taxonomy)),
            _ => Err(ReasonerError::NotClassified),
        }
    }

    /// Discard saturation state, keeping only the taxonomy.
    ///
    /// Irreversible: afterwards loading, retracting and classifying fail.
    /// Pruning twice is a no-op.
    pub fn prune(&mut self) -> ReasonResult<()> {
        match self.state {
            ReasonerState::Classified => {}
            ReasonerState::Pruned => return Ok(()),
            state => {
                return Err(ReasonerError::InvalidState {
                    operation: "prune",
                    state: state.to_string(),
                });
            }
        }
        let contexts = self.contexts.len();
        self.contexts = Vec::new();
        self.direct = DirectSubsumption::new();
        self.axioms = Vec::new();
        self.told = HashSet::new();
        self.pending = PendingEdits::default();
        self.state = ReasonerState::Pruned;
        tracing::info!(contexts, "reasoner pruned");
        Ok(())
    }
}
