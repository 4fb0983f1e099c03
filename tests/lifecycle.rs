//! Reasoner lifecycle tests: incremental edits, pruning, snapshots,
//! cancellation and configuration.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use subsume::axiom::{Axiom, Concept, Datatype, Literal, Operator, Role, Vocabulary};
use subsume::error::{ReasonerError, SnapshotError};
use subsume::progress::{CancelToken, Phase, ProgressHandle, ProgressSink};
use subsume::reasoner::{Reasoner, ReasonerConfig, ReasonerState};
use subsume::taxonomy::Taxonomy;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(threads: usize) -> ReasonerConfig {
    ReasonerConfig {
        num_threads: threads,
        ..Default::default()
    }
}

fn reasoner_over(vocab: &Vocabulary, threads: usize) -> Reasoner {
    init_tracing();
    Reasoner::with_vocabulary(vocab.clone(), config(threads)).unwrap()
}

fn taxonomy(r: &mut Reasoner) -> Arc<Taxonomy> {
    let progress = ProgressHandle::none();
    r.classify(&progress)
        .unwrap()
        .get_classified_ontology(&progress)
        .unwrap()
}

fn from_scratch(vocab: &Vocabulary, axioms: &[Axiom]) -> Arc<Taxonomy> {
    let mut r = reasoner_over(vocab, 2);
    r.load_axioms(axioms, &ProgressHandle::none()).unwrap();
    taxonomy(&mut r)
}

/// Concept-level axioms only, so edits go through the incremental path.
fn random_ontology(seed: u64, size: usize) -> (Vocabulary, Vec<Axiom>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut vocab = Vocabulary::new();
    let cs: Vec<Concept> = (0..size).map(|i| vocab.concept(&format!("C{i}"))).collect();
    let rs: Vec<Role> = (0..3).map(|i| vocab.role(&format!("r{i}"))).collect();
    let pick = |rng: &mut StdRng| cs[rng.gen_range(0..cs.len())];

    let mut axioms = vec![Axiom::role_inclusion(rs[0], rs[1])];
    for _ in 0..size * 2 {
        let axiom = match rng.gen_range(0..10) {
            0..=4 => Axiom::subsumption(pick(&mut rng), pick(&mut rng)),
            5 => Axiom::conjunction(pick(&mut rng), pick(&mut rng), pick(&mut rng)),
            6 | 7 => Axiom::existential(pick(&mut rng), rs[rng.gen_range(0..3)], pick(&mut rng)),
            _ => Axiom::existential_sub(rs[rng.gen_range(0..3)], pick(&mut rng), pick(&mut rng)),
        };
        axioms.push(axiom);
    }
    (vocab, axioms)
}

// ---------------------------------------------------------------------------
// Incremental classification
// ---------------------------------------------------------------------------

#[test]
fn single_addition_matches_scratch() {
    let mut vocab = Vocabulary::new();
    let [a, b, c, d] = ["A", "B", "C", "D"].map(|n| vocab.concept(n));
    let r_role = vocab.role("r");
    let base = [
        Axiom::subsumption(a, b),
        Axiom::existential(c, r_role, a),
    ];
    let extra = Axiom::existential_sub(r_role, b, d);

    let mut r = reasoner_over(&vocab, 3);
    r.load_axioms(&base, &ProgressHandle::none()).unwrap();
    let before = taxonomy(&mut r);
    assert!(!before.is_descendant(c, d));

    r.load_axioms(&[extra.clone()], &ProgressHandle::none()).unwrap();
    assert_eq!(r.state(), ReasonerState::Loaded);
    let after = taxonomy(&mut r);
    assert!(r.last_stats().incremental);
    assert!(after.is_descendant(c, d));

    let mut all = base.to_vec();
    all.push(extra);
    assert_eq!(*after, *from_scratch(&vocab, &all));
    // The earlier handle is a separate snapshot and was not mutated.
    assert!(!before.is_descendant(c, d));
}

#[test]
fn batched_additions_match_scratch() {
    for seed in [5, 17, 23] {
        let (vocab, axioms) = random_ontology(seed, 100);
        let (first, rest) = axioms.split_at(axioms.len() / 2);

        let mut r = reasoner_over(&vocab, 4);
        r.load_axioms(first, &ProgressHandle::none()).unwrap();
        taxonomy(&mut r);
        for chunk in rest.chunks(25) {
            r.load_axioms(chunk, &ProgressHandle::none()).unwrap();
            taxonomy(&mut r);
        }
        let incremental = taxonomy(&mut r);
        assert_eq!(*incremental, *from_scratch(&vocab, &axioms), "seed {seed}");
    }
}

#[test]
fn retraction_matches_scratch() {
    for seed in [2, 9, 31] {
        let (vocab, axioms) = random_ontology(seed, 100);
        let mut rng = StdRng::seed_from_u64(seed + 1000);
        let mut removed: Vec<Axiom> = axioms
            .iter()
            .filter(|a| !a.is_role_axiom())
            .cloned()
            .collect();
        removed.shuffle(&mut rng);
        removed.truncate(20);

        let mut r = reasoner_over(&vocab, 4);
        r.load_axioms(&axioms, &ProgressHandle::none()).unwrap();
        taxonomy(&mut r);
        r.retract_axioms(&removed).unwrap();
        let incremental = taxonomy(&mut r);
        assert!(r.last_stats().incremental);

        let kept: Vec<Axiom> = axioms.iter().filter(|a| !removed.contains(a)).cloned().collect();
        assert_eq!(*incremental, *from_scratch(&vocab, &kept), "seed {seed}");
    }
}

#[test]
fn retracting_the_only_support_drops_the_subsumption() {
    let mut vocab = Vocabulary::new();
    let [a, b, c] = ["A", "B", "C"].map(|n| vocab.concept(n));
    let r_role = vocab.role("r");
    let support = Axiom::existential_sub(r_role, b, c);
    let axioms = [Axiom::existential(a, r_role, b), support.clone()];

    let mut r = reasoner_over(&vocab, 2);
    r.load_axioms(&axioms, &ProgressHandle::none()).unwrap();
    assert!(taxonomy(&mut r).is_descendant(a, c));

    assert_eq!(r.retract_axioms(&[support]).unwrap(), 1);
    let after = taxonomy(&mut r);
    assert!(!after.is_descendant(a, c));
    assert!(r.last_stats().reset >= 2);
}

#[test]
fn datatype_axioms_added_later_are_picked_up() {
    let mut vocab = Vocabulary::new();
    let [adult, voter] = ["Adult", "Voter"].map(|n| vocab.concept(n));
    let age = vocab.feature("age");
    let over_21 = Axiom::datatype_sup(adult, Datatype::new(age, Operator::Gt, Literal::Int(21)));
    let can_vote = Axiom::datatype_sub(Datatype::new(age, Operator::Ge, Literal::Int(18)), voter);

    let mut r = reasoner_over(&vocab, 2);
    r.load_axioms(&[over_21.clone()], &ProgressHandle::none()).unwrap();
    assert!(!taxonomy(&mut r).is_descendant(adult, voter));

    r.load_axioms(&[can_vote.clone()], &ProgressHandle::none()).unwrap();
    let after = taxonomy(&mut r);
    assert!(after.is_descendant(adult, voter));
    assert_eq!(*after, *from_scratch(&vocab, &[over_21, can_vote]));
}

#[test]
fn axioms_can_be_streamed() {
    let mut vocab = Vocabulary::new();
    let chain: Vec<Concept> = (0..50).map(|i| vocab.concept(&format!("L{i}"))).collect();
    let mut r = reasoner_over(&vocab, 2);
    r.load_axiom_iter(
        chain.windows(2).map(|w| Axiom::subsumption(w[0], w[1])),
        &ProgressHandle::none(),
    )
    .unwrap();
    let tax = taxonomy(&mut r);
    assert_eq!(tax.ancestors(chain[0]).len(), 50);
    assert_eq!(tax.parents(chain[10]), vec![chain[11]]);
}

// ---------------------------------------------------------------------------
// Prune
// ---------------------------------------------------------------------------

#[test]
fn prune_keeps_queries_and_blocks_edits() {
    let mut vocab = Vocabulary::new();
    let [a, b] = ["A", "B"].map(|n| vocab.concept(n));
    let mut r = reasoner_over(&vocab, 2);
    let progress = ProgressHandle::none();
    r.load_axioms(&[Axiom::subsumption(a, b)], &progress).unwrap();
    let before = taxonomy(&mut r);
    r.prune().unwrap();

    assert_eq!(r.state(), ReasonerState::Pruned);
    assert!(r.axioms().is_empty());
    let err = r.load_axioms(&[Axiom::subsumption(b, a)], &progress).unwrap_err();
    assert!(matches!(err, ReasonerError::Pruned { .. }));
    assert!(matches!(
        r.classify(&progress).unwrap_err(),
        ReasonerError::Pruned { .. }
    ));
    assert_eq!(*r.get_classified_ontology(&progress).unwrap(), *before);
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[test]
fn snapshot_file_round_trip_continues_incrementally() {
    let (mut vocab, axioms) = random_ontology(44, 60);
    let extra_concept = vocab.concept("Extra");
    let (base, tail) = axioms.split_at(axioms.len() - 10);

    let mut r = reasoner_over(&vocab, 2);
    r.load_axioms(base, &ProgressHandle::none()).unwrap();
    let saved_tax = taxonomy(&mut r);

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("reasoner.snap");
    r.save(std::fs::File::create(&path).unwrap()).unwrap();
    drop(r);

    let file = std::io::BufReader::new(std::fs::File::open(&path).unwrap());
    let mut restored = Reasoner::load(file, config(3)).unwrap();
    assert_eq!(restored.state(), ReasonerState::Classified);
    assert_eq!(restored.num_threads(), 3);
    assert_eq!(
        *restored.get_classified_ontology(&ProgressHandle::none()).unwrap(),
        *saved_tax
    );

    let mut more = tail.to_vec();
    more.push(Axiom::subsumption(extra_concept, Concept::TOP));
    restored.load_axioms(&more, &ProgressHandle::none()).unwrap();
    let continued = taxonomy(&mut restored);
    assert!(restored.last_stats().incremental);

    let mut all = axioms.clone();
    all.push(Axiom::subsumption(extra_concept, Concept::TOP));
    assert_eq!(*continued, *from_scratch(&vocab, &all));
}

#[test]
fn pruned_snapshot_keeps_only_the_taxonomy() {
    let mut vocab = Vocabulary::new();
    let [a, b] = ["A", "B"].map(|n| vocab.concept(n));
    let mut r = reasoner_over(&vocab, 1);
    r.load_axioms(&[Axiom::subsumption(a, b)], &ProgressHandle::none()).unwrap();
    taxonomy(&mut r);
    r.prune().unwrap();

    let mut bytes = Vec::new();
    r.save(&mut bytes).unwrap();
    let mut back = Reasoner::load(bytes.as_slice(), config(1)).unwrap();
    assert_eq!(back.state(), ReasonerState::Pruned);
    assert_eq!(
        back.get_classified_ontology(&ProgressHandle::none()).unwrap().parents(a),
        vec![b]
    );
    assert!(back.classify(&ProgressHandle::none()).is_err());
}

#[test]
fn loaded_reasoner_cannot_be_saved() {
    let vocab = Vocabulary::new();
    let mut r = reasoner_over(&vocab, 1);
    r.load_axioms(&[], &ProgressHandle::none()).unwrap();
    let err = r.save(Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        ReasonerError::Snapshot(SnapshotError::UnsavableState { .. })
    ));
}

// ---------------------------------------------------------------------------
// Cancellation and progress
// ---------------------------------------------------------------------------

/// Cancels its token on the first saturation report.
struct CancelOnSaturation(CancelToken);

impl ProgressSink for CancelOnSaturation {
    fn report(&self, phase: Phase, _done: usize, _total: usize) {
        if phase == Phase::Saturation {
            self.0.cancel();
        }
    }
}

#[derive(Default)]
struct PhaseLog(Mutex<Vec<Phase>>);

impl ProgressSink for PhaseLog {
    fn report(&self, phase: Phase, _done: usize, _total: usize) {
        self.0.lock().unwrap().push(phase);
    }
}

#[test]
fn cancellation_leaves_reasoner_unclassified() {
    let (vocab, axioms) = random_ontology(8, 200);
    init_tracing();
    let mut r = Reasoner::with_vocabulary(
        vocab.clone(),
        ReasonerConfig {
            num_threads: 1,
            report_every: 1,
        },
    )
    .unwrap();
    r.load_axioms(&axioms, &ProgressHandle::none()).unwrap();

    let token = CancelToken::new();
    let progress = ProgressHandle::none()
        .with_cancel(token.clone())
        .with_sink(Arc::new(CancelOnSaturation(token)));
    let err = r.classify(&progress).unwrap_err();
    assert!(err.is_cancellation());
    assert_eq!(r.state(), ReasonerState::Invalidated);
    assert!(!r.is_classified());
    assert!(matches!(
        r.get_classified_ontology(&ProgressHandle::none()),
        Err(ReasonerError::NotClassified)
    ));

    // A fresh run recovers fully.
    let recovered = taxonomy(&mut r);
    assert!(!r.last_stats().incremental);
    assert_eq!(*recovered, *from_scratch(&vocab, &axioms));
}

#[test]
fn progress_reaches_every_phase() {
    let (vocab, axioms) = random_ontology(12, 40);
    let log = Arc::new(PhaseLog::default());
    let progress = ProgressHandle::none().with_sink(log.clone());

    let mut r = reasoner_over(&vocab, 2);
    r.load_axioms(&axioms, &progress).unwrap();
    r.classify(&progress).unwrap();

    let seen = log.0.lock().unwrap();
    for phase in [Phase::Loading, Phase::Saturation, Phase::Reduction, Phase::Linking] {
        assert!(seen.contains(&phase), "no report for {phase}");
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn config_loads_from_toml_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("subsume.toml");
    std::fs::write(&path, "num_threads = 3\nreport_every = 10\n").unwrap();

    let config = ReasonerConfig::load(&path).unwrap();
    assert_eq!(config.report_every, 10);
    let r = Reasoner::new(config).unwrap();
    assert_eq!(r.num_threads(), 3);

    let missing = ReasonerConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, ReasonerError::ConfigRead { .. }));
}
