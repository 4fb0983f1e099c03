//! Rich diagnostic error types for the subsume classifier.
//!
//! Each area defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers can tell a
//! usage-order mistake from malformed input, a cooperative cancellation, or
//! a broken internal invariant.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the reasoner.
#[derive(Debug, Error, Diagnostic)]
pub enum ReasonerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Axiom(#[from] AxiomError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("operation `{operation}` is not valid in state {state}")]
    #[diagnostic(
        code(subsume::reasoner::invalid_state),
        help(
            "The reasoner lifecycle is Unloaded -> Loaded -> Classified -> Pruned. \
             Load axioms before classifying, and classify before querying."
        )
    )]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("the ontology has not been classified")]
    #[diagnostic(
        code(subsume::reasoner::not_classified),
        help("Call `classify()` and wait for it to return successfully before querying.")
    )]
    NotClassified,

    #[error("the reasoner has been pruned; `{operation}` is no longer available")]
    #[diagnostic(
        code(subsume::reasoner::pruned),
        help(
            "Pruning discards all saturation state and permanently disables \
             incremental reasoning. Build a fresh Reasoner to load more axioms."
        )
    )]
    Pruned { operation: &'static str },

    #[error("classification was cancelled")]
    #[diagnostic(
        code(subsume::reasoner::cancelled),
        help(
            "The cancellation token was triggered. The reasoner is left unclassified; \
             call `classify()` again to run a fresh classification."
        )
    )]
    Cancelled,

    #[error("context for concept {concept} is already owned by another worker")]
    #[diagnostic(
        code(subsume::reasoner::context_contention),
        help(
            "Two workers tried to process the same context at once. This is an \
             internal invariant violation; please file a bug report with the axioms \
             that triggered it."
        )
    )]
    ContextContention { concept: u32 },

    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(subsume::reasoner::invalid_config),
        help("Check the ReasonerConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("failed to read configuration file {path}")]
    #[diagnostic(
        code(subsume::reasoner::config_read),
        help("Check that the configuration file exists and is readable.")
    )]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start worker pool: {message}")]
    #[diagnostic(
        code(subsume::reasoner::thread_pool),
        help("The operating system refused to spawn worker threads. Lower `num_threads`.")
    )]
    ThreadPool { message: String },
}

impl ReasonerError {
    /// Whether this error is a cooperative cancellation rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ReasonerError::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Axiom errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AxiomError {
    #[error("unknown concept id {id} (vocabulary holds {known} concepts)")]
    #[diagnostic(
        code(subsume::axiom::unknown_concept),
        help(
            "Every concept id in an axiom must come from the reasoner's vocabulary. \
             Intern the name with `Vocabulary::concept()` first. The whole batch was rejected."
        )
    )]
    UnknownConcept { id: u32, known: usize },

    #[error("unknown role id {id} (vocabulary holds {known} roles)")]
    #[diagnostic(
        code(subsume::axiom::unknown_role),
        help("Intern the role name with `Vocabulary::role()` first. The whole batch was rejected.")
    )]
    UnknownRole { id: u32, known: usize },

    #[error("unknown feature id {id} (vocabulary holds {known} features)")]
    #[diagnostic(
        code(subsume::axiom::unknown_feature),
        help("Intern the feature name with `Vocabulary::feature()` first. The whole batch was rejected.")
    )]
    UnknownFeature { id: u32, known: usize },

    #[error("datatype comparison on feature {feature}: cannot compare {left} with {right}")]
    #[diagnostic(
        code(subsume::axiom::datatype_mismatch),
        help(
            "Restrictions on the same feature must use compatible literal kinds \
             (integers and floats mix, strings and booleans only with themselves), \
             and floats must not be NaN."
        )
    )]
    DatatypeMismatch {
        feature: u32,
        left: String,
        right: String,
    },
}

// ---------------------------------------------------------------------------
// Snapshot errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SnapshotError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(subsume::snapshot::io),
        help("Reading or writing the snapshot stream failed. Check the file path and permissions.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("not a reasoner snapshot (bad magic header)")]
    #[diagnostic(
        code(subsume::snapshot::bad_magic),
        help("The stream does not start with a subsume snapshot header. Was it written by `Reasoner::save`?")
    )]
    BadMagic,

    #[error("unsupported snapshot version {found} (expected {expected})")]
    #[diagnostic(
        code(subsume::snapshot::version),
        help("The snapshot was written by an incompatible release. Re-classify and save again.")
    )]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(subsume::snapshot::serde),
        help("The snapshot body could not be encoded or decoded. The stream may be truncated or corrupt.")
    )]
    Serialization { message: String },

    #[error("snapshot state {state} cannot be saved")]
    #[diagnostic(
        code(subsume::snapshot::state),
        help("Only Classified and Pruned reasoners can be saved. Call `classify()` first.")
    )]
    UnsavableState { state: String },

    #[error("inconsistent snapshot: {message}")]
    #[diagnostic(
        code(subsume::snapshot::inconsistent),
        help("The snapshot decoded but refers to ids it does not define. It was corrupted or not written by `Reasoner::save`.")
    )]
    Inconsistent { message: String },
}

/// Convenience alias for functions returning reasoner results.
pub type ReasonResult<T> = std::result::Result<T, ReasonerError>;
