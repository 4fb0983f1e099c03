// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # subsume
//!
//! A concurrent EL++ subsumption classifier. Normalized concept inclusions
//! go in; a taxonomy of equivalence classes linked by direct subsumption
//! comes out, and can be kept current as axioms are added or retracted.
//!
//! ## Architecture
//!
//! - **Axiom model** (`axiom`): interned ids, the eight normal forms, feature restrictions
//! - **Saturation** (`saturation`): per-concept contexts driven to fixpoint by a worker pool
//! - **Taxonomy** (`taxonomy`): parallel reduction to direct subsumption, concurrent node linking
//! - **Reasoner** (`reasoner`): load → classify → query → prune lifecycle, incremental edits
//! - **Snapshots** (`snapshot`): binary save/load of a classified reasoner
//!
//! ## Library usage
//!
//! ```no_run
//! use subsume::axiom::Axiom;
//! use subsume::progress::ProgressHandle;
//! use subsume::reasoner::{Reasoner, ReasonerConfig};
//!
//! let mut reasoner = Reasoner::new(ReasonerConfig::default()).unwrap();
//! let vocab = reasoner.vocabulary_mut();
//! let dog = vocab.concept("Dog");
//! let mammal = vocab.concept("Mammal");
//! let animal = vocab.concept("Animal");
//!
//! let progress = ProgressHandle::none();
//! reasoner
//!     .load_axioms(
//!         &[Axiom::subsumption(dog, mammal), Axiom::subsumption(mammal, animal)],
//!         &progress,
//!     )
//!     .unwrap();
//! let taxonomy = reasoner
//!     .classify(&progress)
//!     .unwrap()
//!     .get_classified_ontology(&progress)
//!     .unwrap();
//! assert_eq!(taxonomy.parents(dog), vec![mammal]);
//! assert!(taxonomy.is_descendant(dog, animal));
//! ```

pub mod axiom;
pub mod error;
pub mod progress;
pub mod reasoner;
pub mod saturation;
pub mod snapshot;
pub mod taxonomy;

pub use axiom::{Axiom, Concept, Role, Vocabulary};
pub use error::{ReasonResult, ReasonerError};
pub use reasoner::{Reasoner, ReasonerConfig, ReasonerState};
pub use taxonomy::Taxonomy;
