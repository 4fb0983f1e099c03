//! Binary snapshots of a classified reasoner.
//!
//! Layout: an 8-byte magic, a little-endian `u32` format version, then a
//! `bincode` body. A `Classified` snapshot keeps the told axioms and every
//! context's derived state so incremental classification can continue after
//! loading; a `Pruned` snapshot keeps the taxonomy only.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::axiom::{Axiom, Concept, Vocabulary};
use crate::error::{ReasonResult, SnapshotError};
use crate::reasoner::{Reasoner, ReasonerConfig, ReasonerState};
use crate::saturation::context::{Context, ContextState};
use crate::taxonomy::Taxonomy;

const MAGIC: &[u8; 8] = b"SUBSUME\0";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    state: ReasonerState,
    vocab: Vocabulary,
    axioms: Vec<Axiom>,
    contexts: Vec<ContextState>,
    taxonomy: Taxonomy,
}

impl SnapshotBody {
    /// Every id the body mentions must be defined by the body itself.
    fn check(&self) -> Result<(), String> {
        self.vocab.check_tables()?;
        for axiom in &self.axioms {
            self.vocab
                .validate(axiom)
                .map_err(|e| format!("axiom {axiom}: {e}"))?;
        }

        let contexts = self.contexts.len();
        if contexts > self.vocab.concept_count() {
            return Err(format!(
                "{contexts} contexts for {} concepts",
                self.vocab.concept_count()
            ));
        }
        let roles = self.vocab.role_count();
        for (i, state) in self.contexts.iter().enumerate() {
            let links = state.successors.iter().chain(&state.predecessors);
            for set in std::iter::once(&state.supers).chain(links.clone().map(|(_, set)| set)) {
                if set.iter().count() != set.len() {
                    return Err(format!("context c:{i} has a corrupt concept set"));
                }
                if let Some(c) = set.iter().find(|c| c.index() >= contexts) {
                    return Err(format!("context c:{i} refers to {c} without a context"));
                }
            }
            if let Some((role, _)) = links.clone().find(|(role, _)| role.index() >= roles) {
                return Err(format!("context c:{i} uses unknown role {role}"));
            }
        }

        self.taxonomy.check_links(self.vocab.concept_count())
    }
}

impl Reasoner {
    /// Write a snapshot. Valid in `Classified` and `Pruned`.
    pub fn save<W: Write>(&self, mut writer: W) -> ReasonResult<()> {
        let taxonomy = match (&self.taxonomy, self.state) {
            (Some(taxonomy), ReasonerState::Classified | ReasonerState::Pruned) => taxonomy,
            _ => {
                return Err(SnapshotError::UnsavableState {
                    state: self.state.to_string(),
                }
                .into());
            }
        };

        let body = SnapshotBody {
            state: self.state,
            vocab: self.vocab.clone(),
            axioms: self.axioms.clone(),
            contexts: self.contexts.iter().map(|ctx| ctx.state().clone()).collect(),
            taxonomy: Taxonomy::clone(taxonomy),
        };

        writer
            .write_all(MAGIC)
            .and_then(|()| writer.write_all(&FORMAT_VERSION.to_le_bytes()))
            .map_err(|source| SnapshotError::Io { source })?;
        bincode::serialize_into(&mut writer, &body).map_err(|e| SnapshotError::Serialization {
            message: format!("failed to encode snapshot: {e}"),
        })?;
        writer
            .flush()
            .map_err(|source| SnapshotError::Io { source })?;

        tracing::info!(
            state = %self.state,
            contexts = body.contexts.len(),
            nodes = body.taxonomy.len(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Read a snapshot written by [`Reasoner::save`].
    pub fn load<R: Read>(mut reader: R, config: ReasonerConfig) -> ReasonResult<Self> {
        let mut magic = [0u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|source| SnapshotError::Io { source })?;
        if &magic != MAGIC {
            return Err(SnapshotError::BadMagic.into());
        }

        let mut version = [0u8; 4];
        reader
            .read_exact(&mut version)
            .map_err(|source| SnapshotError::Io { source })?;
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: version,
                expected: FORMAT_VERSION,
            }
            .into());
        }

        let body: SnapshotBody =
            bincode::deserialize_from(&mut reader).map_err(|e| SnapshotError::Serialization {
                message: format!("failed to decode snapshot: {e}"),
            })?;
        if !matches!(body.state, ReasonerState::Classified | ReasonerState::Pruned) {
            return Err(SnapshotError::UnsavableState {
                state: body.state.to_string(),
            }
            .into());
        }
        body.check()
            .map_err(|message| SnapshotError::Inconsistent { message })?;

        let contexts: Vec<Context> = body
            .contexts
            .into_iter()
            .enumerate()
            .map(|(i, state)| Context::restored(Concept::new(i as u32), state))
            .collect();
        tracing::info!(
            state = %body.state,
            contexts = contexts.len(),
            nodes = body.taxonomy.len(),
            "snapshot loaded"
        );
        Reasoner::restore(
            config,
            body.vocab,
            body.axioms,
            contexts,
            body.taxonomy,
            body.state,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReasonerError;
    use crate::progress::ProgressHandle;

    fn classified() -> Reasoner {
        let mut r = Reasoner::new(ReasonerConfig {
            num_threads: 2,
            ..Default::default()
        })
        .unwrap();
        let [a, b] = ["A", "B"].map(|n| r.vocabulary_mut().concept(n));
        r.load_axioms(&[Axiom::subsumption(a, b)], &ProgressHandle::none())
            .unwrap();
        r.classify(&ProgressHandle::none()).unwrap();
        r
    }

    #[test]
    fn round_trip_in_memory() {
        let r = classified();
        let mut bytes = Vec::new();
        r.save(&mut bytes).unwrap();
        assert_eq!(&bytes[..8], MAGIC);

        let back = Reasoner::load(bytes.as_slice(), ReasonerConfig::default()).unwrap();
        assert_eq!(back.state(), ReasonerState::Classified);
        assert_eq!(back.axioms(), r.axioms());
        let progress = ProgressHandle::none();
        assert_eq!(
            *back.get_classified_ontology(&progress).unwrap(),
            *r.get_classified_ontology(&progress).unwrap()
        );
    }

    #[test]
    fn unclassified_reasoner_cannot_be_saved() {
        let r = Reasoner::new(ReasonerConfig::default()).unwrap();
        let err = r.save(Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            ReasonerError::Snapshot(SnapshotError::UnsavableState { .. })
        ));
    }

    #[test]
    fn foreign_bytes_are_rejected() {
        let err = Reasoner::load(&b"NOTASNAPSHOT"[..], ReasonerConfig::default()).unwrap_err();
        assert!(matches!(err, ReasonerError::Snapshot(SnapshotError::BadMagic)));

        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&99u32.to_le_bytes());
        let err = Reasoner::load(bytes.as_slice(), ReasonerConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ReasonerError::Snapshot(SnapshotError::UnsupportedVersion { found: 99, .. })
        ));
    }

    fn reencode(body: &SnapshotBody) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bincode::serialize_into(&mut bytes, body).unwrap();
        bytes
    }

    fn decode(bytes: &[u8]) -> SnapshotBody {
        bincode::deserialize(&bytes[MAGIC.len() + 4..]).unwrap()
    }

    fn assert_inconsistent(bytes: &[u8]) {
        let err = Reasoner::load(bytes, ReasonerConfig::default()).unwrap_err();
        assert!(
            matches!(err, ReasonerError::Snapshot(SnapshotError::Inconsistent { .. })),
            "unexpected: {err:?}"
        );
    }

    #[test]
    fn axioms_with_unknown_ids_are_rejected() {
        use crate::axiom::Role;
        let r = classified();
        let mut bytes = Vec::new();
        r.save(&mut bytes).unwrap();

        let mut body = decode(&bytes);
        body.axioms.push(Axiom::role_inclusion(Role::new(7), Role::new(8)));
        assert_inconsistent(&reencode(&body));

        let mut body = decode(&bytes);
        body.axioms.push(Axiom::subsumption(Concept::new(40), Concept::TOP));
        assert_inconsistent(&reencode(&body));
    }

    #[test]
    fn dangling_context_and_node_ids_are_rejected() {
        let r = classified();
        let mut bytes = Vec::new();
        r.save(&mut bytes).unwrap();

        let mut body = decode(&bytes);
        body.contexts.push(ContextState::default());
        body.contexts.push(ContextState::default());
        body.contexts.push(ContextState::default());
        assert_inconsistent(&reencode(&body));

        let mut body = decode(&bytes);
        body.contexts[2].supers.insert(Concept::new(60));
        assert_inconsistent(&reencode(&body));

        let mut body = decode(&bytes);
        let node = body.taxonomy.node(body.taxonomy.top()).clone();
        let mut nodes = body.taxonomy.nodes().to_vec();
        nodes[node.id.index()].children.push(crate::taxonomy::NodeId::new(50));
        body.taxonomy = Taxonomy::from_nodes(nodes, body.taxonomy.top(), body.taxonomy.bottom());
        assert_inconsistent(&reencode(&body));

        // The untouched body still loads.
        assert!(Reasoner::load(reencode(&decode(&bytes)).as_slice(), ReasonerConfig::default()).is_ok());
    }

    #[test]
    fn truncated_body_is_a_serialization_error() {
        let r = classified();
        let mut bytes = Vec::new();
        r.save(&mut bytes).unwrap();
        bytes.truncate(bytes.len() / 2);
        let err = Reasoner::load(bytes.as_slice(), ReasonerConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ReasonerError::Snapshot(SnapshotError::Serialization { .. })
        ));
    }
}
