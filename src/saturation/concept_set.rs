//! Compact integer set for derived superconcepts.
//!
//! Concept ids are dense, so a bit-packed vector gives O(1) membership and
//! word-at-a-time union. Bit `i` of the packed representation is concept `i`.

use serde::{Deserialize, Serialize};

use crate::axiom::Concept;

const WORD_BITS: usize = 64;

/// Growable bitset over concept ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptSet {
    words: Vec<u64>,
    len: usize,
}

impl ConceptSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set pre-sized for ids below `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(WORD_BITS)],
            len: 0,
        }
    }

    /// Insert a concept. Returns true if it was not already present.
    pub fn insert(&mut self, concept: Concept) -> bool {
        let (word, mask) = locate(concept);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let slot = &mut self.words[word];
        if *slot & mask != 0 {
            return false;
        }
        *slot |= mask;
        self.len += 1;
        true
    }

    /// Remove a concept. Returns true if it was present.
    pub fn remove(&mut self, concept: Concept) -> bool {
        let (word, mask) = locate(concept);
        match self.words.get_mut(word) {
            Some(slot) if *slot & mask != 0 => {
                *slot &= !mask;
                self.len -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, concept: Concept) -> bool {
        let (word, mask) = locate(concept);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Add every member of `other`. Returns true if the set grew.
    pub fn union_with(&mut self, other: &ConceptSet) -> bool {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut grew = false;
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            let merged = *mine | theirs;
            if merged != *mine {
                self.len += (merged ^ *mine).count_ones() as usize;
                *mine = merged;
                grew = true;
            }
        }
        grew
    }

    /// Whether every member of `self` is in `other`.
    pub fn is_subset(&self, other: &ConceptSet) -> bool {
        self.words.iter().enumerate().all(|(i, &w)| {
            let theirs = other.words.get(i).copied().unwrap_or(0);
            w & !theirs == 0
        })
    }

    /// Remove every member and release the backing words.
    pub fn clear(&mut self) {
        self.words.clear();
        self.words.shrink_to_fit();
        self.len = 0;
    }

    /// Members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = Concept> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let base = i * WORD_BITS;
            BitIter(word).map(move |bit| Concept::new((base + bit) as u32))
        })
    }
}

// Trailing zero words are not significant.
impl PartialEq for ConceptSet {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.is_subset(other)
    }
}

impl Eq for ConceptSet {}

impl FromIterator<Concept> for ConceptSet {
    fn from_iter<T: IntoIterator<Item = Concept>>(iter: T) -> Self {
        let mut set = ConceptSet::new();
        for concept in iter {
            set.insert(concept);
        }
        set
    }
}

fn locate(concept: Concept) -> (usize, u64) {
    let i = concept.index();
    (i / WORD_BITS, 1u64 << (i % WORD_BITS))
}

/// Yields the positions of set bits, lowest first.
struct BitIter(u64);

impl Iterator for BitIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}
