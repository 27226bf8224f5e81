//! Uniform accessor facade over the clause storage backends.
use kitesat_formula::Lit;

use super::{ClauseAlloc, ClauseHeader, ClauseRef, PackedAlloc, StoreFull};

/// Clause storage with a word based and a bit-compressed backend.
///
/// The backend is selected once, before the first long clause is stored, and stays fixed for
/// the lifetime of the solver. All algorithmic code accesses clauses exclusively through this
/// facade, so it is identical for both backends.
pub enum ClauseStore {
    Words(ClauseAlloc),
    Packed(PackedAlloc),
}

impl Default for ClauseStore {
    fn default() -> ClauseStore {
        ClauseStore::Words(ClauseAlloc::new())
    }
}

impl ClauseStore {
    /// Create a store with the given backend selection.
    pub fn new(compress: bool) -> ClauseStore {
        if compress {
            ClauseStore::Packed(PackedAlloc::new())
        } else {
            ClauseStore::Words(ClauseAlloc::new())
        }
    }

    /// Whether the bit-compressed backend is active.
    pub fn is_compressed(&self) -> bool {
        match self {
            ClauseStore::Words(_) => false,
            ClauseStore::Packed(_) => true,
        }
    }

    /// Allocate space for and add a new clause.
    pub fn add_clause(
        &mut self,
        learnt: bool,
        glue: u32,
        lits: &[Lit],
    ) -> Result<ClauseRef, StoreFull> {
        match self {
            ClauseStore::Words(alloc) => {
                let mut header = ClauseHeader::new();
                header.set_learnt(learnt);
                header.set_glue(glue);
                alloc.add_clause(header, lits)
            }
            ClauseStore::Packed(alloc) => alloc.add_clause(learnt, glue, lits),
        }
    }

    /// Length of a clause.
    pub fn len(&self, cref: ClauseRef) -> usize {
        match self {
            ClauseStore::Words(alloc) => alloc.header(cref).len(),
            ClauseStore::Packed(alloc) => alloc.len(cref),
        }
    }

    /// Shrink the stored length of a clause.
    pub fn set_len(&mut self, cref: ClauseRef, len: usize) {
        match self {
            ClauseStore::Words(alloc) => alloc.header_mut(cref).set_len(len),
            ClauseStore::Packed(alloc) => alloc.set_len(cref, len),
        }
    }

    /// Whether the clause was learnt.
    pub fn is_learnt(&self, cref: ClauseRef) -> bool {
        match self {
            ClauseStore::Words(alloc) => alloc.header(cref).is_learnt(),
            ClauseStore::Packed(alloc) => alloc.is_learnt(cref),
        }
    }

    /// Glue level of a clause.
    pub fn glue(&self, cref: ClauseRef) -> u32 {
        match self {
            ClauseStore::Words(alloc) => alloc.header(cref).glue(),
            ClauseStore::Packed(alloc) => alloc.glue(cref),
        }
    }

    /// Set the glue level of a learnt clause.
    pub fn set_glue(&mut self, cref: ClauseRef, glue: u32) {
        match self {
            ClauseStore::Words(alloc) => alloc.header_mut(cref).set_glue(glue),
            ClauseStore::Packed(alloc) => alloc.set_glue(cref, glue),
        }
    }

    /// Activity of a clause.
    pub fn activity(&self, cref: ClauseRef) -> f32 {
        match self {
            ClauseStore::Words(alloc) => alloc.header(cref).activity(),
            ClauseStore::Packed(alloc) => alloc.activity(cref),
        }
    }

    /// Set the activity of a learnt clause.
    pub fn set_activity(&mut self, cref: ClauseRef, activity: f32) {
        match self {
            ClauseStore::Words(alloc) => alloc.header_mut(cref).set_activity(activity),
            ClauseStore::Packed(alloc) => alloc.set_activity(cref, activity),
        }
    }

    /// Whether the clause is exempt from the next deletion pass.
    pub fn protected(&self, cref: ClauseRef) -> bool {
        match self {
            ClauseStore::Words(alloc) => alloc.header(cref).protected(),
            ClauseStore::Packed(alloc) => alloc.protected(cref),
        }
    }

    /// Exempt a learnt clause from the next deletion pass.
    pub fn set_protected(&mut self, cref: ClauseRef, protect: bool) {
        match self {
            ClauseStore::Words(alloc) => alloc.header_mut(cref).set_protected(protect),
            ClauseStore::Packed(alloc) => {
                if alloc.is_learnt(cref) {
                    alloc.set_protected(cref, protect)
                }
            }
        }
    }

    /// Whether the clause is marked as deleted.
    pub fn deleted(&self, cref: ClauseRef) -> bool {
        match self {
            ClauseStore::Words(alloc) => alloc.header(cref).deleted(),
            ClauseStore::Packed(alloc) => alloc.deleted(cref),
        }
    }

    /// Mark the clause as deleted.
    ///
    /// The chunk stays self-describing so compaction can walk over it.
    pub fn set_deleted(&mut self, cref: ClauseRef) {
        match self {
            ClauseStore::Words(alloc) => alloc.header_mut(cref).set_deleted(true),
            ClauseStore::Packed(alloc) => alloc.set_deleted(cref),
        }
    }

    /// The literal at the given position.
    pub fn lit(&self, cref: ClauseRef, index: usize) -> Lit {
        match self {
            ClauseStore::Words(alloc) => alloc.lits(cref)[index],
            ClauseStore::Packed(alloc) => alloc.lit(cref, index),
        }
    }

    /// Overwrite the literal at the given position.
    pub fn set_lit(&mut self, cref: ClauseRef, index: usize, lit: Lit) {
        match self {
            ClauseStore::Words(alloc) => alloc.lits_mut(cref)[index] = lit,
            ClauseStore::Packed(alloc) => alloc.set_lit(cref, index, lit),
        }
    }

    /// Swap two literals of a clause.
    pub fn swap_lits(&mut self, cref: ClauseRef, a: usize, b: usize) {
        match self {
            ClauseStore::Words(alloc) => alloc.lits_mut(cref).swap(a, b),
            ClauseStore::Packed(alloc) => {
                let lit_a = alloc.lit(cref, a);
                let lit_b = alloc.lit(cref, b);
                alloc.set_lit(cref, a, lit_b);
                alloc.set_lit(cref, b, lit_a);
            }
        }
    }

    /// Copy the literals of a clause into a buffer.
    pub fn copy_lits(&self, cref: ClauseRef, target: &mut Vec<Lit>) {
        target.clear();
        match self {
            ClauseStore::Words(alloc) => target.extend_from_slice(alloc.lits(cref)),
            ClauseStore::Packed(alloc) => {
                for index in 0..alloc.len(cref) {
                    target.push(alloc.lit(cref, index));
                }
            }
        }
    }

    /// Number of words the clause's chunk occupies.
    pub fn chunk_words(&self, cref: ClauseRef) -> usize {
        match self {
            ClauseStore::Words(alloc) => {
                ClauseAlloc::chunk_words(alloc.header(cref).len())
            }
            ClauseStore::Packed(alloc) => alloc.chunk_words(cref),
        }
    }

    /// Current total buffer size in words.
    pub fn buffer_size(&self) -> usize {
        match self {
            ClauseStore::Words(alloc) => alloc.buffer_size(),
            ClauseStore::Packed(alloc) => alloc.buffer_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kitesat_formula::cnf::strategy::*;

    use proptest::*;

    proptest! {
        /// Both backends observe identical clause content and metadata.
        #[test]
        fn backends_agree(input in cnf_formula(1..100usize, 1..200, 3..30)) {
            let mut words = ClauseStore::new(false);
            let mut packed = ClauseStore::new(true);

            prop_assert!(!words.is_compressed());
            prop_assert!(packed.is_compressed());

            for (i, lits) in input.iter().enumerate() {
                let learnt = i % 3 == 0;
                let glue = (lits.len() as u32).min(5);
                let word_ref = words.add_clause(learnt, glue, lits).unwrap();
                let packed_ref = packed.add_clause(learnt, glue, lits).unwrap();

                for (store, cref) in
                    [(&words, word_ref), (&packed, packed_ref)].iter()
                {
                    prop_assert_eq!(store.len(*cref), lits.len());
                    prop_assert_eq!(store.is_learnt(*cref), learnt);
                    if learnt {
                        prop_assert_eq!(store.glue(*cref), glue);
                    }
                    for (index, &lit) in lits.iter().enumerate() {
                        prop_assert_eq!(store.lit(*cref, index), lit);
                    }
                }

                words.swap_lits(word_ref, 0, lits.len() - 1);
                packed.swap_lits(packed_ref, 0, lits.len() - 1);

                let mut from_words = vec![];
                let mut from_packed = vec![];
                words.copy_lits(word_ref, &mut from_words);
                packed.copy_lits(packed_ref, &mut from_packed);
                prop_assert_eq!(from_words, from_packed);
            }
        }
    }
}
