//! Word based clause allocator.
use std::slice;

use kitesat_formula::{lit::LitIdx, Lit};

use super::header::{ClauseHeader, HEADER_LEN};
use super::{ClauseRef, StoreFull};

/// Bump allocator for clause storage.
///
/// Clauses are allocated from a single continuous buffer of words. Clauses cannot be freed
/// individually; deleted clauses stay in place as wasted space until the buffer is compacted by
/// copying the remaining clauses into a fresh allocator (see [`super::gc`]).
///
/// When the buffer is full it is reallocated using the growing strategy of [`Vec`]. A
/// [`ClauseRef`] stores an offset into the buffer and stays valid when the buffer grows.
#[derive(Default)]
pub struct ClauseAlloc {
    buffer: Vec<LitIdx>,
}

impl ClauseAlloc {
    /// Create an empty clause allocator.
    pub fn new() -> ClauseAlloc {
        ClauseAlloc::default()
    }

    /// Create a clause allocator with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> ClauseAlloc {
        ClauseAlloc {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Allocate space for and add a new clause.
    ///
    /// Clauses have a minimal size of 3, as binary and unit clauses are handled separately. This
    /// is enforced on the allocator level to safely avoid extra bound checks when accessing the
    /// initial literals of a clause.
    pub fn add_clause(
        &mut self,
        mut header: ClauseHeader,
        lits: &[Lit],
    ) -> Result<ClauseRef, StoreFull> {
        let offset = self.buffer.len();

        assert!(
            lits.len() >= 3,
            "ClauseAlloc can only store ternary and larger clauses"
        );

        if offset > u32::max_value() as usize - (HEADER_LEN + lits.len()) {
            return Err(StoreFull);
        }

        header.set_len(lits.len());

        self.buffer.extend_from_slice(&header.data);

        let lit_idx_slice = unsafe {
            // This is safe as Lit and LitIdx have the same representation
            slice::from_raw_parts(lits.as_ptr() as *const LitIdx, lits.len())
        };

        self.buffer.extend_from_slice(lit_idx_slice);

        Ok(ClauseRef::from_code(offset as u32))
    }

    /// Access the header of a clause.
    pub fn header(&self, cref: ClauseRef) -> &ClauseHeader {
        let offset = cref.code() as usize;
        assert!(
            offset + HEADER_LEN <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
        unsafe {
            let header_ptr = self.buffer.as_ptr().add(offset) as *const ClauseHeader;
            &*header_ptr
        }
    }

    /// Mutate the header of a clause.
    pub fn header_mut(&mut self, cref: ClauseRef) -> &mut ClauseHeader {
        let offset = cref.code() as usize;
        assert!(
            offset + HEADER_LEN <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
        unsafe {
            let header_ptr = self.buffer.as_mut_ptr().add(offset) as *mut ClauseHeader;
            &mut *header_ptr
        }
    }

    /// The literals of a clause.
    pub fn lits(&self, cref: ClauseRef) -> &[Lit] {
        let len = self.header(cref).len();
        let lit_offset = cref.code() as usize + HEADER_LEN;
        let lit_end = lit_offset + len;
        assert!(lit_end <= self.buffer.len(), "ClauseRef out of bounds");
        unsafe {
            let lit_ptr = self.buffer.as_ptr().add(lit_offset) as *const Lit;
            slice::from_raw_parts(lit_ptr, len)
        }
    }

    /// Mutable slice of the literals of a clause.
    pub fn lits_mut(&mut self, cref: ClauseRef) -> &mut [Lit] {
        let len = self.header(cref).len();
        let lit_offset = cref.code() as usize + HEADER_LEN;
        let lit_end = lit_offset + len;
        assert!(lit_end <= self.buffer.len(), "ClauseRef out of bounds");
        unsafe {
            let lit_ptr = self.buffer.as_mut_ptr().add(lit_offset) as *mut Lit;
            slice::from_raw_parts_mut(lit_ptr, len)
        }
    }

    /// Number of words a clause of the given length occupies.
    pub fn chunk_words(len: usize) -> usize {
        HEADER_LEN + len
    }

    /// Current buffer size in multiples of [`LitIdx`].
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kitesat_formula::cnf::strategy::*;
    use kitesat_formula::CnfFormula;

    use proptest::*;

    proptest! {
        #[test]
        fn roundtrip_from_cnf_formula(input in cnf_formula(1..100usize, 0..1000, 3..30)) {
            let mut clause_alloc = ClauseAlloc::new();
            let mut clause_refs = vec![];

            for clause_lits in input.iter() {
                let header = ClauseHeader::new();
                clause_refs.push(clause_alloc.add_clause(header, clause_lits).unwrap());
            }

            let mut recovered = CnfFormula::new();

            for cref in clause_refs {
                prop_assert_eq!(
                    clause_alloc.header(cref).len(),
                    clause_alloc.lits(cref).len()
                );
                recovered.add_clause(clause_alloc.lits(cref));
            }

            // Ignore difference caused by unused vars
            recovered.set_var_count(input.var_count());

            prop_assert_eq!(input, recovered);
        }

        #[test]
        fn clause_mutation(input in cnf_formula(1..100usize, 0..1000, 3..30)) {
            let mut clause_alloc = ClauseAlloc::new();
            let mut clause_refs = vec![];

            for clause_lits in input.iter() {
                let header = ClauseHeader::new();
                clause_refs.push(clause_alloc.add_clause(header, clause_lits).unwrap());
            }

            for &cref in clause_refs.iter() {
                clause_alloc.lits_mut(cref).reverse();
            }

            for &cref in clause_refs.iter() {
                let clause_len = clause_alloc.lits(cref).len();
                if clause_len > 3 {
                    clause_alloc.header_mut(cref).set_len(clause_len - 1);
                }
            }

            for (&cref, lits) in clause_refs.iter().zip(input.iter()) {
                let expected = if lits.len() > 3 {
                    lits[1..].iter().rev()
                } else {
                    lits.iter().rev()
                };
                prop_assert!(clause_alloc.lits(cref).iter().eq(expected));
            }
        }
    }
}
