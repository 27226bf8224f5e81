//! Binary clauses.
//!
//! Binary clauses have no stored representation in the clause buffers. Each binary clause
//! exists solely as a pair of mutual entries in the implication lists of its two literals; the
//! parent of a binary-implied literal is the partner literal, kept inline in the implication
//! graph node.
use kitesat_formula::Lit;

/// Binary clauses.
#[derive(Default)]
pub struct BinaryClauses {
    /// Maps a literal to the literals implied by it, i.e. the partners of its negation.
    by_lit: Vec<Vec<Lit>>,
    count: usize,
}

impl BinaryClauses {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.by_lit.resize(count * 2, vec![]);
    }

    /// Add a binary clause.
    pub fn add_binary_clause(&mut self, lits: [Lit; 2]) {
        for i in 0..2 {
            self.by_lit[(!lits[i]).code()].push(lits[i ^ 1]);
        }
        self.count += 1;
    }

    /// Remove a binary clause.
    ///
    /// Each side is removed by a swap with the last entry of its list.
    pub fn remove_binary_clause(&mut self, lits: [Lit; 2]) {
        for i in 0..2 {
            let list = &mut self.by_lit[(!lits[i]).code()];
            if let Some(position) = list.iter().position(|&partner| partner == lits[i ^ 1]) {
                list.swap_remove(position);
            }
        }
        self.count -= 1;
    }

    /// Implications of a given literal.
    pub fn implied(&self, lit: Lit) -> &[Lit] {
        &self.by_lit[lit.code()]
    }

    /// Remove entries with a filter predicate over (implying, implied) literal pairs.
    ///
    /// The count is adjusted assuming the predicate is symmetric, so each surviving clause is
    /// counted from both sides.
    pub fn retain(&mut self, mut keep: impl FnMut(Lit, Lit) -> bool) {
        let mut sides = 0;
        for code in 0..self.by_lit.len() {
            let implying = Lit::from_code(code);
            let list = &mut self.by_lit[code];
            list.retain(|&implied| keep(implying, implied));
            sides += list.len();
        }
        debug_assert_eq!(sides % 2, 0);
        self.count = sides / 2;
    }

    /// Number of binary clauses.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Rebuild the lists under a new variable numbering.
    ///
    /// Every remaining entry must map to a literal below the new count.
    pub fn remap(&mut self, new_count: usize, mut map: impl FnMut(Lit) -> Lit) {
        let mut new_by_lit: Vec<Vec<Lit>> = vec![vec![]; new_count * 2];
        for code in 0..self.by_lit.len() {
            if self.by_lit[code].is_empty() {
                continue;
            }
            let implying = map(Lit::from_code(code));
            let list = std::mem::replace(&mut self.by_lit[code], vec![]);
            let target = &mut new_by_lit[implying.code()];
            target.extend(list.into_iter().map(&mut map));
        }
        self.by_lit = new_by_lit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_roundtrip() {
        let mut binary = BinaryClauses::default();
        binary.set_var_count(4);

        let lit = |n| Lit::from_dimacs(n);

        binary.add_binary_clause([lit(1), lit(2)]);
        binary.add_binary_clause([lit(-1), lit(3)]);

        assert_eq!(binary.count(), 2);
        // {1, 2} implies 2 when 1 is false
        assert_eq!(binary.implied(lit(-1)), &[lit(2)]);
        assert_eq!(binary.implied(lit(1)), &[lit(3)]);

        binary.remove_binary_clause([lit(1), lit(2)]);
        assert_eq!(binary.count(), 1);
        assert!(binary.implied(lit(-1)).is_empty());
        assert_eq!(binary.implied(lit(-2)), &[] as &[Lit]);
    }
}
