//! Watchlists to detect long clauses that became unit.
//!
//! Each long clause is watched by the literals in its positions 0 and 1. The watch records are
//! kept in the watchlists of the negations of those literals, so the records for a clause fire
//! when one of its watched literals becomes false. Whenever a watch is moved to a different
//! literal, the literals of the clause are permuted so the watched literals stay in positions 0
//! and 1.
//!
//! While the search backtracks strictly non-chronologically, the classic two-watch invariant
//! holds: a clause that is not unit under the current assignment is watched at two non-false
//! literals. With out-of-order assignment levels the invariant is the level-aware variant
//! described in [`crate::prop::long`]: the watches either sit on satisfied literals of lowest
//! satisfaction level, or carry the maximum decision levels among the falsified literals.
//!
//! Each watch additionally stores a blocking literal of the clause. When the blocking literal
//! is satisfied at a low enough level the clause cannot be propagating and BCP skips it without
//! fetching the clause.
use kitesat_formula::Lit;

use crate::clause::ClauseRef;

/// A watch on a long clause.
#[derive(Copy, Clone)]
pub struct Watch {
    /// Clause which has the referring lit in position 0 or 1.
    pub cref: ClauseRef,
    /// A lit of the clause, different from the referring lit.
    pub blocking: Lit,
}

/// Watchlists to detect clauses that became unit.
#[derive(Default)]
pub struct Watchlists {
    /// Indexed by the code of the literal whose assignment makes the records fire, i.e. the
    /// negation of the watched literal.
    watches: Vec<Vec<Watch>>,
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count * 2, vec![]);
    }

    /// Start watching a clause.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn watch_clause(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        for i in 0..2 {
            let watch = Watch {
                cref,
                blocking: lits[i ^ 1],
            };
            self.add_watch(!lits[i], watch);
        }
    }

    /// Watch records firing when the given literal is assigned true.
    pub fn watched_by_mut(&mut self, lit: Lit) -> &mut Vec<Watch> {
        &mut self.watches[lit.code()]
    }

    /// Watch records firing when the given literal is assigned true.
    pub fn watched_by(&self, lit: Lit) -> &[Watch] {
        &self.watches[lit.code()]
    }

    /// Add a watch record that fires when the given literal is assigned true.
    pub fn add_watch(&mut self, lit: Lit, watch: Watch) {
        self.watches[lit.code()].push(watch)
    }

    /// Stop watching a clause from the given watched literal.
    ///
    /// The clause must currently be watched by the literal.
    pub fn remove_watch(&mut self, watched_lit: Lit, cref: ClauseRef) {
        let list = &mut self.watches[(!watched_lit).code()];
        let position = list
            .iter()
            .position(|watch| watch.cref == cref)
            .expect("removed watch not present");
        list.swap_remove(position);
    }

    /// Update the blocking literal stored with the given watched literal's record.
    pub fn set_blocking(&mut self, watched_lit: Lit, cref: ClauseRef, blocking: Lit) {
        for watch in self.watches[(!watched_lit).code()].iter_mut() {
            if watch.cref == cref {
                watch.blocking = blocking;
                return;
            }
        }
        debug_assert!(false, "updated watch not present");
    }

    /// Rewrite every stored clause reference, as done after storage compaction.
    pub fn remap_crefs(&mut self, mut map: impl FnMut(ClauseRef) -> ClauseRef) {
        for list in self.watches.iter_mut() {
            for watch in list.iter_mut() {
                watch.cref = map(watch.cref);
            }
        }
    }

    /// Remove all watches.
    pub fn clear(&mut self) {
        for list in self.watches.iter_mut() {
            list.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove() {
        let mut watchlists = Watchlists::default();
        watchlists.set_var_count(4);

        let lit = |n| Lit::from_dimacs(n);
        let cref_a = ClauseRef::from_code(0);
        let cref_b = ClauseRef::from_code(8);

        watchlists.watch_clause(cref_a, [lit(1), lit(-2)]);
        watchlists.watch_clause(cref_b, [lit(1), lit(3)]);

        // Watches fire on the negation of the watched literal
        assert_eq!(watchlists.watched_by(lit(-1)).len(), 2);
        assert_eq!(watchlists.watched_by(lit(2)).len(), 1);
        assert_eq!(watchlists.watched_by(lit(-3)).len(), 1);

        watchlists.remove_watch(lit(1), cref_a);
        assert_eq!(watchlists.watched_by(lit(-1)).len(), 1);
        assert_eq!(watchlists.watched_by(lit(-1))[0].cref, cref_b);

        watchlists.set_blocking(lit(1), cref_b, lit(-4));
        assert_eq!(watchlists.watched_by(lit(-1))[0].blocking, lit(-4));
    }
}
