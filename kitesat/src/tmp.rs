//! Temporary data.
use kitesat_formula::Lit;

use crate::prop::Conflict;

/// Temporary data used by various parts of the solver.
///
/// Make sure to check any documented invariants when using this. Also make sure to check all
/// existing users when adding invariants.
#[derive(Default)]
pub struct TmpData {
    pub lits: Vec<Lit>,
    pub lits_2: Vec<Lit>,
    /// A boolean for each literal.
    ///
    /// Reset to all-false, keep size.
    pub flags: Vec<bool>,
    /// A boolean for each decision level.
    ///
    /// Reset to all-false, keep size.
    pub level_flags: Vec<bool>,
    /// Contradictions stashed by the propagation pass, empty between passes.
    pub conflicts: Vec<Conflict>,
    /// Monotone per-variable stamps used for duplicate and tautology detection.
    ///
    /// The absolute value is the stamp of the last clause the variable occurred in, the sign
    /// records the polarity of that occurrence. No clearing between clauses is needed.
    pub occurrence_stamp: Vec<i64>,
    /// The stamp of the clause currently being processed.
    pub current_stamp: i64,
}

impl TmpData {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.flags.resize(count * 2, false);
        self.level_flags.resize(count + 1, false);
        self.occurrence_stamp.resize(count, 0);
    }
}
