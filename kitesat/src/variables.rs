//! Mapping between user variables and solver variables.
//!
//! Users address variables by the numbers appearing in their clauses; the solver works on a
//! dense range of its own variables. Both directions are kept as dense literal tables, so a
//! user literal maps to a solver literal including its sign. The mapping starts out as the
//! identity and diverges once simplification re-indexes the solver variables: globally assigned
//! solver variables are removed then, and the affected user literals are re-mapped onto a
//! single retained representative variable with the sign encoding their fixed value.
use kitesat_formula::{lit::LitIdx, Lit, Var};

const NO_LIT: LitIdx = !0;

/// User-requested branching polarity of a solver variable.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum UserPolarity {
    /// No user preference, phase saving decides.
    Free,
    /// Use the stored negation flag for the next decision on this variable, then forget it.
    Once(bool),
    /// Use the stored negation flag until cleared.
    Sticky(bool),
}

/// Mapping between user variables and solver variables.
pub struct Variables {
    /// Maps a user variable index to the solver literal image of its positive literal.
    solver_from_user: Vec<LitIdx>,
    /// Maps a solver variable index to the user literal image of its positive literal.
    user_from_solver: Vec<LitIdx>,
    /// User polarity requests, indexed by solver variable.
    user_polarity: Vec<UserPolarity>,
    /// Solver variable standing in for all globally assigned user variables, if any.
    representative: Option<Var>,
}

impl Default for Variables {
    fn default() -> Variables {
        Variables {
            solver_from_user: vec![],
            user_from_solver: vec![],
            user_polarity: vec![],
            representative: None,
        }
    }
}

impl Variables {
    /// Number of allocated solver variables.
    pub fn solver_watermark(&self) -> usize {
        self.user_from_solver.len()
    }

    /// Number of user variables seen so far.
    pub fn user_watermark(&self) -> usize {
        self.solver_from_user.len()
    }

    /// The retained representative of globally assigned user variables.
    pub fn representative(&self) -> Option<Var> {
        self.representative
    }

    pub fn set_representative(&mut self, var: Option<Var>) {
        self.representative = var;
    }

    /// The solver literal a user literal maps to, if the user variable is known.
    pub fn solver_from_user_lit(&self, user_lit: Lit) -> Option<Lit> {
        match self.solver_from_user.get(user_lit.index()).cloned() {
            None | Some(NO_LIT) => None,
            Some(code) => Some(Lit::from_code(code as usize) ^ user_lit.is_negative()),
        }
    }

    /// The user literal a solver literal maps back to.
    pub fn user_from_solver_lit(&self, solver_lit: Lit) -> Option<Lit> {
        match self.user_from_solver.get(solver_lit.index()).cloned() {
            None | Some(NO_LIT) => None,
            Some(code) => Some(Lit::from_code(code as usize) ^ solver_lit.is_negative()),
        }
    }

    /// The solver literal for a user literal, creating a solver variable if needed.
    ///
    /// Newly created solver variables extend the dense solver range.
    pub fn map_user_lit(&mut self, user_lit: Lit) -> Lit {
        if let Some(lit) = self.solver_from_user_lit(user_lit) {
            return lit;
        }

        if self.solver_from_user.len() <= user_lit.index() {
            self.solver_from_user.resize(user_lit.index() + 1, NO_LIT);
        }

        let solver_var = Var::from_index(self.user_from_solver.len());
        self.solver_from_user[user_lit.index()] = solver_var.positive().code() as LitIdx;
        self.user_from_solver
            .push(user_lit.var().positive().code() as LitIdx);
        self.user_polarity.push(UserPolarity::Free);

        solver_var.positive() ^ user_lit.is_negative()
    }

    /// User polarity request for a solver variable.
    pub fn user_polarity(&self, var: Var) -> UserPolarity {
        self.user_polarity[var.index()]
    }

    pub fn set_user_polarity(&mut self, var: Var, polarity: UserPolarity) {
        self.user_polarity[var.index()] = polarity;
    }

    /// Re-index the solver variables.
    ///
    /// `map` gives the new solver variable for every surviving old solver variable. User
    /// variables whose solver variable was removed are re-mapped onto the representative
    /// literal matching `removed_value`, the fixed value of the removed variable's positive
    /// literal. `representative` is the new index of the retained representative together with
    /// its fixed value.
    pub fn apply_solver_remap(
        &mut self,
        map: &[Option<Var>],
        representative: Option<(Var, bool)>,
        mut removed_value: impl FnMut(Var) -> bool,
    ) {
        let new_count = map.iter().filter(|entry| entry.is_some()).count();

        let mut new_user_from_solver = vec![NO_LIT; new_count];
        let mut new_user_polarity = vec![UserPolarity::Free; new_count];

        for (old_index, entry) in map.iter().enumerate() {
            if let Some(new_var) = entry {
                new_user_from_solver[new_var.index()] = self.user_from_solver[old_index];
                new_user_polarity[new_var.index()] = self.user_polarity[old_index];
            }
        }

        for user_index in 0..self.solver_from_user.len() {
            let code = self.solver_from_user[user_index];
            if code == NO_LIT {
                continue;
            }
            let old_lit = Lit::from_code(code as usize);
            self.solver_from_user[user_index] = match map[old_lit.index()] {
                Some(new_var) => {
                    (new_var.positive() ^ old_lit.is_negative()).code() as LitIdx
                }
                None => {
                    // The old solver variable is globally assigned; its user variable keeps
                    // its value through the representative.
                    let (rep, rep_value) = representative
                        .expect("re-indexing removed a variable without a representative");
                    let value = removed_value(old_lit.var()) ^ old_lit.is_negative();
                    (rep.lit(value != rep_value)).code() as LitIdx
                }
            };
        }

        self.user_from_solver = new_user_from_solver;
        self.user_polarity = new_user_polarity;
        self.representative = representative.map(|(rep, _)| rep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_until_remap() {
        let mut variables = Variables::default();

        let lit = |n| Lit::from_dimacs(n);

        assert_eq!(variables.map_user_lit(lit(1)), lit(1));
        assert_eq!(variables.map_user_lit(lit(-2)), lit(-2));
        assert_eq!(variables.map_user_lit(lit(-1)), lit(-1));
        assert_eq!(variables.solver_from_user_lit(lit(2)), Some(lit(2)));
        assert_eq!(variables.user_from_solver_lit(lit(-2)), Some(lit(-2)));
        assert_eq!(variables.solver_watermark(), 2);
    }

    #[test]
    fn out_of_order_user_vars_stay_dense() {
        let mut variables = Variables::default();

        let lit = |n| Lit::from_dimacs(n);

        assert_eq!(variables.map_user_lit(lit(5)), lit(1));
        assert_eq!(variables.map_user_lit(lit(-3)), lit(-2));
        assert_eq!(variables.map_user_lit(lit(5)), lit(1));
        assert_eq!(variables.user_from_solver_lit(lit(2)), Some(lit(3)));
        assert_eq!(variables.user_watermark(), 5);
        assert_eq!(variables.solver_watermark(), 2);
    }

    #[test]
    fn remap_routes_removed_vars_to_representative() {
        let mut variables = Variables::default();

        let lit = |n| Lit::from_dimacs(n);

        variables.map_user_lit(lit(1));
        variables.map_user_lit(lit(2));
        variables.map_user_lit(lit(3));

        // Solver var 1 (user 2) is globally assigned false; var 0 is kept as representative
        // with value true; var 2 survives and becomes var 1.
        let var = |n| Var::from_dimacs(n);
        let map = vec![Some(var(1)), None, Some(var(2))];
        variables.apply_solver_remap(&map, Some((var(1), true)), |_| false);

        assert_eq!(variables.solver_watermark(), 2);
        assert_eq!(variables.solver_from_user_lit(lit(3)), Some(lit(2)));
        // User 2 was false, the representative is true, so user 2 maps to its negation.
        assert_eq!(variables.solver_from_user_lit(lit(2)), Some(lit(-1)));
        assert_eq!(variables.representative(), Some(var(1)));
    }
}
