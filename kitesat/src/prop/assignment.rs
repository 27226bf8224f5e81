//! Partial assignment and saved phases.
use kitesat_formula::{Lit, Var};

/// Current partial assignment.
#[derive(Default)]
pub struct Assignment {
    assignment: Vec<Option<bool>>,
    last_value: Vec<bool>,
}

/// This compares two `Option<bool>` values as bytes. Workaround for bad code generation.
pub fn fast_option_eq(a: Option<bool>, b: Option<bool>) -> bool {
    unsafe { std::mem::transmute::<_, u8>(a) == std::mem::transmute::<_, u8>(b) }
}

impl Assignment {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.assignment.resize(count, None);
        self.last_value.resize(count, false);
    }

    /// Current partial assignment as slice.
    pub fn assignment(&self) -> &[Option<bool>] {
        &self.assignment
    }

    /// Value assigned to a variable.
    pub fn var_value(&self, var: Var) -> Option<bool> {
        self.assignment[var.index()]
    }

    /// Value last assigned to a variable.
    ///
    /// If the variable is currently assigned this returns the present value. If the variable
    /// was never assigned this returns false.
    pub fn last_var_value(&self, var: Var) -> bool {
        self.last_value[var.index()]
    }

    /// Value assigned to a literal.
    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.assignment[lit.index()].map(|b| b ^ lit.is_negative())
    }

    pub fn lit_is_true(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], Some(lit.is_positive()))
    }

    pub fn lit_is_false(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], Some(lit.is_negative()))
    }

    pub fn lit_is_unk(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], None)
    }

    /// Assign true to the given literal.
    ///
    /// The saved phase is updated right away, so it is valid while the variable is assigned.
    pub fn assign_lit(&mut self, lit: Lit) {
        self.assignment[lit.index()] = lit.is_positive().into();
        self.last_value[lit.index()] = lit.is_positive();
    }

    /// Unassign the given variable.
    pub fn unassign_var(&mut self, var: Var) {
        self.assignment[var.index()] = None;
    }

    /// Re-index the variables, keeping values and saved phases of the surviving ones.
    pub fn remap(&mut self, map: &[Option<Var>], new_count: usize) {
        let mut new_assignment = vec![None; new_count];
        let mut new_last_value = vec![false; new_count];
        for (old_index, entry) in map.iter().enumerate() {
            if let Some(new_var) = entry {
                new_assignment[new_var.index()] = self.assignment[old_index];
                new_last_value[new_var.index()] = self.last_value[old_index];
            }
        }
        self.assignment = new_assignment;
        self.last_value = new_last_value;
    }
}
