//! Loading user clauses into the solver.
use partial_ref::{partial, PartialRef};

use kitesat_formula::Lit;

use crate::clause::db;
use crate::context::{
    AssignmentP, BinaryClausesP, ClauseDbP, ClauseStoreP, Context, ImplGraphP, IncrementalP,
    SolverConfigP, SolverStateP, TmpDataP, TrailP, VsidsP, WatchlistsP,
};
use crate::prop::{enqueue_assignment, full_restart, Reason};
use crate::state::SolverStatus;

/// Adds a clause over solver literals to the current formula.
///
/// Duplicate literals are collapsed and tautological clauses dropped using a monotone
/// per-variable occurrence stamp whose sign encodes the polarity of the variable's last
/// occurrence, so no per-clause clearing is needed. Literals falsified at level 0 are pruned
/// and clauses satisfied at level 0 may be skipped entirely. The remainder dispatches among
/// the unit, binary and long representations.
///
/// Does not adjust the solver's variable count. If necessary that has to be done before
/// calling this.
pub fn load_clause(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut IncrementalP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    lits: &[Lit],
) {
    match ctx.part(SolverStateP).status {
        status if status.is_unrecoverable() => return,
        SolverStatus::Sat | SolverStatus::Unsat | SolverStatus::UserInterrupt => {
            ctx.part_mut(SolverStateP).status = SolverStatus::Undecided;
        }
        SolverStatus::Undecided => (),
        _ => unreachable!(),
    }

    // Restart the search when the user adds new clauses.
    full_restart(ctx.borrow());

    // Deduplicate and detect tautologies with the occurrence stamps.
    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);

    tmp.current_stamp += 1;
    let stamp = tmp.current_stamp;

    tmp.lits.clear();
    for &lit in lits {
        let entry = &mut tmp.occurrence_stamp[lit.index()];
        let signed = if lit.is_negative() { -stamp } else { stamp };
        if *entry == signed {
            // Duplicate literal.
            continue;
        }
        if *entry == -signed {
            // Tautology, the clause holds no information.
            return;
        }
        *entry = signed;
        tmp.lits.push(lit);
    }

    // Prune level 0 falsified literals and detect satisfied clauses.
    let mut globally_satisfied = false;
    tmp.lits_2.clear();
    for &lit in tmp.lits.iter() {
        match ctx.part(AssignmentP).lit_value(lit) {
            Some(value) if ctx.part(ImplGraphP).level(lit.var()) == 0 => {
                if value {
                    globally_satisfied = true;
                }
            }
            _ => tmp.lits_2.push(lit),
        }
    }

    if globally_satisfied {
        let min_size = ctx.part(SolverConfigP).drop_globally_satisfied_min_size;
        if min_size == 0 || tmp.lits.len() >= min_size {
            return;
        }
        // Configured to keep the clause; store it with the satisfied literals intact.
        tmp.lits_2.clear();
        tmp.lits_2.extend_from_slice(&tmp.lits);
    }

    match tmp.lits_2[..] {
        [] => {
            ctx.part_mut(SolverStateP)
                .set_unrecoverable(SolverStatus::Contradictory, "empty clause added");
        }
        [lit] => {
            enqueue_assignment(ctx.borrow(), lit, Reason::Decision, 0);
        }
        [lit_0, lit_1] => {
            ctx.part_mut(BinaryClausesP).add_binary_clause([lit_0, lit_1]);
        }
        ref lits => {
            db::add_clause(ctx.borrow(), false, 0, lits);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use kitesat_formula::lits;

    use crate::context::set_var_count;

    #[test]
    fn unsat_on_empty_clause() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &[]);

        assert_eq!(ctx.part(SolverStateP).status, SolverStatus::Contradictory);
    }

    #[test]
    fn unit_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1]);

        assert_eq!(ctx.part(TrailP).len(), 1);

        load_clause(ctx.borrow(), &lits![3, -3]);

        assert_eq!(ctx.part(TrailP).len(), 1);

        load_clause(ctx.borrow(), &lits![-2]);

        assert_eq!(ctx.part(TrailP).len(), 2);

        load_clause(ctx.borrow(), &lits![1, 1]);

        assert_eq!(ctx.part(TrailP).len(), 2);

        assert_eq!(ctx.part(SolverStateP).status, SolverStatus::Undecided);

        load_clause(ctx.borrow(), &lits![2]);

        assert_eq!(ctx.part(SolverStateP).status, SolverStatus::Contradictory);
    }

    #[test]
    fn binary_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1, 2]);

        assert_eq!(ctx.part(BinaryClausesP).count(), 1);

        load_clause(ctx.borrow(), &lits![-1, 3, 3]);

        assert_eq!(ctx.part(BinaryClausesP).count(), 2);

        load_clause(ctx.borrow(), &lits![4, -4]);

        assert_eq!(ctx.part(BinaryClausesP).count(), 2);

        assert_eq!(ctx.part(SolverStateP).status, SolverStatus::Undecided);
    }

    #[test]
    fn long_clauses_and_duplicates() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1, 2, 3]);

        assert_eq!(ctx.part(ClauseDbP).count(), 1);

        load_clause(ctx.borrow(), &lits![-2, 3, 3, 4]);

        assert_eq!(ctx.part(ClauseDbP).count(), 2);

        load_clause(ctx.borrow(), &lits![4, -5, 5, 2]);

        assert_eq!(ctx.part(ClauseDbP).count(), 2);

        assert_eq!(ctx.part(SolverStateP).status, SolverStatus::Undecided);
    }

    #[test]
    fn level_0_pruning() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![-1]);
        // 1 is false at level 0, so this collapses to a binary clause.
        load_clause(ctx.borrow(), &lits![1, 2, 3]);

        assert_eq!(ctx.part(ClauseDbP).count(), 0);
        assert_eq!(ctx.part(BinaryClausesP).count(), 1);

        // A clause satisfied at level 0 is dropped entirely.
        load_clause(ctx.borrow(), &lits![-1, 4, 5]);
        assert_eq!(ctx.part(ClauseDbP).count(), 0);
        assert_eq!(ctx.part(BinaryClausesP).count(), 1);
    }
}
