//! Level 0 simplification.
//!
//! Once the level 0 prefix of the trail grew since the last pass, the clause database is
//! simplified against the globally assigned values: satisfied clauses are deleted, falsified
//! literals are stripped, clauses shrinking to two literals move to the binary representation
//! and all watches are rebuilt with fresh blockers. Optionally the solver variables are then
//! re-indexed: globally assigned variables leave the active range, except one representative
//! that keeps hosting the images of the external globally assigned literals.
use log::debug;

use partial_ref::{partial, PartialRef};

use kitesat_formula::{Lit, Var};

use crate::clause::db;
use crate::context::{
    set_var_count, AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseDbP, ClauseStoreP,
    Context, ImplGraphP, IncrementalP, ParallelP, ProofP, SolverConfigP, SolverStateP, StatsP,
    TmpDataP, TrailP, VariablesP, VsidsP, WatchlistsP,
};
use crate::proof;

/// Remove globally satisfied clauses and globally falsified literals.
///
/// Must be called at decision level 0 with propagation at a fixpoint.
pub fn simplify(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ParallelP,
        mut ProofP,
        mut SolverStateP,
        mut StatsP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(ctx.part(TrailP).fully_propagated());

    ctx.part_mut(StatsP).simplifications += 1;

    // All long watches are rebuilt from scratch below.
    ctx.part_mut(WatchlistsP).clear();

    let crefs: Vec<_> = ctx.part(ClauseDbP).clauses.clone();
    let mut old_lits: Vec<Lit> = vec![];
    let mut new_lits: Vec<Lit> = vec![];

    for cref in crefs {
        if ctx.part(ClauseStoreP).deleted(cref) {
            continue;
        }

        ctx.part(ClauseStoreP).copy_lits(cref, &mut old_lits);

        let mut satisfied = false;
        new_lits.clear();
        for &lit in old_lits.iter() {
            match ctx.part(AssignmentP).lit_value(lit) {
                Some(true) => {
                    satisfied = true;
                    break;
                }
                Some(false) => (),
                None => new_lits.push(lit),
            }
        }

        if satisfied {
            proof::delete_clause_step(ctx.borrow(), &old_lits);
            db::delete_unwatched_clause(ctx.borrow(), cref);
            continue;
        }

        if new_lits.len() == old_lits.len() {
            continue;
        }

        proof::add_clause_step(ctx.borrow(), &new_lits);
        proof::delete_clause_step(ctx.borrow(), &old_lits);

        match new_lits[..] {
            // After full propagation an all-false clause would have been a conflict and a
            // clause with one unassigned literal would have propagated it.
            [] | [_] => unreachable!("clause not propagated before simplification"),
            [lit_0, lit_1] => {
                ctx.part_mut(BinaryClausesP).add_binary_clause([lit_0, lit_1]);
                db::delete_unwatched_clause(ctx.borrow(), cref);
            }
            ref lits => {
                let store = ctx.part_mut(ClauseStoreP);
                let old_words = store.chunk_words(cref);
                for (index, &lit) in lits.iter().enumerate() {
                    store.set_lit(cref, index, lit);
                }
                store.set_len(cref, lits.len());
                let slack = old_words - store.chunk_words(cref);
                ctx.part_mut(ClauseDbP).garbage_words += slack;
            }
        }
    }

    // Binary clauses with an assigned endpoint are satisfied: a falsified endpoint implies
    // the other one was propagated, making the clause satisfied as well.
    {
        let mut borrowed: partial!(
            Context,
            mut AnalyzeConflictP,
            mut AssignmentP,
            mut BinaryClausesP,
            mut ClauseDbP,
            mut ClauseStoreP,
            mut ImplGraphP,
            mut IncrementalP,
            mut ParallelP,
            mut ProofP,
            mut SolverStateP,
            mut StatsP,
            mut TmpDataP,
            mut TrailP,
            mut VariablesP,
            mut VsidsP,
            mut WatchlistsP,
            SolverConfigP,
        ) = ctx.borrow();
        let (binary, ctx) = borrowed.split_part_mut(BinaryClausesP);
        let assignment = ctx.part(AssignmentP);
        binary.retain(|implying, implied| {
            assignment.lit_is_unk(implying) && assignment.lit_is_unk(implied)
        });
    }

    if ctx.part(SolverConfigP).simplify_reindex_vars && ctx.part(TrailP).len() > 0 {
        reindex_variables(ctx.borrow());
    }

    // Re-watch the surviving long clauses; this also refreshes every cached blocker.
    {
        let crefs: Vec<_> = ctx.part(ClauseDbP).clauses.clone();
        for cref in crefs {
            if ctx.part(ClauseStoreP).deleted(cref) {
                continue;
            }
            let lit_0 = ctx.part(ClauseStoreP).lit(cref, 0);
            let lit_1 = ctx.part(ClauseStoreP).lit(cref, 1);
            ctx.part_mut(WatchlistsP).watch_clause(cref, [lit_0, lit_1]);
        }
    }

    #[cfg(debug_assertions)]
    crate::prop::assert_watch_consistency(ctx.borrow());

    debug!(
        "simplify: {} long, {} binary clauses, {} vars",
        ctx.part(ClauseDbP).count(),
        ctx.part(BinaryClausesP).count(),
        ctx.part(AssignmentP).assignment().len(),
    );
}

/// Remove the globally assigned variables from the active range.
///
/// One assigned variable is retained as the representative hosting the images of all
/// externally visible globally assigned literals. Every variable-indexed structure is
/// rewritten under the new dense numbering.
fn reindex_variables(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut IncrementalP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
) {
    let old_count = ctx.part(AssignmentP).assignment().len();

    // The representative keeps its assignment; every other assigned variable is dropped.
    let representative_old = ctx
        .part(TrailP)
        .tail_var()
        .expect("re-indexing without assigned variables");
    let representative_value = ctx
        .part(AssignmentP)
        .var_value(representative_old)
        .unwrap();

    let mut map: Vec<Option<Var>> = vec![None; old_count];
    let mut next = 0;
    for index in 0..old_count {
        if ctx.part(AssignmentP).assignment()[index].is_none() {
            map[index] = Some(Var::from_index(next));
            next += 1;
        }
    }
    let representative = Var::from_index(next);
    map[representative_old.index()] = Some(representative);
    let new_count = next + 1;

    let map_lit = |map: &[Option<Var>], lit: Lit| -> Lit {
        map[lit.index()]
            .expect("live structure refers to a removed variable")
            .lit(lit.is_negative())
    };

    // Clause literals. Only unassigned variables remain in live clauses.
    {
        let crefs: Vec<_> = ctx.part(ClauseDbP).clauses.clone();
        for cref in crefs {
            if ctx.part(ClauseStoreP).deleted(cref) {
                continue;
            }
            for index in 0..ctx.part(ClauseStoreP).len(cref) {
                let lit = ctx.part(ClauseStoreP).lit(cref, index);
                let mapped = map_lit(&map, lit);
                ctx.part_mut(ClauseStoreP).set_lit(cref, index, mapped);
            }
        }
    }

    ctx.part_mut(BinaryClausesP)
        .remap(new_count, |lit| map_lit(&map, lit));

    // External literal tables, with removed variables routed through the representative.
    {
        let mut borrowed: partial!(
            Context,
            mut AnalyzeConflictP,
            mut AssignmentP,
            mut BinaryClausesP,
            mut ClauseDbP,
            mut ClauseStoreP,
            mut ImplGraphP,
            mut IncrementalP,
            mut TmpDataP,
            mut TrailP,
            mut VariablesP,
            mut VsidsP,
            mut WatchlistsP,
        ) = ctx.borrow();
        let (variables, ctx) = borrowed.split_part_mut(VariablesP);
        let assignment = ctx.part(AssignmentP);
        variables.apply_solver_remap(
            &map,
            Some((representative, representative_value)),
            |old_var| assignment.var_value(old_var).unwrap(),
        );
    }

    // Stored assumption literals of the previous query.
    {
        let mut borrowed: partial!(
            Context,
            mut AnalyzeConflictP,
            mut AssignmentP,
            mut BinaryClausesP,
            mut ClauseDbP,
            mut ClauseStoreP,
            mut ImplGraphP,
            mut IncrementalP,
            mut TmpDataP,
            mut TrailP,
            mut VariablesP,
            mut VsidsP,
            mut WatchlistsP,
        ) = ctx.borrow();
        let (incremental, ctx) = borrowed.split_part_mut(IncrementalP);
        let assignment = ctx.part(AssignmentP);
        incremental.remap_lits(|lit| match map[lit.index()] {
            Some(new_var) => new_var.lit(lit.is_negative()),
            None => {
                let value = assignment.var_value(lit.var()).unwrap() ^ lit.is_negative();
                representative.lit(value != representative_value)
            }
        });
        incremental.invalidate_core();
    }

    // The old trail still refers to the old numbering, it has to go before the arrays shrink.
    ctx.part_mut(TrailP).clear_top_level();

    ctx.part_mut(AssignmentP).remap(&map, new_count);
    ctx.part_mut(VsidsP).remap(&map);

    set_var_count(ctx.borrow(), new_count);

    // Occurrence stamps are positional, they do not survive a re-numbering.
    {
        let tmp = ctx.part_mut(TmpDataP);
        for stamp in tmp.occurrence_stamp.iter_mut() {
            *stamp = 0;
        }
    }

    // Fresh trail holding only the representative.
    ctx.part_mut(ImplGraphP)
        .update_node(representative, crate::prop::Reason::Decision, 0);
    ctx.part_mut(TrailP).append_var(representative, 0);

    // Only the unassigned variables are branching candidates.
    for index in 0..next {
        ctx.part_mut(VsidsP).make_available(Var::from_index(index));
    }

    debug!(
        "re-indexed variables: {} -> {}",
        old_count, new_count
    );
}
