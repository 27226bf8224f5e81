//! Conflict driven clause learning.
use partial_ref::{partial, PartialRef};

use kitesat_formula::Lit;

use crate::analyze::analyze_conflict;
use crate::backtrack::select_backtrack_level;
use crate::clause::activity::{bump_clause_activity, decay_clause_activities};
use crate::clause::{db, ClauseRef};
use crate::context::{
    AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseActivityP, ClauseDbP, ClauseStoreP,
    Context, ImplGraphP, IncrementalP, ParallelP, ProofP, RestartP, SolverConfigP, SolverStateP,
    StatsP, TmpDataP, TrailP, VariablesP, VsidsP, WatchlistsP,
};
use crate::decision::make_decision;
use crate::glue::compute_glue;
use crate::incremental::{enqueue_assumption, EnqueueAssumption};
use crate::proof;
use crate::prop::{backtrack, enqueue_assignment, propagate, Conflict, Reason};
use crate::state::SolverStatus;

/// Find a conflict, learn a clause and backtrack.
///
/// When no conflict can be found the state moves to `Sat`; a conflict at level 0 or an
/// irreconcilable assumption moves it to `Contradictory` or `Unsat` respectively.
pub fn conflict_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseActivityP,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ParallelP,
        mut ProofP,
        mut SolverStateP,
        mut StatsP,
        mut TmpDataP,
        mut RestartP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    let conflict = find_conflict(ctx.borrow());

    let conflict = match conflict {
        Ok(()) => {
            ctx.part_mut(SolverStateP).status = SolverStatus::Sat;
            return;
        }
        Err(FoundConflict::Assumption) => {
            ctx.part_mut(SolverStateP).status = SolverStatus::Unsat;
            return;
        }
        Err(FoundConflict::Conflict(conflict)) => conflict,
    };

    handle_conflict(ctx.borrow(), conflict);
}

/// Return type of [`find_conflict`].
///
/// Specifies whether a conflict was found during propagation or while enqueuing assumptions.
enum FoundConflict {
    Conflict(Conflict),
    Assumption,
}

impl From<Conflict> for FoundConflict {
    fn from(conflict: Conflict) -> FoundConflict {
        FoundConflict::Conflict(conflict)
    }
}

/// Find a conflict.
///
/// Returns `Err` if a conflict was found and `Ok` if a satisfying assignment was found
/// instead.
fn find_conflict(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut IncrementalP,
        mut StatsP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        BinaryClausesP,
        RestartP,
        SolverConfigP,
    ),
) -> Result<(), FoundConflict> {
    loop {
        propagate(ctx.borrow()).map_err(FoundConflict::from)?;

        match enqueue_assumption(ctx.borrow()) {
            EnqueueAssumption::Enqueued => continue,
            EnqueueAssumption::Conflict => return Err(FoundConflict::Assumption),
            EnqueueAssumption::Done => (),
        }

        if !make_decision(ctx.borrow()) {
            return Ok(());
        }
    }
}

/// Learn from a conflict and re-establish a consistent search state.
fn handle_conflict(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseActivityP,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ProofP,
        mut RestartP,
        mut SolverStateP,
        mut StatsP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    conflict: Conflict,
) {
    ctx.part_mut(StatsP).conflicts += 1;

    // The decision levels present in the contradicting clause decide how the conflict is
    // handled; out-of-order levels appear with chronological backtracking.
    let (conflict_level, second_level, lits_at_conflict_level) = conflict_levels(ctx.borrow(), conflict);

    if conflict_level == 0 {
        proof::add_clause_step(ctx.borrow(), &[]);
        ctx.part_mut(SolverStateP)
            .set_unrecoverable(SolverStatus::Contradictory, "conflict at level 0");
        return;
    }

    if conflict_level < ctx.part(TrailP).current_level() {
        ctx.part_mut(StatsP).backtracks += 1;
        backtrack(ctx.borrow(), conflict_level);
    }

    if lits_at_conflict_level == 1 {
        // A single literal of the conflict clause sits at the top level; undoing that level
        // turns the clause into a propagating one, no learning needed.
        reassert_conflict(ctx.borrow(), conflict, conflict_level, second_level);
        return;
    }

    let asserting_level = analyze_conflict(ctx.borrow(), conflict);

    // Feed the restart heuristics before the trail unwinds.
    {
        let mut borrowed: partial!(
            Context,
            mut AnalyzeConflictP,
            mut AssignmentP,
            mut BinaryClausesP,
            mut ClauseActivityP,
            mut ClauseDbP,
            mut ClauseStoreP,
            mut ImplGraphP,
            mut IncrementalP,
            mut ProofP,
            mut RestartP,
            mut SolverStateP,
            mut StatsP,
            mut TmpDataP,
            mut TrailP,
            mut VariablesP,
            mut VsidsP,
            mut WatchlistsP,
            SolverConfigP,
        ) = ctx.borrow();
        let (restart_state, ctx) = borrowed.split_part_mut(RestartP);
        restart_state.note_conflict(
            ctx.part(SolverConfigP),
            ctx.part(AnalyzeConflictP).glue(),
            ctx.part(TrailP).len(),
        );
    }

    // Bump all involved clauses and refresh their glue while the levels are still assigned.
    for i in 0..ctx.part(AnalyzeConflictP).involved().len() {
        let cref = ctx.part(AnalyzeConflictP).involved()[i];
        bump_clause_activity(ctx.borrow(), cref);
        refresh_glue(ctx.borrow(), cref);
    }
    decay_clause_activities(ctx.borrow());

    let target = select_backtrack_level(ctx.borrow(), conflict_level, asserting_level);
    ctx.part_mut(StatsP).backtracks += 1;
    backtrack(ctx.borrow(), target);

    let reused = apply_excisions(ctx.borrow());

    // Learn the main clause and assert its first literal.
    let (clause, glue) = {
        let analyze = ctx.part(AnalyzeConflictP);
        (analyze.clause().to_vec(), analyze.glue())
    };

    proof::add_clause_step(ctx.borrow(), &clause);

    let reason = match clause[..] {
        [] => {
            ctx.part_mut(SolverStateP)
                .set_unrecoverable(SolverStatus::Contradictory, "empty clause learnt");
            return;
        }
        [_] => Reason::Decision,
        [_, lit_1] => {
            ctx.part_mut(BinaryClausesP)
                .add_binary_clause([clause[0], lit_1]);
            Reason::Binary([lit_1])
        }
        _ => {
            // When the contradicting clause shrank to exactly the learnt clause, it has
            // already been deleted and the learnt clause takes over its role; an initial
            // contradicting clause makes the learnt clause initial too.
            let learnt = match reused {
                Some(was_learnt) => was_learnt,
                None => true,
            };
            match db::add_clause(ctx.borrow(), learnt, glue, &clause) {
                Some(cref) => Reason::Long(cref),
                None => return,
            }
        }
    };

    let assert_level = match clause[..] {
        [_] => 0,
        _ => ctx.part(ImplGraphP).level(clause[1].var()),
    };
    enqueue_assignment(ctx.borrow(), clause[0], reason, assert_level);

    record_flipped(ctx.borrow());
}

/// Maximum decision level of a conflict, the second highest level and the number of literals
/// at the maximum.
fn conflict_levels(
    mut ctx: partial!(Context, ClauseStoreP, ImplGraphP),
    conflict: Conflict,
) -> (usize, usize, usize) {
    let graph = ctx.part(ImplGraphP);

    let mut max_level = 0;
    let mut second_level = 0;
    let mut at_max = 0;

    let mut visit = |level: usize| {
        if level > max_level {
            second_level = max_level;
            max_level = level;
            at_max = 1;
        } else if level == max_level {
            at_max += 1;
        } else if level > second_level {
            second_level = level;
        }
    };

    match conflict {
        Conflict::Binary(lits) => {
            for &lit in lits.iter() {
                visit(graph.level(lit.var()));
            }
        }
        Conflict::Long(cref) => {
            let store = ctx.part(ClauseStoreP);
            for index in 0..store.len(cref) {
                visit(graph.level(store.lit(cref, index).var()));
            }
        }
    }

    (max_level, second_level, at_max)
}

/// Turn a conflict with a single top level literal into a propagation.
///
/// After backtracking one level below, all other literals stay falsified and the clause
/// implies its former top level literal at the second highest level.
fn reassert_conflict(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut StatsP,
        mut TrailP,
        mut VsidsP,
    ),
    conflict: Conflict,
    conflict_level: usize,
    second_level: usize,
) {
    ctx.part_mut(StatsP).backtracks += 1;
    backtrack(ctx.borrow(), conflict_level - 1);

    match conflict {
        Conflict::Binary(lits) => {
            let (lit, other) = if ctx.part(AssignmentP).lit_is_unk(lits[0]) {
                (lits[0], lits[1])
            } else {
                (lits[1], lits[0])
            };
            enqueue_assignment(ctx.borrow(), lit, Reason::Binary([other]), second_level);
        }
        Conflict::Long(cref) => {
            // The unassigned literal is on a watched position; move it to position 0 where
            // reasons keep their propagated literal.
            let lit_0 = ctx.part(ClauseStoreP).lit(cref, 0);
            if !ctx.part(AssignmentP).lit_is_unk(lit_0) {
                ctx.part_mut(ClauseStoreP).swap_lits(cref, 0, 1);
            }
            let lit = ctx.part(ClauseStoreP).lit(cref, 0);
            debug_assert!(ctx.part(AssignmentP).lit_is_unk(lit));
            let level = ctx
                .part(ImplGraphP)
                .level(ctx.part(ClauseStoreP).lit(cref, 1).var());
            enqueue_assignment(ctx.borrow(), lit, Reason::Long(cref), level);
        }
    }
}

/// Update the stored glue of a learnt clause that took part in a conflict.
///
/// A clause whose glue drops to a small value earns a one-shot exemption from deletion.
fn refresh_glue(
    mut ctx: partial!(
        Context,
        mut ClauseStoreP,
        mut TmpDataP,
        ImplGraphP,
        IncrementalP,
        SolverConfigP,
    ),
    cref: ClauseRef,
) {
    if !ctx.part(ClauseStoreP).is_learnt(cref) {
        return;
    }

    let mut lits: Vec<Lit> = vec![];
    ctx.part(ClauseStoreP).copy_lits(cref, &mut lits);
    let new_glue = compute_glue(ctx.borrow(), &lits);

    let old_glue = ctx.part(ClauseStoreP).glue(cref);
    if new_glue < old_glue {
        ctx.part_mut(ClauseStoreP).set_glue(cref, new_glue);
        if new_glue <= ctx.part(SolverConfigP).glue_protect_once {
            ctx.part_mut(ClauseStoreP).set_protected(cref, true);
        }
    }
}

/// Apply the excisions queued by on-the-fly subsumption.
///
/// Every queued clause is rewritten without its pivot literal. When the contradicting clause
/// shrinks to exactly the learnt clause, it is deleted instead and the learnt clause is
/// recorded in its stead; the return value then tells whether it was a learnt clause.
fn apply_excisions(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut ProofP,
        mut SolverStateP,
        mut StatsP,
        mut WatchlistsP,
        AssignmentP,
        ImplGraphP,
        VariablesP,
    ),
) -> Option<bool> {
    let excisions: Vec<(ClauseRef, Lit)> = ctx.part(AnalyzeConflictP).excisions().to_vec();
    if excisions.is_empty() {
        return None;
    }

    let conflict_excision = ctx.part(AnalyzeConflictP).conflict_excision();
    let mut reused = None;

    let mut lits: Vec<Lit> = vec![];

    for (cref, pivot) in excisions {
        if ctx.part(ClauseStoreP).deleted(cref) {
            continue;
        }

        ctx.part(ClauseStoreP).copy_lits(cref, &mut lits);
        let mut shortened = lits.clone();
        shortened.retain(|&lit| lit != pivot);
        if shortened.len() == lits.len() {
            // The pivot was already excised by an earlier simplification of this clause.
            continue;
        }

        if conflict_excision == Some(cref) {
            // Reuse check: does the contradicting clause shrink to the learnt clause?
            let mut learnt_sorted = ctx.part(AnalyzeConflictP).clause().to_vec();
            let mut shortened_sorted = shortened.clone();
            learnt_sorted.sort_unstable();
            shortened_sorted.sort_unstable();
            if learnt_sorted == shortened_sorted {
                let was_learnt = ctx.part(ClauseStoreP).is_learnt(cref);
                proof::delete_clause_step(ctx.borrow(), &lits);
                db::delete_clause(ctx.borrow(), cref);
                ctx.part_mut(StatsP).otfs_reused += 1;
                reused = Some(was_learnt);
                continue;
            }
        }

        // Order the shortened clause for watching: non-false literals first, then by
        // decreasing decision level.
        {
            let assignment = ctx.part(AssignmentP);
            let graph = ctx.part(ImplGraphP);
            shortened.sort_unstable_by_key(|&lit| {
                if assignment.lit_is_false(lit) {
                    (1, std::usize::MAX - graph.level(lit.var()))
                } else {
                    (0, 0)
                }
            });
        }

        let learnt = ctx.part(ClauseStoreP).is_learnt(cref);
        let glue = ctx
            .part(ClauseStoreP)
            .glue(cref)
            .min(shortened.len().saturating_sub(1) as u32);

        proof::add_clause_step(ctx.borrow(), &shortened);
        proof::delete_clause_step(ctx.borrow(), &lits);
        db::delete_clause(ctx.borrow(), cref);

        match shortened[..] {
            [lit_0, lit_1] => {
                ctx.part_mut(BinaryClausesP).add_binary_clause([lit_0, lit_1]);
            }
            _ => {
                db::add_clause(ctx.borrow(), learnt, glue, &shortened);
            }
        }

        ctx.part_mut(StatsP).otfs_excised += 1;
    }

    reused
}

/// Record the second asserting clause produced by conflict analysis, if any.
fn record_flipped(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut ProofP,
        mut SolverStateP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        VariablesP,
    ),
) {
    let flipped: Vec<Lit> = ctx.part(AnalyzeConflictP).flipped_clause().to_vec();
    if flipped.len() < 2 {
        return;
    }

    proof::add_clause_step(ctx.borrow(), &flipped);

    let reason = match flipped[..] {
        [_, lit_1] => {
            ctx.part_mut(BinaryClausesP)
                .add_binary_clause([flipped[0], lit_1]);
            Reason::Binary([lit_1])
        }
        _ => {
            let glue = flipped.len().saturating_sub(1) as u32;
            match db::add_clause(ctx.borrow(), true, glue, &flipped) {
                Some(cref) => Reason::Long(cref),
                None => return,
            }
        }
    };

    // The clause may assert on its own after the backtrack; propagate it right away to avoid
    // a missed implication.
    if ctx.part(AssignmentP).lit_is_unk(flipped[0])
        && ctx.part(AssignmentP).lit_is_false(flipped[1])
    {
        let all_false = flipped[1..]
            .iter()
            .all(|&lit| ctx.part(AssignmentP).lit_is_false(lit));
        if all_false {
            let level = ctx.part(ImplGraphP).level(flipped[1].var());
            enqueue_assignment(ctx.borrow(), flipped[0], reason, level);
        }
    }
}
