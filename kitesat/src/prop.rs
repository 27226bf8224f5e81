//! Unit propagation.
pub mod assignment;
pub mod binary;
pub mod graph;
pub mod long;
pub mod repair;
pub mod trail;
pub mod watch;

pub use assignment::Assignment;
pub use graph::{Conflict, ImplGraph, ImplNode, Reason};
pub use trail::{backtrack, enqueue_assignment, full_restart, restart, Trail};
pub use watch::{Watch, Watchlists};

use partial_ref::{partial, PartialRef};

use crate::config::ConflictChoice;
use crate::context::{
    AssignmentP, BinaryClausesP, ClauseDbP, ClauseStoreP, Context, ImplGraphP, SolverConfigP,
    StatsP, TmpDataP, TrailP, VsidsP, WatchlistsP,
};

use binary::propagate_binary;
use long::propagate_long;

/// Propagate all enqueued assignments.
///
/// Propagation continues past a contradiction to the end of the literal that exposed it, so
/// several simultaneous contradictions can be collected. One of them is selected by the
/// configured rule and returned; the others are dropped and re-emerge during later propagation
/// if they still hold.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut StatsP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        BinaryClausesP,
        SolverConfigP,
    ),
) -> Result<(), Conflict> {
    let mut conflicts = std::mem::replace(&mut ctx.part_mut(TmpDataP).conflicts, vec![]);
    conflicts.clear();

    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        // Queue entries can go stale when a backtrack or a delayed implication repair ran
        // between enqueue and processing.
        if !ctx.part(AssignmentP).lit_is_true(lit) {
            continue;
        }

        propagate_binary(ctx.borrow(), lit, &mut conflicts);
        propagate_long(ctx.borrow(), lit, &mut conflicts);

        if !conflicts.is_empty() {
            break;
        }
    }

    let result = select_conflict(ctx.borrow(), &mut conflicts);
    ctx.part_mut(TmpDataP).conflicts = conflicts;
    result
}

/// Exhaustively verify the watch structures. Debug builds only.
///
/// Checks that every live long clause is watched exactly once from each of its first two
/// literals and that the binary partner lists are symmetric.
#[cfg(debug_assertions)]
pub fn assert_watch_consistency(
    mut ctx: partial!(
        Context,
        AssignmentP,
        BinaryClausesP,
        ClauseDbP,
        ClauseStoreP,
        WatchlistsP,
    ),
) {
    use kitesat_formula::Lit;

    let store = ctx.part(ClauseStoreP);
    let watchlists = ctx.part(WatchlistsP);

    for &cref in ctx.part(ClauseDbP).clauses.iter() {
        if store.deleted(cref) {
            continue;
        }
        for position in 0..2 {
            let watched_lit = store.lit(cref, position);
            let entries = watchlists
                .watched_by(!watched_lit)
                .iter()
                .filter(|watch| watch.cref == cref)
                .count();
            assert_eq!(entries, 1, "clause watch count for {:?}", watched_lit);
        }
    }

    let binary = ctx.part(BinaryClausesP);
    for code in 0..ctx.part(AssignmentP).assignment().len() * 2 {
        let implying = Lit::from_code(code);
        for &implied in binary.implied(implying) {
            // Clause {!implying, implied}: the mirrored list implies !implying when !implied
            // becomes true.
            let mirrored = binary
                .implied(!implied)
                .iter()
                .filter(|&&lit| lit == !implying)
                .count();
            assert_eq!(
                mirrored, 1,
                "binary symmetry for {:?} -> {:?}",
                implying, implied
            );
        }
    }
}

/// Pick one of the contradictions found during a propagation pass.
///
/// Contradictions whose clause was repaired in the meantime are discarded.
fn select_conflict(
    mut ctx: partial!(Context, AssignmentP, ClauseStoreP, SolverConfigP),
    conflicts: &mut Vec<Conflict>,
) -> Result<(), Conflict> {
    let (assignment, mut ctx) = ctx.split_part(AssignmentP);
    let (store, ctx) = ctx.split_part(ClauseStoreP);

    conflicts.retain(|conflict| match conflict {
        Conflict::Binary(lits) => lits.iter().all(|&lit| assignment.lit_is_false(lit)),
        Conflict::Long(cref) => {
            !store.deleted(*cref)
                && (0..store.len(*cref)).all(|i| assignment.lit_is_false(store.lit(*cref, i)))
        }
    });

    if conflicts.is_empty() {
        return Ok(());
    }

    let conflict_len = |conflict: &Conflict| match conflict {
        Conflict::Binary(_) => 2,
        Conflict::Long(cref) => store.len(*cref),
    };

    let conflict_glue = |conflict: &Conflict| match conflict {
        Conflict::Binary(_) => 1,
        Conflict::Long(cref) => store.glue(*cref),
    };

    let selected = match ctx.part(SolverConfigP).conflict_choice {
        ConflictChoice::First => conflicts[0],
        ConflictChoice::Last => *conflicts.last().unwrap(),
        ConflictChoice::Smallest => conflicts
            .iter()
            .copied()
            .min_by_key(|conflict| conflict_len(conflict))
            .unwrap(),
        ConflictChoice::LowestGlue => conflicts
            .iter()
            .copied()
            .min_by_key(|conflict| conflict_glue(conflict))
            .unwrap(),
    };

    Err(selected)
}
