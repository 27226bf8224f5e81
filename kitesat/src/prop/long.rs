//! Propagation of long clauses.
//!
//! This generalizes the textbook two-watch scheme to trails with out-of-order decision levels.
//! The invariant maintained for every long clause is level-aware: either both watches are
//! satisfied at the lowest satisfaction level in the clause, or the watches carry the maximum
//! decision levels among the falsified literals. Cached blocking literals additionally must be
//! satisfied at a level no higher than the falsified watch for a skip to be sound, as a
//! satisfied literal at a too-high level may itself be a delayed implication.
use partial_ref::{partial, PartialRef};

use kitesat_formula::Lit;

use crate::context::{
    AssignmentP, ClauseStoreP, Context, ImplGraphP, StatsP, TrailP, VsidsP, WatchlistsP,
};

use super::repair::reimply;
use super::trail::enqueue_assignment;
use super::watch::Watch;
use super::{Conflict, Reason};

/// Propagate all literals implied by long clauses watched by the given literal.
///
/// Contradicting clauses are appended to `conflicts`; scanning always finishes the whole watch
/// list so that several simultaneous contradictions can be collected and the watch layout stays
/// consistent.
pub fn propagate_long(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut StatsP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    lit: Lit,
    conflicts: &mut Vec<Conflict>,
) {
    let lit_level = ctx.part(ImplGraphP).level(lit.var());
    let current_level = ctx.part(TrailP).current_level();
    let false_lit = !lit;

    // The list is detached while we scan it, as moved watches are pushed onto other lists.
    let mut watches = std::mem::take(ctx.part_mut(WatchlistsP).watched_by_mut(lit));

    let mut write = 0;

    'watches: for read in 0..watches.len() {
        let watch = watches[read];

        {
            let assignment = ctx.part(AssignmentP);
            if assignment.lit_is_true(watch.blocking)
                && ctx.part(ImplGraphP).level(watch.blocking.var()) <= lit_level
            {
                watches[write] = watch;
                write += 1;
                continue;
            }
        }

        let cref = watch.cref;

        // Normalize so the falsified watch is in position 1.
        if ctx.part(ClauseStoreP).lit(cref, 0) == false_lit {
            ctx.part_mut(ClauseStoreP).swap_lits(cref, 0, 1);
        }
        debug_assert_eq!(ctx.part(ClauseStoreP).lit(cref, 1), false_lit);

        let first = ctx.part(ClauseStoreP).lit(cref, 0);

        // The refreshed watch caches the other watched literal as blocker.
        let new_watch = Watch {
            cref,
            blocking: first,
        };

        let first_is_true = ctx.part(AssignmentP).lit_is_true(first);
        if first_is_true && ctx.part(ImplGraphP).level(first.var()) <= lit_level {
            watches[write] = new_watch;
            write += 1;
            continue;
        }

        // Scan the non-watched literals for the best replacement watch: any non-false literal
        // wins, otherwise the falsified literal with the highest decision level.
        let len = ctx.part(ClauseStoreP).len(cref);
        let mut best_false = None;

        for index in 2..len {
            let candidate = ctx.part(ClauseStoreP).lit(cref, index);
            if !ctx.part(AssignmentP).lit_is_false(candidate) {
                // Move the watch to the non-false candidate.
                ctx.part_mut(ClauseStoreP).set_lit(cref, 1, candidate);
                ctx.part_mut(ClauseStoreP).set_lit(cref, index, false_lit);
                ctx.part_mut(WatchlistsP).add_watch(!candidate, new_watch);
                continue 'watches;
            }
            let candidate_level = ctx.part(ImplGraphP).level(candidate.var());
            match best_false {
                Some((_, level)) if level >= candidate_level => (),
                _ => best_false = Some((index, candidate_level)),
            }
        }

        // All non-watched literals are falsified. In chronological mode the watch still moves
        // when some falsified literal has a higher level than the propagating one, keeping the
        // maximum levels on the watched positions.
        let mut watch_moved = false;
        if let Some((index, level)) = best_false {
            if lit_level < current_level && level > lit_level {
                let candidate = ctx.part(ClauseStoreP).lit(cref, index);
                ctx.part_mut(ClauseStoreP).swap_lits(cref, 1, index);
                ctx.part_mut(WatchlistsP).add_watch(!candidate, new_watch);
                watch_moved = true;
            }
        }
        if !watch_moved {
            watches[write] = new_watch;
            write += 1;
        }

        let watch_1 = ctx.part(ClauseStoreP).lit(cref, 1);
        let watch_1_level = ctx.part(ImplGraphP).level(watch_1.var());

        if ctx.part(AssignmentP).lit_is_false(first) {
            // Contradiction. If a non-watched literal outranks the falsified watch, swap it in
            // first: backtracking between the two levels would otherwise miss an implication.
            let first_level = ctx.part(ImplGraphP).level(first.var());
            if watch_1_level < first_level {
                if let Some((index, level)) = max_level_tail(ctx.borrow(), cref) {
                    if watch_1_level < level {
                        let candidate = ctx.part(ClauseStoreP).lit(cref, index);
                        if watch_moved {
                            ctx.part_mut(WatchlistsP).remove_watch(watch_1, cref);
                        } else {
                            // The watch record was just written to the detached list, drop it
                            // there instead of searching the (empty) live list.
                            write -= 1;
                        }
                        ctx.part_mut(ClauseStoreP).swap_lits(cref, 1, index);
                        ctx.part_mut(WatchlistsP).add_watch(
                            !candidate,
                            Watch {
                                cref,
                                blocking: first,
                            },
                        );
                    }
                }
            }
            conflicts.push(Conflict::Long(cref));
        } else if ctx.part(AssignmentP).lit_is_unk(first) {
            // The clause became unit; the implication level is the maximum falsified level,
            // which sits on the watched position 1.
            enqueue_assignment(ctx.borrow(), first, Reason::Long(cref), watch_1_level);
            ctx.part_mut(StatsP).propagations += 1;
        } else if ctx.part(ImplGraphP).level(first.var()) > watch_1_level {
            // Satisfied, but the clause implies `first` at a lower level.
            reimply(ctx.borrow(), first, Reason::Long(cref), watch_1_level);
        }
    }

    watches.truncate(write);
    *ctx.part_mut(WatchlistsP).watched_by_mut(lit) = watches;
}

/// Position and level of the highest-level falsified non-watched literal of a clause.
fn max_level_tail(
    mut ctx: partial!(Context, ClauseStoreP, ImplGraphP),
    cref: crate::clause::ClauseRef,
) -> Option<(usize, usize)> {
    let store = ctx.part(ClauseStoreP);
    let graph = ctx.part(ImplGraphP);

    let mut best = None;
    for index in 2..store.len(cref) {
        let level = graph.level(store.lit(cref, index).var());
        match best {
            Some((_, best_level)) if best_level >= level => (),
            _ => best = Some((index, level)),
        }
    }
    best
}
