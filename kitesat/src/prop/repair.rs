//! Delayed implication repair.
//!
//! Chronological backtracking can leave the trail in a state where a satisfied literal has a
//! higher decision level than the level at which one of its clauses would imply it. Such a
//! literal "should have been" implied at the lower level. When propagation discovers this, the
//! literal is re-implied: its level and reason are replaced, its trail position is moved to the
//! lower level, and it is scheduled for re-propagation. Re-propagation recursively applies the
//! same treatment to every consequence the literal had caused at the higher level.
//!
//! Pending contradictions collected by the same propagation pass are re-validated after repair,
//! as some of them dissolve into plain implications (see
//! [`select_conflict`](super::select_conflict)).
use partial_ref::{partial, PartialRef};

use kitesat_formula::Lit;

use crate::context::{Context, ImplGraphP, StatsP, TrailP, VsidsP};

use super::graph::Reason;

/// Re-establish an already satisfied literal at a lower decision level.
///
/// The literal keeps its value; only its implication metadata and trail position change.
pub fn reimply(
    mut ctx: partial!(Context, mut ImplGraphP, mut StatsP, mut TrailP, VsidsP),
    lit: Lit,
    reason: Reason,
    new_level: usize,
) {
    let var = lit.var();
    let old_level = ctx.part(ImplGraphP).level(var);
    debug_assert!(new_level < old_level);

    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    let prev_is_same_level = trail
        .prev_var(var)
        .map(|prev| ctx.part(ImplGraphP).level(prev) == old_level)
        .unwrap_or(false);
    trail.remove_var(var, old_level, prev_is_same_level);

    ctx.part_mut(ImplGraphP).update_node(var, reason, new_level);

    let score = ctx.part(VsidsP).score(var);
    trail.append_var(var, new_level);
    trail.note_score(new_level, score);
    trail.enqueue_lit(lit);

    ctx.part_mut(StatsP).delayed_implications += 1;
}
