//! Propagation of binary clauses.
use partial_ref::{partial, PartialRef};

use kitesat_formula::Lit;

use crate::context::{
    AssignmentP, BinaryClausesP, Context, ImplGraphP, StatsP, TrailP, VsidsP,
};

use super::repair::reimply;
use super::trail::enqueue_assignment;
use super::{Conflict, Reason};

/// Propagate all literals implied by the given literal via binary clauses.
///
/// Contradicting binary clauses are appended to `conflicts`. An implied literal that is already
/// satisfied, but at a higher level than the implying literal, is a delayed implication and is
/// re-established at the implying literal's level.
pub fn propagate_binary(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut StatsP,
        mut TrailP,
        mut VsidsP,
        BinaryClausesP,
    ),
    lit: Lit,
    conflicts: &mut Vec<Conflict>,
) {
    let (binary_clauses, mut ctx) = ctx.split_part(BinaryClausesP);

    let lit_level = ctx.part(ImplGraphP).level(lit.var());
    let current_level = ctx.part(TrailP).current_level();

    for &implied in binary_clauses.implied(lit) {
        let assignment = ctx.part(AssignmentP);

        if assignment.lit_is_false(implied) {
            conflicts.push(Conflict::Binary([implied, !lit]));
        } else if assignment.lit_is_unk(implied) {
            enqueue_assignment(ctx.borrow(), implied, Reason::Binary([!lit]), lit_level);
            ctx.part_mut(StatsP).propagations += 1;
        } else if lit_level < current_level
            && ctx.part(ImplGraphP).level(implied.var()) > lit_level
        {
            // The clause implies `implied` at a lower level than it is currently assigned at.
            reimply(ctx.borrow(), implied, Reason::Binary([!lit]), lit_level);
        }
    }
}
