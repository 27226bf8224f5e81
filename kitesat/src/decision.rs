//! The decision heuristic.
//!
//! Branching variables come from the VSIDS heap; the branching polarity comes from phase
//! saving, unless the user fixed a polarity for the variable (either sticky or for a single
//! decision) and user polarities are currently being forced. A configurable every-Nth decision
//! flips the selected polarity.
use partial_ref::{partial, PartialRef};

use kitesat_formula::Var;

use crate::context::{
    AssignmentP, Context, ImplGraphP, RestartP, SolverConfigP, StatsP, TrailP, VariablesP,
    VsidsP,
};
use crate::prop::{enqueue_assignment, Reason};
use crate::variables::UserPolarity;

pub mod vsids;

/// Insert a variable into the branching queue if not already present.
pub fn make_available(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
}

/// Make a decision and enqueue it.
///
/// Returns `false` if no decision was made because all variables are assigned.
pub fn make_decision(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut StatsP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        RestartP,
        SolverConfigP,
    ),
) -> bool {
    let watermark = ctx.part(VariablesP).solver_watermark();
    let decision_var = loop {
        match ctx.part_mut(VsidsP).pop() {
            Some(var) => {
                // Skip assigned variables and pre-allocated slots no user literal maps to.
                if var.index() < watermark && ctx.part(AssignmentP).var_value(var).is_none() {
                    break var;
                }
            }
            None => return false,
        }
    };

    let mut negative = decide_polarity(ctx.borrow(), decision_var);

    let stats = ctx.part_mut(StatsP);
    stats.decisions += 1;

    let flip_interval = ctx.part(SolverConfigP).polarity_flip_interval;
    if flip_interval != 0 && ctx.part(StatsP).decisions % flip_interval == 0 {
        negative = !negative;
    }

    let decision = decision_var.lit(negative);

    ctx.part_mut(TrailP).new_decision_level();
    let level = ctx.part(TrailP).current_level();
    enqueue_assignment(ctx.borrow(), decision, Reason::Decision, level);

    true
}

/// Polarity for branching on the given variable.
fn decide_polarity(
    mut ctx: partial!(
        Context,
        mut VariablesP,
        AssignmentP,
        RestartP,
    ),
    var: Var,
) -> bool {
    if ctx.part(RestartP).force_user_polarity() {
        match ctx.part(VariablesP).user_polarity(var) {
            UserPolarity::Free => (),
            UserPolarity::Sticky(negative) => return negative,
            UserPolarity::Once(negative) => {
                ctx.part_mut(VariablesP)
                    .set_user_polarity(var, UserPolarity::Free);
                return negative;
            }
        }
    }

    !ctx.part(AssignmentP).last_var_value(var)
}
