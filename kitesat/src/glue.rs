//! Compute glue levels of clauses.
//!
//! The glue level of a propagating clause is the number of distinct decision levels of the
//! clause's variables. This is also called the literal block distance (LBD). For each clause
//! the smallest glue level observed is used as an indicator of how useful that clause is.
use partial_ref::{partial, PartialRef};

use kitesat_formula::Lit;

use crate::context::{Context, ImplGraphP, IncrementalP, SolverConfigP, TmpDataP};

/// Compute the glue level of a clause.
///
/// Depending on the configuration, decision levels holding assumptions are not counted.
pub fn compute_glue(
    mut ctx: partial!(Context, mut TmpDataP, ImplGraphP, IncrementalP, SolverConfigP),
    lits: &[Lit],
) -> u32 {
    let (tmp_data, mut ctx) = ctx.split_part_mut(TmpDataP);
    let impl_graph = ctx.part(ImplGraphP);
    let flags = &mut tmp_data.level_flags;

    let skip_below = if ctx.part(SolverConfigP).assumptions_ignore_in_glue {
        ctx.part(IncrementalP).assumption_levels()
    } else {
        0
    };

    let mut glue = 0;

    for &lit in lits {
        let level = impl_graph.level(lit.var());
        if level <= skip_below && level != 0 {
            continue;
        }
        let flag = &mut flags[level];
        if !*flag {
            *flag = true;
            glue += 1
        }
    }

    for &lit in lits {
        let level = impl_graph.level(lit.var());
        flags[level] = false;
    }

    glue
}
