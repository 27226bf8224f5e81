//! Learnt clause database reduction.
//!
//! Reduction fires when the number of live learnt clauses exceeds a rising trigger. Clauses
//! are exempt when their glue is below the keep-forever threshold, when they are the reason of
//! a trail literal, or when they carry the one-shot protection flag, which is consumed by the
//! pass. The remaining candidates are ordered by (glue cluster, activity) and the worst
//! configured fraction is deleted.
use std::cmp::Reverse;

use log::debug;

use ordered_float::OrderedFloat;

use partial_ref::{partial, PartialRef};

use rustc_hash::FxHashSet;

use crate::context::{
    ClauseDbP, ClauseStoreP, Context, ImplGraphP, SolverConfigP, StatsP, TrailP, WatchlistsP,
};
use crate::prop::Reason;

use super::db;
use super::ClauseRef;

/// Whether the learnt clause count reached the reduction trigger.
pub fn should_reduce(mut ctx: partial!(Context, ClauseDbP, SolverConfigP)) -> bool {
    let trigger = match ctx.part(ClauseDbP).reduce_trigger {
        0 => ctx.part(SolverConfigP).reduce_trigger_init,
        trigger => trigger,
    };
    ctx.part(ClauseDbP).count_learnt() as u64 >= trigger
}

/// Delete the worst fraction of the deletable learnt clauses.
pub fn reduce(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut StatsP,
        mut WatchlistsP,
        ImplGraphP,
        SolverConfigP,
        TrailP,
    ),
) {
    // Clauses serving as trail parents must survive the pass.
    let mut parents = FxHashSet::default();
    {
        let trail = ctx.part(TrailP);
        let graph = ctx.part(ImplGraphP);
        let mut cursor = trail.tail_var();
        while let Some(var) = cursor {
            if let Reason::Long(cref) = graph.reason(var) {
                parents.insert(*cref);
            }
            cursor = trail.prev_var(var);
        }
    }

    let mut candidates: Vec<(u32, OrderedFloat<f32>, ClauseRef)> = vec![];
    {
        let mut borrowed: partial!(
            Context,
            mut ClauseDbP,
            mut ClauseStoreP,
            mut StatsP,
            mut WatchlistsP,
            ImplGraphP,
            SolverConfigP,
            TrailP,
        ) = ctx.borrow();
        let (db, mut ctx) = borrowed.split_part_mut(ClauseDbP);
        let (store, ctx) = ctx.split_part_mut(ClauseStoreP);
        let config = ctx.part(SolverConfigP);

        db.clauses.retain(|&cref| !store.deleted(cref));

        for &cref in db.clauses.iter() {
            if !store.is_learnt(cref) {
                continue;
            }
            let glue = store.glue(cref);
            if glue <= config.glue_never_delete {
                continue;
            }
            if parents.contains(&cref) {
                continue;
            }
            if store.protected(cref) {
                store.set_protected(cref, false);
                continue;
            }
            let cluster = glue.min(config.reduce_glue_clusters);
            candidates.push((cluster, OrderedFloat(store.activity(cref)), cref));
        }
    }

    // Worst first: highest glue cluster, then lowest activity.
    candidates.sort_unstable_by_key(|&(cluster, activity, _)| (Reverse(cluster), activity));

    let to_delete =
        (candidates.len() as f64 * ctx.part(SolverConfigP).reduce_fraction) as usize;

    for &(_, _, cref) in candidates[..to_delete].iter() {
        db::delete_clause(ctx.borrow(), cref);
        ctx.part_mut(StatsP).clauses_deleted += 1;
    }

    let config = ctx.part(SolverConfigP);
    let next_trigger = {
        let current = match ctx.part(ClauseDbP).reduce_trigger {
            0 => config.reduce_trigger_init,
            trigger => trigger,
        };
        if config.reduce_trigger_geometric {
            (current as f64 * config.reduce_trigger_mult) as u64
        } else {
            current + config.reduce_trigger_inc
        }
    };
    ctx.part_mut(ClauseDbP).reduce_trigger = next_trigger;

    debug!(
        "reduce: deleted {} of {} candidates, next trigger {}",
        to_delete,
        candidates.len(),
        next_trigger
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use kitesat_formula::cnf_formula;

    use crate::context::set_var_count;

    #[test]
    fn protected_and_low_glue_clauses_survive() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 20);
        ctx.part_mut(SolverConfigP).reduce_fraction = 1.0;
        ctx.part_mut(SolverConfigP).glue_never_delete = 2;

        let clauses = cnf_formula![
            1, 2, 3;
            4, 5, 6;
            7, 8, 9;
            10, 11, 12;
        ];

        let mut crefs = vec![];
        for (i, lits) in clauses.iter().enumerate() {
            let glue = 2 + i as u32;
            crefs.push(db::add_clause(ctx.borrow(), true, glue, lits).unwrap());
        }

        // Glue 2 is never deleted, the protected clause survives one pass.
        ctx.part_mut(ClauseStoreP).set_protected(crefs[2], true);

        reduce(ctx.borrow());

        let store = ctx.part(ClauseStoreP);
        assert!(!store.deleted(crefs[0]));
        assert!(store.deleted(crefs[1]));
        assert!(!store.deleted(crefs[2]));
        assert!(!store.protected(crefs[2]));
        assert!(store.deleted(crefs[3]));

        assert_eq!(ctx.part(ClauseDbP).count_learnt(), 2);
        assert_eq!(ctx.part(StatsP).clauses_deleted, 2);

        // The second pass also deletes the no longer protected clause.
        reduce(ctx.borrow());
        assert!(ctx.part(ClauseStoreP).deleted(crefs[2]));
    }
}
