//! Compaction of the clause storage.
//!
//! Compaction relocates all live clause chunks to the front of a fresh buffer of the same
//! backend and rewrites every reference to a relocated clause: the clause list, all watch
//! records and the long-clause reasons on the trail.
use log::debug;

use partial_ref::{partial, PartialRef};

use rustc_hash::FxHashMap;

use kitesat_formula::Lit;

use crate::context::{
    ClauseDbP, ClauseStoreP, Context, ImplGraphP, SolverConfigP, StatsP, TrailP, WatchlistsP,
};
use crate::prop::Reason;

use super::ClauseStore;

/// Compact the clause storage when the wasted fraction exceeds the configured threshold.
pub fn collect_garbage(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut StatsP,
        mut WatchlistsP,
        SolverConfigP,
        TrailP,
    ),
) {
    let garbage_words = ctx.part(ClauseDbP).garbage_words;
    let buffer_size = ctx.part(ClauseStoreP).buffer_size();

    // Collecting when a fixed fraction of the buffer is wasted amortizes collection costs.
    if buffer_size > 0
        && garbage_words as f64 > buffer_size as f64 * ctx.part(SolverConfigP).store_wasted_fraction
    {
        collect_garbage_now(ctx.borrow());
    }
}

/// Unconditionally compact the clause storage.
pub fn collect_garbage_now(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut StatsP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let (store, mut ctx) = ctx.split_part_mut(ClauseStoreP);

    debug_assert!(db.garbage_words <= store.buffer_size());
    let old_size = store.buffer_size();

    let mut new_store = ClauseStore::new(store.is_compressed());
    let mut remap = FxHashMap::default();
    let mut lits: Vec<Lit> = vec![];

    let mut new_clauses = Vec::with_capacity(db.clauses.len());

    for &cref in db.clauses.iter() {
        if store.deleted(cref) {
            continue;
        }

        store.copy_lits(cref, &mut lits);
        let new_cref = new_store
            .add_clause(store.is_learnt(cref), store.glue(cref), &lits)
            .expect("compaction cannot grow the storage");
        new_store.set_activity(new_cref, store.activity(cref));
        new_store.set_protected(new_cref, store.protected(cref));

        remap.insert(cref, new_cref);
        new_clauses.push(new_cref);
    }

    *store = new_store;
    db.clauses = new_clauses;
    db.garbage_words = 0;

    ctx.part_mut(WatchlistsP)
        .remap_crefs(|cref| *remap.get(&cref).expect("watched clause missing after compaction"));

    // Rewrite the long-clause reasons of the assigned variables.
    {
        let mut borrowed: partial!(
            Context,
            mut ImplGraphP,
            mut StatsP,
            mut WatchlistsP,
            TrailP,
        ) = ctx.borrow();
        let (graph, ctx) = borrowed.split_part_mut(ImplGraphP);
        let trail = ctx.part(TrailP);
        let mut cursor = trail.tail_var();
        while let Some(var) = cursor {
            if let Reason::Long(cref) = *graph.reason(var) {
                let new_cref = *remap
                    .get(&cref)
                    .expect("reason clause missing after compaction");
                graph.update_reason(var, Reason::Long(new_cref));
            }
            cursor = trail.prev_var(var);
        }
    }

    ctx.part_mut(StatsP).compactions += 1;

    debug!("compaction: {} -> {} words", old_size, store.buffer_size());
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use proptest::prelude::*;

    use kitesat_formula::{cnf::strategy::*, Lit};

    use crate::clause::db;
    use crate::context::{set_var_count, AssignmentP};
    use crate::prop::enqueue_assignment;

    proptest! {
        #[test]
        fn compaction_preserves_clauses_and_reasons(
            input_a in cnf_formula(2..100usize, 100..500, 3..30),
            input_b in cnf_formula(2..100usize, 10..100, 4..20),
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            let count = std::cmp::max(input_a.var_count(), input_b.var_count());
            set_var_count(ctx.borrow(), count);

            let mut crefs_a = vec![];
            let mut crefs_b = vec![];

            for lits in input_a.iter() {
                crefs_a.push(db::add_clause(ctx.borrow(), false, 0, lits).unwrap());
            }

            for lits in input_b.iter() {
                let cref = db::add_clause(ctx.borrow(), true, 3, lits).unwrap();
                crefs_b.push(cref);

                if ctx.part(AssignmentP).lit_value(lits[0]) == None {
                    // Not a consistent propagation state, but enough to exercise the reason
                    // rewriting done by compaction.
                    enqueue_assignment(ctx.borrow(), lits[0], Reason::Long(cref), 0);
                }
            }

            for cref in crefs_a {
                db::delete_clause(ctx.borrow(), cref);
                prop_assert!(ctx.part(ClauseDbP).garbage_words > 0);
            }

            let old_buffer_size = ctx.part(ClauseStoreP).buffer_size();

            collect_garbage_now(ctx.borrow());

            prop_assert_eq!(ctx.part(ClauseDbP).garbage_words, 0);
            prop_assert!(old_buffer_size > ctx.part(ClauseStoreP).buffer_size());

            let mut output_clauses: Vec<Vec<Lit>> = vec![];
            let mut buf = vec![];
            for &cref in ctx.part(ClauseDbP).clauses.iter() {
                prop_assert!(!ctx.part(ClauseStoreP).deleted(cref));
                ctx.part(ClauseStoreP).copy_lits(cref, &mut buf);
                output_clauses.push(buf.clone());
            }

            let mut input_clauses: Vec<Vec<Lit>> =
                input_b.iter().map(|c| c.to_vec()).collect();

            output_clauses.sort();
            input_clauses.sort();
            prop_assert_eq!(input_clauses, output_clauses);

            // Asserted literals still sit in position 0 of their reason clause.
            let mut cursor = ctx.part(TrailP).tail_var();
            while let Some(var) = cursor {
                if let Reason::Long(cref) = *ctx.part(ImplGraphP).reason(var) {
                    let lit = ctx.part(ClauseStoreP).lit(cref, 0);
                    prop_assert_eq!(lit.var(), var);
                }
                cursor = ctx.part(TrailP).prev_var(var);
            }
        }
    }
}
