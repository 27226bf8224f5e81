//! Database for long clauses.
use partial_ref::{partial, PartialRef};

use kitesat_formula::Lit;

use crate::context::{
    ClauseDbP, ClauseStoreP, Context, SolverStateP, WatchlistsP,
};
use crate::state::SolverStatus;

use super::ClauseRef;

/// Database for long clauses.
///
/// Removal of clauses from the `clauses` list can be delayed; the storage's deleted flag needs
/// to be checked when iterating. The counts are always up to date.
#[derive(Default)]
pub struct ClauseDb {
    /// May contain deleted clauses, see above.
    pub clauses: Vec<ClauseRef>,
    /// Number of live long clauses.
    count: usize,
    /// Number of live long learnt clauses.
    count_learnt: usize,
    /// Words occupied by deleted but not yet collected clauses.
    pub garbage_words: usize,
    /// Learnt clause count that triggers the next reduction, 0 while unset.
    pub reduce_trigger: u64,
}

impl ClauseDb {
    /// The number of live long clauses.
    pub fn count(&self) -> usize {
        self.count
    }

    /// The number of live long learnt clauses.
    pub fn count_learnt(&self) -> usize {
        self.count_learnt
    }
}

/// Add a long clause to the database and watch its first two literals.
///
/// Returns `None` after entering the `IndexTooNarrow` state when the storage cannot represent
/// the clause.
pub fn add_clause(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut SolverStateP,
        mut WatchlistsP,
    ),
    learnt: bool,
    glue: u32,
    lits: &[Lit],
) -> Option<ClauseRef> {
    let cref = match ctx.part_mut(ClauseStoreP).add_clause(learnt, glue, lits) {
        Ok(cref) => cref,
        Err(full) => {
            ctx.part_mut(SolverStateP)
                .set_unrecoverable(SolverStatus::IndexTooNarrow, &full.to_string());
            return None;
        }
    };

    let db = ctx.part_mut(ClauseDbP);
    db.clauses.push(cref);
    db.count += 1;
    if learnt {
        db.count_learnt += 1;
    }

    ctx.part_mut(WatchlistsP)
        .watch_clause(cref, [lits[0], lits[1]]);

    Some(cref)
}

/// Delete a long clause from the database.
///
/// Removes both watches and marks the storage chunk deleted; the chunk is reclaimed by the
/// next compaction.
pub fn delete_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseStoreP, mut WatchlistsP),
    cref: ClauseRef,
) {
    let (store, mut ctx) = ctx.split_part_mut(ClauseStoreP);

    debug_assert!(!store.deleted(cref), "delete_clause for already deleted clause");

    let watched = [store.lit(cref, 0), store.lit(cref, 1)];
    for &lit in watched.iter() {
        ctx.part_mut(WatchlistsP).remove_watch(lit, cref);
    }

    let learnt = store.is_learnt(cref);
    let db = ctx.part_mut(ClauseDbP);
    db.count -= 1;
    if learnt {
        db.count_learnt -= 1;
    }
    db.garbage_words += store.chunk_words(cref);

    store.set_deleted(cref);
}

/// Delete a long clause that is not currently watched.
///
/// Used by simplification after the watch lists have been rebuilt from scratch.
pub fn delete_unwatched_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseStoreP),
    cref: ClauseRef,
) {
    let (store, mut ctx) = ctx.split_part_mut(ClauseStoreP);

    debug_assert!(!store.deleted(cref));

    let learnt = store.is_learnt(cref);
    let db = ctx.part_mut(ClauseDbP);
    db.count -= 1;
    if learnt {
        db.count_learnt -= 1;
    }
    db.garbage_words += store.chunk_words(cref);

    store.set_deleted(cref);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use kitesat_formula::{cnf_formula, lit};

    use crate::context::set_var_count;

    #[test]
    fn add_and_delete_updates_counts_and_watches() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        let clauses = cnf_formula![
            1, 2, 3;
            4, -5, 6;
            -2, 3, -4, 5;
        ];

        let mut crefs = vec![];
        for (i, lits) in clauses.iter().enumerate() {
            let learnt = i == 2;
            crefs.push(add_clause(ctx.borrow(), learnt, 2, lits).unwrap());
        }

        assert_eq!(ctx.part(ClauseDbP).count(), 3);
        assert_eq!(ctx.part(ClauseDbP).count_learnt(), 1);

        // Both watches of each clause are present
        assert_eq!(ctx.part(WatchlistsP).watched_by(lit!(-1)).len(), 1);
        assert_eq!(ctx.part(WatchlistsP).watched_by(lit!(-2)).len(), 1);
        assert_eq!(ctx.part(WatchlistsP).watched_by(lit!(2)).len(), 1);

        delete_clause(ctx.borrow(), crefs[0]);

        assert_eq!(ctx.part(ClauseDbP).count(), 2);
        assert!(ctx.part(ClauseStoreP).deleted(crefs[0]));
        assert!(ctx.part(ClauseDbP).garbage_words > 0);
        assert!(ctx.part(WatchlistsP).watched_by(lit!(-1)).is_empty());

        delete_clause(ctx.borrow(), crefs[2]);
        assert_eq!(ctx.part(ClauseDbP).count_learnt(), 0);
    }
}
