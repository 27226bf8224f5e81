//! Clause activity.
use partial_ref::{partial, PartialRef};

use crate::context::{ClauseActivityP, ClauseDbP, ClauseStoreP, Context};

use super::ClauseRef;

/// Rescale activities if any value exceeds this value.
fn rescale_limit() -> f32 {
    std::f32::MAX / 16.0
}

/// Clause activity.
///
/// The individual clause activities are stored with the clauses. This stores the global
/// metadata used for bumping and decaying activities.
pub struct ClauseActivity {
    /// The value to add on bumping.
    bump: f32,
    /// The inverse of the decay factor.
    inv_decay: f32,
}

impl Default for ClauseActivity {
    fn default() -> ClauseActivity {
        ClauseActivity {
            bump: 1.0,
            inv_decay: 1.0 / 0.999,
        }
    }
}

impl ClauseActivity {
    /// Change the decay factor.
    pub fn set_decay(&mut self, decay: f32) {
        debug_assert!(decay > 0.0 && decay < 1.0);
        self.inv_decay = 1.0 / decay;
    }
}

/// Increase a clause's activity.
pub fn bump_clause_activity(
    mut ctx: partial!(Context, mut ClauseActivityP, mut ClauseStoreP, ClauseDbP),
    cref: ClauseRef,
) {
    let bump = ctx.part(ClauseActivityP).bump;
    let store = ctx.part_mut(ClauseStoreP);

    let activity = store.activity(cref) + bump;
    store.set_activity(cref, activity);

    if activity > rescale_limit() {
        rescale_clause_activities(ctx.borrow());
    }
}

/// Decay the clause activities.
pub fn decay_clause_activities(
    mut ctx: partial!(Context, mut ClauseActivityP, mut ClauseStoreP, ClauseDbP),
) {
    let activities = ctx.part_mut(ClauseActivityP);
    activities.bump *= activities.inv_decay;
    if activities.bump >= rescale_limit() {
        rescale_clause_activities(ctx.borrow());
    }
}

/// Rescale all values to avoid an overflow.
fn rescale_clause_activities(
    mut ctx: partial!(Context, mut ClauseActivityP, mut ClauseStoreP, ClauseDbP),
) {
    let rescale_factor = 1.0 / rescale_limit();

    let (db, mut ctx) = ctx.split_part(ClauseDbP);
    let (store, mut ctx) = ctx.split_part_mut(ClauseStoreP);

    for &cref in db.clauses.iter() {
        if !store.deleted(cref) && store.is_learnt(cref) {
            let activity = store.activity(cref) * rescale_factor;
            store.set_activity(cref, activity);
        }
    }
    ctx.part_mut(ClauseActivityP).bump *= rescale_factor;
}
