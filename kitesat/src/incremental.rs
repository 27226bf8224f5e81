//! Assumption handling.
//!
//! Assumptions are enqueued as decisions, one per level, below all search decisions. When an
//! assumption turns out falsified, the query is unsatisfiable under its assumptions and the
//! subset of assumptions that took part in falsifying it is extracted right away, while the
//! implication graph is still intact. The per-index answers are then served by
//! [`is_assumption_required`](crate::solver::Solver::is_assumption_required) without touching
//! the solver state again.
use partial_ref::{partial, PartialRef};

use rustc_hash::FxHashSet;

use kitesat_formula::{Lit, Var};

use crate::context::{
    AssignmentP, ClauseStoreP, Context, ImplGraphP, IncrementalP, StatsP, TmpDataP, TrailP,
    VsidsP,
};
use crate::prop::{backtrack, enqueue_assignment, Reason};

/// Assumption state of the current and previous query.
#[derive(Default)]
pub struct Incremental {
    /// Solver literal of each active assumption, in enqueue order.
    assumptions: Vec<Lit>,
    /// The user's assumption literals of the latest query, in the order provided.
    user_assumptions: Vec<Lit>,
    /// Solver literal each user assumption maps to, parallel to `user_assumptions`.
    mapped_assumptions: Vec<Lit>,
    /// Number of decision levels currently holding assumptions.
    assumption_levels: usize,
    /// Per-index unsat core membership, valid only directly after an unsat answer.
    required: Vec<bool>,
    /// Whether `required` holds answers for the latest query.
    core_valid: bool,
}

impl Incremental {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, _count: usize) {}

    /// Current number of decision levels used for assumptions.
    pub fn assumption_levels(&self) -> usize {
        self.assumption_levels
    }

    /// Resets assumption bookkeeping on a full restart.
    pub fn full_restart(&mut self) {
        self.assumption_levels = 0;
    }

    /// The solver literals assumed by the current query.
    pub fn assumptions(&self) -> &[Lit] {
        &self.assumptions
    }

    /// Whether the latest query produced core answers.
    pub fn core_valid(&self) -> bool {
        self.core_valid
    }

    /// Whether the i-th user assumption of the latest query is in the unsat core.
    ///
    /// Returns `None` for an out of range index.
    pub fn assumption_required(&self, index: usize) -> Option<bool> {
        self.required.get(index).cloned()
    }

    /// Invalidate the unsat core answers.
    pub fn invalidate_core(&mut self) {
        self.core_valid = false;
    }

    /// Re-map the stored assumption literals after variable re-indexing.
    pub fn remap_lits(&mut self, mut map: impl FnMut(Lit) -> Lit) {
        for lit in self
            .assumptions
            .iter_mut()
            .chain(self.mapped_assumptions.iter_mut())
        {
            *lit = map(*lit);
        }
    }
}

/// Install a new assumption set, reusing the matching prefix of the current trail.
///
/// The assumptions are reordered so that decision levels kept from the previous query come
/// first; the remaining assumptions are enqueued by the search loop. Returns the number of
/// decision levels saved by the reuse.
pub fn set_assumptions(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut IncrementalP,
        mut StatsP,
        mut TrailP,
        mut VsidsP,
    ),
    user_assumptions: Vec<Lit>,
    mapped: Vec<Lit>,
    reuse_trail: bool,
) -> usize {
    let mut reused_levels = 0;

    {
        let new_set: FxHashSet<Lit> = mapped.iter().cloned().collect();

        let trail = ctx.part(TrailP);
        let reusable = trail.current_level().min(ctx.part(IncrementalP).assumption_levels);

        if reuse_trail {
            while reused_levels < reusable {
                let decision = trail.decision_at_level(reused_levels + 1);
                if !new_set.contains(&decision) {
                    break;
                }
                reused_levels += 1;
            }
        }
    }

    backtrack(ctx.borrow(), reused_levels);
    ctx.part_mut(StatsP).assump_reuse_levels_saved += reused_levels as u64;

    let incremental = ctx.part_mut(IncrementalP);

    // Kept assumptions first, in their trail order, so the level-indexed enqueue below lines
    // up with the reused prefix.
    incremental.assumptions.clear();
    incremental.user_assumptions = user_assumptions;
    incremental.mapped_assumptions = mapped;
    incremental.core_valid = false;
    incremental.assumption_levels = reused_levels;

    let mut remaining: Vec<Lit> = incremental.mapped_assumptions.clone();
    for level in 1..=reused_levels {
        let decision = ctx.part(TrailP).decision_at_level(level);
        ctx.part_mut(IncrementalP).assumptions.push(decision);
        let remaining_pos = remaining.iter().position(|&lit| lit == decision);
        if let Some(pos) = remaining_pos {
            remaining.remove(pos);
        }
    }
    ctx.part_mut(IncrementalP).assumptions.extend(remaining);

    reused_levels
}

/// Return type of [`enqueue_assumption`].
pub enum EnqueueAssumption {
    Done,
    Enqueued,
    Conflict,
}

/// Enqueue another assumption if possible.
///
/// Returns whether an assumption was enqueued, whether no assumptions are left or whether the
/// assumptions result in a conflict.
pub fn enqueue_assumption(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut IncrementalP,
        mut TmpDataP,
        mut TrailP,
        ClauseStoreP,
        VsidsP,
    ),
) -> EnqueueAssumption {
    while let Some(&assumption) = ctx
        .part(IncrementalP)
        .assumptions
        .get(ctx.part(TrailP).current_level())
    {
        match ctx.part(AssignmentP).lit_value(assumption) {
            Some(false) => {
                analyze_assumption_conflict(ctx.borrow(), assumption);
                return EnqueueAssumption::Conflict;
            }
            Some(true) => {
                // The next assumption is already implied by the enqueued ones, its level
                // collapses into theirs.
                let level = ctx.part(TrailP).current_level();
                let incremental = ctx.part_mut(IncrementalP);
                incremental.assumptions.swap_remove(level);
            }
            None => {
                ctx.part_mut(TrailP).new_decision_level();
                let level = ctx.part(TrailP).current_level();
                enqueue_assignment(ctx.borrow(), assumption, Reason::Decision, level);
                let (incremental, ctx) = ctx.split_part_mut(IncrementalP);
                incremental.assumption_levels = ctx.part(TrailP).current_level();
                return EnqueueAssumption::Enqueued;
            }
        }
    }
    EnqueueAssumption::Done
}

/// Analyze a conflicting set of assumptions.
///
/// Given an assumption that is falsified under the assumptions enqueued so far, walk the
/// implication cone of its negation and collect the assumptions taking part. The per-index
/// core answers for the user's assumption array are derived immediately; for duplicated
/// assumption literals the first occurrence wins.
fn analyze_assumption_conflict(
    mut ctx: partial!(
        Context,
        mut IncrementalP,
        mut TmpDataP,
        ClauseStoreP,
        ImplGraphP,
        TrailP,
    ),
    assumption: Lit,
) {
    let mut core_vars: FxHashSet<Var> = FxHashSet::default();
    core_vars.insert(assumption.var());

    {
        let mut borrowed: partial!(
            Context,
            mut IncrementalP,
            mut TmpDataP,
            ClauseStoreP,
            ImplGraphP,
            TrailP,
        ) = ctx.borrow();
        let (tmp, mut ctx) = borrowed.split_part_mut(TmpDataP);
        let flags = &mut tmp.flags;

        flags[assumption.index()] = true;
        let mut flag_count = 1;

        let mut cursor = ctx.part(TrailP).tail_var();
        while let Some(var) = cursor {
            cursor = ctx.part(TrailP).prev_var(var);

            if !flags[var.index()] {
                continue;
            }
            flags[var.index()] = false;
            flag_count -= 1;

            let reason = *ctx.part(ImplGraphP).reason(var);
            match reason {
                Reason::Decision => {
                    if ctx.part(ImplGraphP).level(var) > 0 {
                        core_vars.insert(var);
                    }
                }
                Reason::Binary([other]) => {
                    if !flags[other.index()] {
                        flags[other.index()] = true;
                        flag_count += 1;
                    }
                }
                Reason::Long(cref) => {
                    for index in 1..ctx.part(ClauseStoreP).len(cref) {
                        let lit = ctx.part(ClauseStoreP).lit(cref, index);
                        if !flags[lit.index()] {
                            flags[lit.index()] = true;
                            flag_count += 1;
                        }
                    }
                }
            }

            if flag_count == 0 {
                break;
            }
        }

        // Clear any flags that survive an early exit.
        if flag_count > 0 {
            let mut cursor = ctx.part(TrailP).tail_var();
            while let Some(var) = cursor {
                flags[var.index()] = false;
                cursor = ctx.part(TrailP).prev_var(var);
            }
        }
    }

    let incremental = ctx.part_mut(IncrementalP);

    incremental.required.clear();
    let mut seen = FxHashSet::default();
    for i in 0..incremental.user_assumptions.len() {
        let mapped = incremental.mapped_assumptions[i];
        let duplicate = !seen.insert(mapped);
        incremental
            .required
            .push(!duplicate && core_vars.contains(&mapped.var()));
    }
    incremental.core_valid = true;
}
