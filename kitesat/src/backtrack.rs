//! Backtrack target selection.
//!
//! Conflict analysis produces the lowest level at which the learned clause is asserting; this
//! module decides whether to jump there (non-chronological), to the level right below the
//! conflict (chronological), or to a score-selected level in between.
use partial_ref::{partial, PartialRef};

use crate::context::{Context, IncrementalP, SolverConfigP, StatsP, TrailP};

/// Pick the level to backtrack to after a conflict.
///
/// `asserting_level` is the second-highest decision level of the learned clause. The result is
/// never below the assumption prefix unless the conflict itself sits inside it, in which case
/// the only sound move is one level down.
pub fn select_backtrack_level(
    mut ctx: partial!(Context, IncrementalP, SolverConfigP, StatsP, TrailP),
    conflict_level: usize,
    asserting_level: usize,
) -> usize {
    let config = ctx.part(SolverConfigP);
    let prefix = ctx.part(IncrementalP).assumption_levels();

    debug_assert!(asserting_level < conflict_level);

    if conflict_level <= prefix {
        // The conflict is within the assumption prefix; the assumption loop re-establishes
        // the prefix afterwards.
        return conflict_level - 1;
    }

    let mut target = asserting_level.max(prefix);

    let chrono_enabled = config.chrono_backtrack_if_higher != 0
        && ctx.part(StatsP).conflicts >= config.chrono_backtrack_postpone_conflicts;

    if chrono_enabled
        && (conflict_level - asserting_level) as u64 > config.chrono_backtrack_if_higher
    {
        target = if config.custom_backtrack {
            // Instead of one level down, pick the level with the best branching score among
            // the levels the chronological jump would keep.
            ctx.part(TrailP)
                .best_scored_level(asserting_level.max(prefix) + 1, conflict_level)
        } else {
            conflict_level - 1
        };
    }

    // The conflict level itself always unwinds.
    target.min(conflict_level - 1)
}
