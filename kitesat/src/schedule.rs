//! Scheduling of solving and maintenance steps.
//!
//! The schedule drives the CDCL loop: between conflicts it polls the cooperative stop
//! channels and the time and conflict budgets, fires restarts, runs clause database
//! reduction, level 0 simplification and storage compaction, and exchanges unit clauses with
//! an outer parallel driver.
use std::time::Instant;

use log::info;

use partial_ref::{partial, PartialRef};

use crate::cdcl::conflict_step;
use crate::clause::{gc, reduce};
use crate::context::{
    ensure_var_count, AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseActivityP, ClauseDbP,
    ClauseStoreP, Context, ImplGraphP, IncrementalP, ParallelP, ProofP, RestartP, ScheduleP,
    SolverConfigP, SolverStateP, StatsP, TmpDataP, TrailP, VariablesP, VsidsP, WatchlistsP,
};
use crate::parallel;
use crate::prop::restart;
use crate::simplify::simplify;
use crate::state::{SolveResult, SolverStatus};

/// Budgets and bookkeeping of the running query.
#[derive(Default)]
pub struct Schedule {
    /// Wall clock deadline of the running query.
    pub query_deadline: Option<Instant>,
    /// Whether the user requested the query budget as cpu time.
    pub deadline_is_cpu: bool,
    /// Wall clock deadline of the whole solver lifetime.
    pub global_deadline: Option<Instant>,
    /// Conflict budget of the running query.
    pub conflict_budget: Option<u64>,
    /// Level 0 assignments seen by the last simplification pass.
    pub last_simplify_units: usize,
    /// Conflicts of the previous query, for query phase classification.
    pub last_query_conflicts: u64,
    /// Conflicts at the last progress log line.
    next_log: u64,
}

/// Run the CDCL loop until a verdict or a budget limit is reached.
pub fn search(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseActivityP,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ParallelP,
        mut ProofP,
        mut RestartP,
        mut ScheduleP,
        mut SolverStateP,
        mut StatsP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> SolveResult {
    loop {
        let status = ctx.part(SolverStateP).status;
        match status {
            SolverStatus::Sat => return SolveResult::Sat,
            SolverStatus::Unsat => return SolveResult::Unsat,
            status if status.is_unrecoverable() => return status_result(status),
            _ => (),
        }

        if ctx.part(SolverStateP).interrupt_requested || ctx.part_mut(ParallelP).stop_requested()
        {
            ctx.part_mut(SolverStateP).interrupt_requested = false;
            ctx.part_mut(SolverStateP).status = SolverStatus::UserInterrupt;
            return SolveResult::UserInterrupt;
        }

        let now = Instant::now();
        if let Some(deadline) = ctx.part(ScheduleP).global_deadline {
            if now >= deadline {
                ctx.part_mut(SolverStateP)
                    .set_unrecoverable(SolverStatus::GlobalTimeout, "global time budget spent");
                return SolveResult::TimeoutGlobal;
            }
        }
        if let Some(deadline) = ctx.part(ScheduleP).query_deadline {
            if now >= deadline {
                return SolveResult::TimeoutLocal;
            }
        }
        if let Some(budget) = ctx.part(ScheduleP).conflict_budget {
            if ctx.part(StatsP).query_conflicts() >= budget {
                return SolveResult::ConflictOut;
            }
        }

        maintenance_step(ctx.borrow());

        if ctx.part(SolverStateP).status == SolverStatus::Undecided {
            conflict_step(ctx.borrow());
        }
    }
}

/// Log progress, fire restarts and run the periodic maintenance work.
fn maintenance_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseActivityP,
        mut ClauseDbP,
        mut ClauseStoreP,
        mut ImplGraphP,
        mut IncrementalP,
        mut ParallelP,
        mut ProofP,
        mut RestartP,
        mut ScheduleP,
        mut SolverStateP,
        mut StatsP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    let conflicts = ctx.part(StatsP).conflicts;
    if conflicts >= ctx.part(ScheduleP).next_log {
        ctx.part_mut(ScheduleP).next_log = conflicts + 5000;
        if conflicts > 0 {
            info!(
                "confl: {}k rest: {} vars: {} bin: {} long: {} learnt: {}",
                conflicts / 1000,
                ctx.part(StatsP).restarts,
                ctx.part(AssignmentP).assignment().len(),
                ctx.part(BinaryClausesP).count(),
                ctx.part(ClauseDbP).count(),
                ctx.part(ClauseDbP).count_learnt(),
            );
        }
    }

    // Update the VSIDS decay drift.
    {
        let config = ctx.part(SolverConfigP);
        let stats = ctx.part(StatsP);
        if config.var_decay_update_conf_rate != 0
            && stats.conflicts % config.var_decay_update_conf_rate == 0
        {
            let steps = stats.conflicts / config.var_decay_update_conf_rate;
            let decay = (config.var_decay_init + steps as f64 * config.var_decay_inc)
                .min(config.var_decay_max);
            ctx.part_mut(VsidsP).set_decay(decay);
        }
    }

    let restart_due = {
        let restart_state = ctx.part(RestartP);
        restart_state.should_restart(ctx.part(SolverConfigP), ctx.part(StatsP))
            && ctx.part(StatsP).conflicts > 0
    };

    if restart_due {
        restart(ctx.borrow());

        {
            let mut borrowed: partial!(
                Context,
                mut AnalyzeConflictP,
                mut AssignmentP,
                mut BinaryClausesP,
                mut ClauseActivityP,
                mut ClauseDbP,
                mut ClauseStoreP,
                mut ImplGraphP,
                mut IncrementalP,
                mut ParallelP,
                mut ProofP,
                mut RestartP,
                mut ScheduleP,
                mut SolverStateP,
                mut StatsP,
                mut TmpDataP,
                mut TrailP,
                mut VariablesP,
                mut VsidsP,
                mut WatchlistsP,
                SolverConfigP,
            ) = ctx.borrow();
            let (restart_state, mut ctx) = borrowed.split_part_mut(RestartP);
            restart_state.on_restart(ctx.part(SolverConfigP), ctx.part(StatsP));
            let active = restart_state.all_uip_active(ctx.part(SolverConfigP), ctx.part(StatsP));
            ctx.part_mut(AnalyzeConflictP).all_uip_active = active;
        }

        // Exchange unit clauses with the outer driver while the trail is shallow.
        parallel::import_units(ctx.borrow());
        ensure_var_count(ctx.borrow());
        parallel::export_units(ctx.borrow());

        if reduce::should_reduce(ctx.borrow()) {
            reduce::reduce(ctx.borrow());
        }

        gc::collect_garbage(ctx.borrow());
    }

    // Level 0 simplification whenever the root level grew.
    if ctx.part(SolverConfigP).simplify
        && ctx.part(TrailP).current_level() == 0
        && ctx.part(TrailP).fully_propagated()
        && ctx.part(TrailP).top_level_assignment_count()
            > ctx.part(ScheduleP).last_simplify_units
    {
        parallel::export_units(ctx.borrow());
        simplify(ctx.borrow());
        let units = ctx.part(TrailP).top_level_assignment_count();
        ctx.part_mut(ScheduleP).last_simplify_units = units;
    }
}

/// Project an unrecoverable status onto the corresponding solve result.
pub fn status_result(status: SolverStatus) -> SolveResult {
    match status {
        SolverStatus::Sat => SolveResult::Sat,
        SolverStatus::Unsat | SolverStatus::Contradictory => SolveResult::Unsat,
        SolverStatus::UserInterrupt => SolveResult::UserInterrupt,
        SolverStatus::AllocFailed => SolveResult::MemOut,
        SolverStatus::IndexTooNarrow => SolveResult::IndexTooNarrow,
        SolverStatus::ParamError => SolveResult::ParamError,
        SolverStatus::AssumptionRequiredError => SolveResult::AssumptionRequiredError,
        SolverStatus::GlobalTimeout => SolveResult::TimeoutGlobal,
        SolverStatus::DratFileProblem => SolveResult::DratFileProblem,
        SolverStatus::CompressedMismatch | SolverStatus::ExoticError => SolveResult::ExoticError,
        SolverStatus::Undecided => SolveResult::ExoticError,
    }
}
