//! Hooks for an outer parallel driver.
//!
//! The core itself is single threaded; an outer driver may run several solver instances and
//! exchange unit clauses between them. Two callbacks implement the exchange: one reports every
//! new level 0 unit in user literals, the other is drained after each restart for units
//! produced elsewhere. A third callback lets the host request a cooperative stop, polled
//! between conflicts.
use partial_ref::{partial, PartialRef};

use kitesat_formula::Lit;

use crate::context::{
    AssignmentP, Context, ImplGraphP, ParallelP, SolverStateP, StatsP, TrailP, VariablesP,
    VsidsP,
};
use crate::prop::{enqueue_assignment, Reason};
use crate::state::SolverStatus;

/// Callback reporting a derived unit clause as `(thread_id, user_literal)`.
pub type ReportUnitCallback = Box<dyn FnMut(u32, isize)>;

/// Callback yielding foreign unit clauses as user literals, 0 when drained.
pub type GetUnitCallback = Box<dyn FnMut(u32, bool) -> isize>;

/// Callback polled between conflicts; returning `true` requests a stop.
pub type StopCallback = Box<dyn FnMut() -> bool>;

/// Parallel driver hooks and cooperative stop state.
#[derive(Default)]
pub struct Parallel {
    thread_id: u32,
    report_unit: Option<ReportUnitCallback>,
    get_next_unit: Option<GetUnitCallback>,
    stop_now: Option<StopCallback>,
    /// Whether the next drain is the first one after (re)installing the hooks.
    drain_reinit: bool,
    /// Level 0 trail length already exported.
    exported_units: usize,
}

impl Parallel {
    /// Install the unit exchange hooks.
    pub fn set_parallel_data(
        &mut self,
        thread_id: u32,
        report_unit: ReportUnitCallback,
        get_next_unit: GetUnitCallback,
    ) {
        self.thread_id = thread_id;
        self.report_unit = Some(report_unit);
        self.get_next_unit = Some(get_next_unit);
        self.drain_reinit = true;
    }

    /// Install or replace the stop callback.
    pub fn set_stop_callback(&mut self, callback: Option<StopCallback>) {
        self.stop_now = callback;
    }

    /// Whether unit reporting is requested.
    pub fn reports_units(&self) -> bool {
        self.report_unit.is_some()
    }

    /// Poll the stop callback.
    pub fn stop_requested(&mut self) -> bool {
        match self.stop_now.as_mut() {
            Some(callback) => callback(),
            None => false,
        }
    }
}

/// Report all new level 0 assignments to the driver.
pub fn export_units(
    mut ctx: partial!(
        Context,
        mut ParallelP,
        AssignmentP,
        ImplGraphP,
        TrailP,
        VariablesP,
    ),
) {
    if !ctx.part(ParallelP).reports_units() {
        return;
    }

    let total = ctx.part(TrailP).top_level_assignment_count();
    let already = ctx.part(ParallelP).exported_units;
    if total <= already {
        return;
    }

    // Walk the level 0 prefix and report the tail that is new since the last export.
    let mut units = vec![];
    {
        let trail = ctx.part(TrailP);
        let graph = ctx.part(ImplGraphP);
        let mut cursor = trail.tail_var();
        while let Some(var) = cursor {
            cursor = trail.prev_var(var);
            if graph.level(var) != 0 {
                continue;
            }
            let value = ctx.part(AssignmentP).var_value(var).unwrap();
            if let Some(user_lit) = ctx.part(VariablesP).user_from_solver_lit(var.lit(!value)) {
                units.push(user_lit);
            }
            if units.len() + already >= total {
                break;
            }
        }
    }

    let parallel = ctx.part_mut(ParallelP);
    let thread_id = parallel.thread_id;
    if let Some(report) = parallel.report_unit.as_mut() {
        for lit in units.iter().rev() {
            report(thread_id, lit.to_dimacs());
        }
    }
    parallel.exported_units = total;
}

/// Import unit clauses produced by other solver instances.
///
/// Called after each restart with the trail at the assumption prefix. Imported units are
/// assigned at level 0; a contradicting import proves the formula unsatisfiable.
pub fn import_units(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut ParallelP,
        mut SolverStateP,
        mut StatsP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
    ),
) {
    if ctx.part(ParallelP).get_next_unit.is_none() {
        return;
    }

    loop {
        let thread_id = ctx.part(ParallelP).thread_id;
        let reinit = {
            let parallel = ctx.part_mut(ParallelP);
            std::mem::replace(&mut parallel.drain_reinit, false)
        };
        let number = match ctx.part_mut(ParallelP).get_next_unit.as_mut() {
            Some(get_next) => get_next(thread_id, reinit),
            None => 0,
        };
        if number == 0 {
            return;
        }

        let user_lit = Lit::from_dimacs(number);

        // Units over variables this instance has never seen constrain none of its clauses.
        let solver_lit = match ctx.part(VariablesP).solver_from_user_lit(user_lit) {
            Some(lit) if lit.index() < ctx.part(AssignmentP).assignment().len() => lit,
            _ => continue,
        };

        match ctx.part(AssignmentP).lit_value(solver_lit) {
            Some(true) => (),
            Some(false) => {
                if ctx.part(ImplGraphP).level(solver_lit.var()) == 0 {
                    ctx.part_mut(SolverStateP)
                        .set_unrecoverable(SolverStatus::Contradictory, "imported unit clause");
                    return;
                }
                // Falsified above level 0: undo the search prefix and import at the root.
                crate::prop::backtrack(ctx.borrow(), 0);
                enqueue_assignment(ctx.borrow(), solver_lit, Reason::Decision, 0);
                ctx.part_mut(StatsP).units_imported += 1;
            }
            None => {
                enqueue_assignment(ctx.borrow(), solver_lit, Reason::Decision, 0);
                ctx.part_mut(StatsP).units_imported += 1;
            }
        }
    }
}
