//! Incremental satisfiability solver.
use std::io::Write;
use std::time::{Duration, Instant};

use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use kitesat_formula::{CnfFormula, Lit, Var};

use crate::context::{
    config_changed, ensure_var_count, parts::*, Context,
};
use crate::clause::ClauseStore;
use crate::incremental;
use crate::load::load_clause;
use crate::proof::LearntClauseCallback;
use crate::prop;
use crate::schedule::{search, status_result};
use crate::state::{LitValue, SolveResult, SolverStatus};
use crate::variables::UserPolarity;

/// An incremental boolean satisfiability solver.
///
/// All literals and variables on this interface are user literals; the solver maintains its
/// own internal numbering.
#[derive(Default)]
pub struct Solver {
    ctx: Box<Context>,
}

impl Solver {
    /// Create a new solver.
    ///
    /// Configuration is loaded from the file named by the
    /// [`KITESAT_CONFIG`](crate::config::CONFIG_FILE_ENV) environment variable, if set.
    pub fn new() -> Solver {
        let mut solver = Solver::default();
        {
            let mut ctx = solver.ctx.into_partial_ref_mut();
            let env_result = ctx.part_mut(SolverConfigP).load_env_config();
            if let Err(err) = env_result {
                ctx.part_mut(SolverStateP)
                    .set_unrecoverable(SolverStatus::ParamError, &format!("{:#}", err));
            }
            let compress = ctx.part(SolverConfigP).compress;
            if compress {
                *ctx.part_mut(ClauseStoreP) = ClauseStore::new(true);
            }
            config_changed(ctx.borrow());
        }
        solver
    }

    /// Create a new solver, pre-sizing the variable indexed structures.
    ///
    /// The hint is not required to be accurate, allocations grow on demand either way.
    pub fn with_var_hint(var_hint: usize) -> Solver {
        let mut solver = Solver::new();
        {
            let mut ctx = solver.ctx.into_partial_ref_mut();
            crate::context::set_var_count(ctx.borrow(), var_hint);
        }
        solver
    }

    /// Whether the solver entered a state every operation must treat as final.
    fn is_unusable(&self) -> bool {
        self.ctx.solver_state.status.is_unrecoverable()
    }

    /// Map user literals to solver literals, creating solver variables as needed.
    fn map_user_lits(&mut self, lits: &[Lit], target: &mut Vec<Lit>) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let before = ctx.part(VariablesP).solver_watermark();

        target.clear();
        for &lit in lits {
            target.push(ctx.part_mut(VariablesP).map_user_lit(lit));
        }

        ensure_var_count(ctx.borrow());
        let after = ctx.part(VariablesP).solver_watermark();
        for index in before..after {
            ctx.part_mut(VsidsP).make_available(Var::from_index(index));
        }
    }

    /// Add a clause over user literals to the formula.
    pub fn add_clause(&mut self, lits: &[Lit]) {
        if self.is_unusable() {
            return;
        }
        let mut mapped = vec![];
        self.map_user_lits(lits, &mut mapped);

        let mut ctx = self.ctx.into_partial_ref_mut();
        load_clause(ctx.borrow(), &mapped);
    }

    /// Add a clause given as plain integers in the DIMACS encoding.
    ///
    /// Reading stops at the first 0, so clauses may optionally be 0-terminated.
    pub fn add_clause_ints(&mut self, lits: &[i32]) {
        let lits: Vec<Lit> = lits
            .iter()
            .take_while(|&&number| number != 0)
            .map(|&number| Lit::from_dimacs(number as isize))
            .collect();
        self.add_clause(&lits);
    }

    /// Add a formula to the solver.
    pub fn add_formula(&mut self, formula: &CnfFormula) {
        for clause in formula.iter() {
            self.add_clause(clause);
        }
    }

    /// Check satisfiability of the formula without assumptions.
    pub fn solve(&mut self) -> SolveResult {
        self.solve_with(&[], None, None)
    }

    /// Check satisfiability of the formula under the given assumptions.
    ///
    /// `timeout` carries the budget in seconds and whether it was requested as cpu time; both
    /// variants are measured against the wall clock. `conflict_budget` bounds the conflicts
    /// spent on this query.
    pub fn solve_with(
        &mut self,
        assumptions: &[Lit],
        timeout: Option<(f64, bool)>,
        conflict_budget: Option<u64>,
    ) -> SolveResult {
        if self.is_unusable() {
            return status_result(self.ctx.solver_state.status);
        }

        let mut mapped = vec![];
        self.map_user_lits(assumptions, &mut mapped);

        let mut ctx = self.ctx.into_partial_ref_mut();

        {
            let stats = ctx.part_mut(StatsP);
            stats.solves += 1;
            stats.conflicts_at_query_start = stats.conflicts;
        }

        // Classify the query for the per-phase restart strategy.
        {
            use crate::restart::QueryPhase;
            let phase = if ctx.part(StatsP).solves == 1 {
                QueryPhase::Initial
            } else if ctx.part(ScheduleP).last_query_conflicts
                <= ctx.part(SolverConfigP).short_query_conflicts
            {
                QueryPhase::ShortIncremental
            } else {
                QueryPhase::NormalIncremental
            };
            ctx.part_mut(RestartP).query_phase = phase;
        }

        // Arm the budgets.
        {
            let now = Instant::now();
            let global_timeout = ctx.part(SolverConfigP).global_timeout;
            let schedule = ctx.part_mut(ScheduleP);

            schedule.conflict_budget = conflict_budget;
            schedule.query_deadline = None;
            if let Some((seconds, is_cpu)) = timeout {
                schedule.deadline_is_cpu = is_cpu;
                if seconds.is_finite() && seconds >= 0.0 {
                    schedule.query_deadline = Some(now + Duration::from_secs_f64(seconds));
                }
            }
            if schedule.global_deadline.is_none() && global_timeout.is_finite() {
                schedule.global_deadline = Some(now + Duration::from_secs_f64(global_timeout));
            }
        }

        ctx.part_mut(SolverStateP).status = SolverStatus::Undecided;

        let reuse = ctx.part(SolverConfigP).assumptions_reuse_trail;
        incremental::set_assumptions(ctx.borrow(), assumptions.to_vec(), mapped, reuse);

        let result = search(ctx.borrow());

        let query_conflicts = ctx.part(StatsP).query_conflicts();
        ctx.part_mut(ScheduleP).last_query_conflicts = query_conflicts;

        crate::proof::flush(ctx.borrow());

        result
    }

    /// Value of a user literal under the current model.
    pub fn get_lit_value(&self, lit: Lit) -> LitValue {
        let ctx = self.ctx.into_partial_ref();

        match ctx.part(VariablesP).solver_from_user_lit(lit) {
            None => LitValue::DontCare,
            Some(solver_lit) => {
                if solver_lit.index() >= ctx.part(AssignmentP).assignment().len() {
                    return LitValue::Unassigned;
                }
                match ctx.part(AssignmentP).lit_value(solver_lit) {
                    Some(true) => LitValue::Satisfied,
                    Some(false) => LitValue::Unsatisfied,
                    None => LitValue::Unassigned,
                }
            }
        }
    }

    /// The whole model, indexed by 0-based user variable index.
    pub fn get_model(&self) -> Vec<LitValue> {
        let user_watermark = {
            let ctx = self.ctx.into_partial_ref();
            ctx.part(VariablesP).user_watermark()
        };
        (0..user_watermark)
            .map(|index| self.get_lit_value(Var::from_index(index).positive()))
            .collect()
    }

    /// Whether the i-th assumption of the latest query is required for its unsat answer.
    ///
    /// Only valid immediately after a [`solve_with`](Solver::solve_with) invocation returning
    /// [`SolveResult::Unsat`]; any other use puts the solver into a permanent error state.
    pub fn is_assumption_required(&mut self, index: usize) -> bool {
        let mut ctx = self.ctx.into_partial_ref_mut();

        if ctx.part(SolverStateP).status != SolverStatus::Unsat
            || !ctx.part(IncrementalP).core_valid()
        {
            ctx.part_mut(SolverStateP).set_unrecoverable(
                SolverStatus::AssumptionRequiredError,
                "unsat core queried without a preceding unsat answer",
            );
            return false;
        }

        match ctx.part(IncrementalP).assumption_required(index) {
            Some(required) => required,
            None => {
                ctx.part_mut(SolverStateP).set_unrecoverable(
                    SolverStatus::AssumptionRequiredError,
                    "unsat core queried with an out of range assumption index",
                );
                false
            }
        }
    }

    /// Bump the branching score of a user variable by a multiple of the current increment.
    pub fn boost_score(&mut self, var: Var, multiplier: f64) {
        if self.is_unusable() {
            return;
        }
        let mut mapped = vec![];
        self.map_user_lits(&[var.positive()], &mut mapped);

        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(VsidsP).boost(mapped[0].var(), multiplier);
        if ctx.part_mut(VsidsP).take_rescaled() {
            ctx.part_mut(TrailP).rescale_scores(1e-100);
        }
    }

    /// Fix the branching polarity of `lit`'s variable to `lit`.
    ///
    /// With `once` the polarity applies to a single decision, otherwise it sticks until
    /// [`clear_user_polarity`](Solver::clear_user_polarity).
    pub fn fix_polarity(&mut self, lit: Lit, once: bool) {
        if self.is_unusable() {
            return;
        }
        let mut mapped = vec![];
        self.map_user_lits(&[lit], &mut mapped);

        let polarity = if once {
            UserPolarity::Once(mapped[0].is_negative())
        } else {
            UserPolarity::Sticky(mapped[0].is_negative())
        };

        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(VariablesP)
            .set_user_polarity(mapped[0].var(), polarity);
    }

    /// Remove any user provided polarity of a user variable.
    pub fn clear_user_polarity(&mut self, var: Var) {
        if self.is_unusable() {
            return;
        }
        let mut mapped = vec![];
        self.map_user_lits(&[var.positive()], &mut mapped);

        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(VariablesP)
            .set_user_polarity(mapped[0].var(), UserPolarity::Free);
    }

    /// Create the solver variable for a user literal without adding any clause.
    pub fn create_internal_lit(&mut self, lit: Lit) {
        if self.is_unusable() {
            return;
        }
        let mut mapped = vec![];
        self.map_user_lits(&[lit], &mut mapped);
    }

    /// Backtrack to the given decision level.
    pub fn backtrack(&mut self, level: usize) {
        if self.is_unusable() {
            return;
        }
        let mut ctx = self.ctx.into_partial_ref_mut();
        prop::backtrack(ctx.borrow(), level);
    }

    /// Set a configuration parameter by its dotted name.
    ///
    /// An unknown name or a value outside the legal range puts the solver into a permanent
    /// error state.
    pub fn set_param(&mut self, name: &str, value: f64) {
        let mut ctx = self.ctx.into_partial_ref_mut();

        if ctx.part(SolverStateP).status.is_unrecoverable() {
            return;
        }

        if name == "/store/compress" {
            // The storage backend is fixed once clauses exist.
            let has_clauses = ctx.part(ClauseDbP).count() != 0;
            let requested = value != 0.0;
            if has_clauses && requested != ctx.part(ClauseStoreP).is_compressed() {
                ctx.part_mut(SolverStateP).set_unrecoverable(
                    SolverStatus::CompressedMismatch,
                    "cannot switch clause storage backends with stored clauses",
                );
                return;
            }
            if !has_clauses {
                *ctx.part_mut(ClauseStoreP) = ClauseStore::new(requested);
            }
        }

        let result = ctx.part_mut(SolverConfigP).set_param(name, value);
        match result {
            Ok(()) => {
                config_changed(ctx.borrow());
                let (restart, ctx) = ctx.split_part_mut(RestartP);
                restart.configure(ctx.part(SolverConfigP));
            }
            Err(err) => {
                ctx.part_mut(SolverStateP)
                    .set_unrecoverable(SolverStatus::ParamError, &err.to_string());
            }
        }
    }

    /// Install a callback polled between conflicts; returning `true` stops the query.
    pub fn set_cb_stop_now(&mut self, callback: impl FnMut() -> bool + 'static) {
        self.ctx
            .parallel
            .set_stop_callback(Some(Box::new(callback)));
    }

    /// Install a callback observing every learnt clause in user literals.
    ///
    /// Returning `true` stops the query like a stop callback.
    pub fn set_cb_new_learnt_cls(&mut self, callback: impl FnMut(&[Lit]) -> bool + 'static) {
        let boxed: LearntClauseCallback = Box::new(callback);
        self.ctx.proof.set_learnt_callback(Some(boxed));
    }

    /// Request a cooperative interrupt of the running or next query.
    pub fn interrupt_now(&mut self) {
        self.ctx.solver_state.interrupt_requested = true;
    }

    /// Emit all learnt clauses and deletions as a DRAT proof to the given writer.
    pub fn dump_drat(&mut self, target: impl Write + 'static, binary: bool, sort: bool) {
        self.ctx.proof.dump_drat(Box::new(target), binary, sort);
    }

    /// Install the unit clause exchange hooks of an outer parallel driver.
    pub fn set_parallel_data(
        &mut self,
        thread_id: u32,
        report_unit: impl FnMut(u32, isize) + 'static,
        get_next_unit: impl FnMut(u32, bool) -> isize + 'static,
    ) {
        self.ctx.parallel.set_parallel_data(
            thread_id,
            Box::new(report_unit),
            Box::new(get_next_unit),
        );
    }

    /// Whether the solver is in a permanent error state.
    pub fn is_error(&self) -> bool {
        self.ctx.solver_state.status.is_error()
    }

    /// The current internal status.
    pub fn status(&self) -> SolverStatus {
        self.ctx.solver_state.status
    }

    /// Diagnostic text for the current status, non-empty whenever `is_error` holds.
    pub fn status_explanation(&self) -> &str {
        &self.ctx.solver_state.explanation
    }

    /// Decision level of an assigned user literal.
    pub fn get_lit_dec_level(&self, lit: Lit) -> Option<usize> {
        let ctx = self.ctx.into_partial_ref();
        let solver_lit = ctx.part(VariablesP).solver_from_user_lit(lit)?;
        if solver_lit.index() >= ctx.part(AssignmentP).assignment().len()
            || ctx.part(AssignmentP).lit_value(solver_lit).is_none()
        {
            return None;
        }
        Some(ctx.part(ImplGraphP).level(solver_lit.var()))
    }

    /// Largest user variable seen so far, if any.
    pub fn get_max_user_var(&self) -> Option<Var> {
        let count = self.ctx.variables.user_watermark();
        if count == 0 {
            None
        } else {
            Some(Var::from_index(count - 1))
        }
    }

    /// Number of active solver variables.
    pub fn get_max_internal_var(&self) -> usize {
        self.ctx.variables.solver_watermark()
    }

    /// Number of `solve` invocations so far.
    pub fn get_solve_invocations(&self) -> u64 {
        self.ctx.stats.solves
    }

    /// Number of conflicts so far.
    pub fn get_conflicts_number(&self) -> u64 {
        self.ctx.stats.conflicts
    }

    /// Number of propagated implications so far.
    pub fn get_propagations(&self) -> u64 {
        self.ctx.stats.propagations
    }

    /// Number of backtracks so far.
    pub fn get_backtracks(&self) -> u64 {
        self.ctx.stats.backtracks
    }

    /// Decision levels saved by reusing the trail across assumption queries.
    pub fn get_assump_reuse_levels_saved(&self) -> u64 {
        self.ctx.stats.assump_reuse_levels_saved
    }

    /// Number of active clauses, binary and long, initial and learnt.
    pub fn get_active_clauses(&self) -> u64 {
        (self.ctx.clause_db.count() + self.ctx.binary_clauses.count()) as u64
    }

    /// Number of active long learnt clauses.
    pub fn get_active_long_learnt_clauses(&self) -> u64 {
        self.ctx.clause_db.count_learnt() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use kitesat_formula::test::{sat_formula, sgen_unsat_formula};

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), SolveResult::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), SolveResult::Sat);

            for clause in formula.iter() {
                prop_assert!(clause
                    .iter()
                    .any(|&lit| solver.get_lit_value(lit) == LitValue::Satisfied));
            }
        }

        #[test]
        fn sgen_unsat_incremental_clauses(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            let mut last_state = SolveResult::Sat;

            for clause in formula.iter() {
                solver.add_clause(clause);

                let state = solver.solve();
                if state != last_state {
                    prop_assert_eq!(state, SolveResult::Unsat);
                    prop_assert_eq!(last_state, SolveResult::Sat);
                    last_state = state;
                }
            }

            prop_assert_eq!(last_state, SolveResult::Unsat);
        }

        #[test]
        fn sat_compressed_storage(
            formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)
        ) {
            let mut solver = Solver::new();
            solver.set_param("/store/compress", 1.0);

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), SolveResult::Sat);

            for clause in formula.iter() {
                prop_assert!(clause
                    .iter()
                    .any(|&lit| solver.get_lit_value(lit) == LitValue::Satisfied));
            }
        }
    }
}
