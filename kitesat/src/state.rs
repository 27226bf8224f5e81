//! Solver status tracking.
use serde::{Deserialize, Serialize};

/// Internal status of the solver.
///
/// The variants starting with [`SolverStatus::Contradictory`] are unrecoverable: once entered,
/// the solver stays in that status forever and every operation becomes a no-op. The variants
/// after `Contradictory` additionally indicate a permanent error.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum SolverStatus {
    /// No result known for the current formula and assumptions.
    Undecided,
    /// The last query returned a model and no clause added since contradicts it.
    Sat,
    /// The last query was unsatisfiable, possibly only under its assumptions.
    Unsat,
    /// The last query was interrupted.
    UserInterrupt,
    /// The formula itself is unsatisfiable, an empty clause was added or derived.
    Contradictory,
    /// An allocation failed.
    AllocFailed,
    /// A buffer offset no longer fits the clause reference type.
    IndexTooNarrow,
    /// A parameter name or value was rejected.
    ParamError,
    /// An unsat-core query was made in an invalid state.
    AssumptionRequiredError,
    /// The global time budget is exhausted.
    GlobalTimeout,
    /// Writing the DRAT proof failed.
    DratFileProblem,
    /// An explicit-storage-only operation was invoked in compressed mode.
    CompressedMismatch,
    /// Any other unexpected internal error.
    ExoticError,
}

impl Default for SolverStatus {
    fn default() -> SolverStatus {
        SolverStatus::Undecided
    }
}

impl SolverStatus {
    /// Whether this status persists across all future operations.
    pub fn is_unrecoverable(self) -> bool {
        match self {
            SolverStatus::Undecided
            | SolverStatus::Sat
            | SolverStatus::Unsat
            | SolverStatus::UserInterrupt => false,
            _ => true,
        }
    }

    /// Whether this status indicates a permanent error.
    pub fn is_error(self) -> bool {
        self.is_unrecoverable() && self != SolverStatus::Contradictory
    }
}

/// Outcome of a [`solve`](crate::solver::Solver::solve) invocation.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum SolveResult {
    Sat,
    Unsat,
    /// The per-query wall/cpu time budget was exhausted.
    TimeoutLocal,
    /// The per-query conflict budget was exhausted.
    ConflictOut,
    MemOut,
    UserInterrupt,
    IndexTooNarrow,
    ParamError,
    AssumptionRequiredError,
    /// The global time budget was exhausted; the solver is unusable afterwards.
    TimeoutGlobal,
    DratFileProblem,
    ExoticError,
}

/// Value of a literal under the current model.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum LitValue {
    Satisfied,
    Unsatisfied,
    Unassigned,
    /// The literal's variable was never seen by the solver, any value satisfies the formula.
    DontCare,
}

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state variables should be moved into a
/// separate part of [`Context`](crate::context::Context).
#[derive(Default)]
pub struct SolverState {
    pub status: SolverStatus,
    /// Free-form diagnostic for the current status.
    ///
    /// Mandatory and non-empty whenever `status.is_error()` holds.
    pub explanation: String,
    /// Set while the user requested an interrupt that was not yet delivered.
    pub interrupt_requested: bool,
}

impl SolverState {
    /// Enter an unrecoverable status unless one is already set.
    pub fn set_unrecoverable(&mut self, status: SolverStatus, explanation: &str) {
        debug_assert!(status.is_unrecoverable());
        if !self.status.is_unrecoverable() {
            self.status = status;
            self.explanation = explanation.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecoverable_is_sticky() {
        let mut state = SolverState::default();
        state.set_unrecoverable(SolverStatus::ParamError, "bad value");
        state.set_unrecoverable(SolverStatus::GlobalTimeout, "too slow");
        assert_eq!(state.status, SolverStatus::ParamError);
        assert_eq!(state.explanation, "bad value");
        assert!(state.status.is_error());
    }

    #[test]
    fn contradictory_is_not_an_error() {
        assert!(SolverStatus::Contradictory.is_unrecoverable());
        assert!(!SolverStatus::Contradictory.is_error());
        assert!(!SolverStatus::Sat.is_unrecoverable());
    }
}
