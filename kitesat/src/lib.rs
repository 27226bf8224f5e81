//! Kitesat is an incremental CDCL based SAT solver.
//!
//! The solver decides satisfiability of a conjunction of clauses under optional assumption
//! literals. Between queries it accepts additional clauses and new assumption sets and it can
//! extract an unsat core over the assumptions of an unsatisfiable query.
pub mod config;
pub mod solver;
pub mod state;

mod analyze;
mod backtrack;
mod binary;
mod cdcl;
mod clause;
mod context;
mod decision;
mod glue;
mod incremental;
mod load;
mod parallel;
mod proof;
mod prop;
mod restart;
mod schedule;
mod simplify;
mod stats;
mod tmp;
mod variables;

pub use kitesat_formula::{cnf, lit, CnfFormula, Lit, Var};

pub use config::{ParamError, SolverConfig};
pub use solver::Solver;
pub use state::{LitValue, SolveResult, SolverStatus};
