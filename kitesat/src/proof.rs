//! Proof emission.
//!
//! Every learnt clause and every clause deletion can be emitted as a DRAT step, written in
//! user literals. Independently, a host callback can observe every learnt clause; its return
//! value may request a stop, which surfaces as a user interrupt.
use std::io::Write;

use partial_ref::{partial, PartialRef};

use kitesat_formula::Lit;

use crate::context::{Context, ProofP, SolverStateP, VariablesP};
use crate::state::SolverStatus;

pub mod drat;

/// Host callback observing learnt clauses; returning `true` requests a stop.
pub type LearntClauseCallback = Box<dyn FnMut(&[Lit]) -> bool>;

/// Proof emission state.
#[derive(Default)]
pub struct Proof {
    /// Target for DRAT steps, absent when no proof was requested.
    drat_writer: Option<Box<dyn Write>>,
    /// Whether to use the binary DRAT encoding.
    binary: bool,
    /// Whether to sort each emitted clause by user variable.
    sort_clauses: bool,
    /// Host callback for learnt clauses.
    learnt_cb: Option<LearntClauseCallback>,
    /// Scratch buffer holding the user literal image of a clause.
    buf: Vec<Lit>,
}

impl Proof {
    /// Start emitting DRAT steps to the given writer.
    pub fn dump_drat(&mut self, target: Box<dyn Write>, binary: bool, sort_clauses: bool) {
        self.drat_writer = Some(target);
        self.binary = binary;
        self.sort_clauses = sort_clauses;
    }

    /// Install or replace the learnt clause callback.
    pub fn set_learnt_callback(&mut self, callback: Option<LearntClauseCallback>) {
        self.learnt_cb = callback;
    }

    /// Whether any proof consumer is attached.
    pub fn is_active(&self) -> bool {
        self.drat_writer.is_some() || self.learnt_cb.is_some()
    }
}

/// Emit a learnt clause.
pub fn add_clause_step(
    mut ctx: partial!(Context, mut ProofP, mut SolverStateP, VariablesP),
    lits: &[Lit],
) {
    if !ctx.part(ProofP).is_active() {
        return;
    }

    map_into_buf(ctx.borrow(), lits);

    let (proof, mut ctx) = ctx.split_part_mut(ProofP);

    if let Some(callback) = proof.learnt_cb.as_mut() {
        if callback(&proof.buf) {
            ctx.part_mut(SolverStateP).interrupt_requested = true;
        }
    }

    if let Some(target) = proof.drat_writer.as_mut() {
        let result = if proof.binary {
            drat::write_binary_step(target, true, &proof.buf)
        } else {
            drat::write_step(target, true, &proof.buf)
        };
        if result.is_err() {
            ctx.part_mut(SolverStateP)
                .set_unrecoverable(SolverStatus::DratFileProblem, "writing DRAT step failed");
        }
    }
}

/// Emit a clause deletion.
pub fn delete_clause_step(
    mut ctx: partial!(Context, mut ProofP, mut SolverStateP, VariablesP),
    lits: &[Lit],
) {
    if ctx.part(ProofP).drat_writer.is_none() {
        return;
    }

    map_into_buf(ctx.borrow(), lits);

    let (proof, mut ctx) = ctx.split_part_mut(ProofP);
    let target = proof.drat_writer.as_mut().unwrap();

    let result = if proof.binary {
        drat::write_binary_step(target, false, &proof.buf)
    } else {
        drat::write_step(target, false, &proof.buf)
    };
    if result.is_err() {
        ctx.part_mut(SolverStateP)
            .set_unrecoverable(SolverStatus::DratFileProblem, "writing DRAT step failed");
    }
}

/// Flush the DRAT writer, reporting failures as a status change.
pub fn flush(mut ctx: partial!(Context, mut ProofP, mut SolverStateP)) {
    let (proof, mut ctx) = ctx.split_part_mut(ProofP);
    if let Some(target) = proof.drat_writer.as_mut() {
        if target.flush().is_err() {
            ctx.part_mut(SolverStateP)
                .set_unrecoverable(SolverStatus::DratFileProblem, "flushing DRAT file failed");
        }
    }
}

/// Translate a solver clause into user literals in the proof's scratch buffer.
fn map_into_buf(mut ctx: partial!(Context, mut ProofP, VariablesP), lits: &[Lit]) {
    let (proof, ctx) = ctx.split_part_mut(ProofP);
    let variables = ctx.part(VariablesP);

    proof.buf.clear();
    for &lit in lits {
        let user_lit = variables
            .user_from_solver_lit(lit)
            .expect("clause literal without user image");
        proof.buf.push(user_lit);
    }

    if proof.sort_clauses {
        proof.buf.sort_unstable_by_key(|lit| lit.index());
    }
}
