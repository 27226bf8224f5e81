//! The implication graph.
use kitesat_formula::{lit::LitIdx, Lit, Var};

use crate::clause::ClauseRef;

/// Assignment that caused a propagation.
///
/// A variable whose reason is `Decision` while its level is positive is a decision or an
/// assumption; at level 0 the same encoding marks a unit-implied variable.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Reason {
    /// No stored parent: a decision, an assumption or a level 0 unit.
    Decision,
    /// Implied by a binary clause whose other literal is the stored one.
    Binary([Lit; 1]),
    /// Implied by a long clause, which keeps the propagated literal in position 0.
    Long(ClauseRef),
}

impl Reason {
    /// Whether this is a parentless assignment.
    pub fn is_decision(&self) -> bool {
        matches!(self, Reason::Decision)
    }
}

/// Propagation that resulted in a conflict.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Conflict {
    Binary([Lit; 2]),
    Long(ClauseRef),
}

/// Node and incoming edges of the implication graph.
#[derive(Copy, Clone)]
pub struct ImplNode {
    pub reason: Reason,
    pub level: LitIdx,
}

/// The implication graph.
///
/// This is a DAG with all assigned variables as nodes. Unit clauses, assumptions and decisions
/// are its sources. For each propagated assignment there are incoming edges from the variables
/// whose assignment caused the propagation.
#[derive(Default)]
pub struct ImplGraph {
    /// Contains only valid data for indices of assigned variables.
    pub nodes: Vec<ImplNode>,
}

impl ImplGraph {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.nodes.resize(
            count,
            ImplNode {
                reason: Reason::Decision,
                level: 0,
            },
        );
    }

    /// Get the reason for an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn reason(&self, var: Var) -> &Reason {
        &self.nodes[var.index()].reason
    }

    /// Get the decision level of an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn level(&self, var: Var) -> usize {
        self.nodes[var.index()].level as usize
    }

    /// Update the reason and level of an assigned variable.
    pub fn update_node(&mut self, var: Var, reason: Reason, level: usize) {
        let node = &mut self.nodes[var.index()];
        node.reason = reason;
        node.level = level as LitIdx;
    }

    /// Update the reason for an assigned variable.
    ///
    /// Make sure the reason vars are in front of the assigned variable in the trail.
    pub fn update_reason(&mut self, var: Var, reason: Reason) {
        self.nodes[var.index()].reason = reason
    }
}
