//! Assignment trail and backtracking.
//!
//! The trail is a doubly-linked order over the assigned variables, not an array of slots. With
//! chronological backtracking and delayed implication repair, assignments are inserted at the
//! trail position of their decision level, which keeps decision levels monotonically
//! non-decreasing along the trail. Linking allows those mid-trail insertions and removals
//! without moving other entries.
//!
//! A sibling array `last_at_level` names the trail-latest variable of every decision level, with
//! a sentinel for levels that are currently empty. Such collapsed levels appear when all
//! assignments of a level are re-implied at lower levels.
use partial_ref::{partial, PartialRef};

use kitesat_formula::{lit::LitIdx, Lit, Var};

use crate::context::{
    AssignmentP, Context, ImplGraphP, IncrementalP, StatsP, TrailP, VsidsP,
};
use crate::decision::make_available;

use super::graph::Reason;

const NO_VAR: LitIdx = !0;

/// Decision and propagation history.
pub struct Trail {
    /// Trail successor per variable.
    next: Vec<LitIdx>,
    /// Trail predecessor per variable.
    prev: Vec<LitIdx>,
    /// First assigned variable.
    head: LitIdx,
    /// Most recently assigned variable of the highest populated level.
    tail: LitIdx,
    /// Number of variables on the trail.
    len: usize,
    /// Trail-latest variable per decision level, `NO_VAR` for collapsed levels.
    last_at_level: Vec<LitIdx>,
    /// The literal that opened each decision level; entry 0 is unused.
    decision_at_level: Vec<Lit>,
    /// Highest branching score among the variables assigned per level.
    best_score_at_level: Vec<f64>,
    /// Assignments not yet processed by propagation.
    queue: Vec<Lit>,
    /// Next queue entry to propagate.
    queue_head: usize,
    /// Number of level 0 assignments dropped from the trail by simplification.
    units_removed: usize,
}

impl Default for Trail {
    fn default() -> Trail {
        Trail {
            next: vec![],
            prev: vec![],
            head: NO_VAR,
            tail: NO_VAR,
            len: 0,
            last_at_level: vec![NO_VAR],
            decision_at_level: vec![Lit::from_code(0)],
            best_score_at_level: vec![0.0],
            queue: vec![],
            queue_head: 0,
            units_removed: 0,
        }
    }
}

impl Trail {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.next.resize(count, NO_VAR);
        self.prev.resize(count, NO_VAR);
    }

    /// Current decision level.
    pub fn current_level(&self) -> usize {
        self.last_at_level.len() - 1
    }

    /// Start a new decision level.
    ///
    /// Does not enqueue the decision itself.
    pub fn new_decision_level(&mut self) {
        self.last_at_level.push(NO_VAR);
        self.decision_at_level.push(Lit::from_code(0));
        self.best_score_at_level.push(0.0);
    }

    /// The literal that opened the given decision level.
    ///
    /// Only valid for populated levels greater than 0.
    pub fn decision_at_level(&self, level: usize) -> Lit {
        self.decision_at_level[level]
    }

    /// Number of variables on the trail.
    pub fn len(&self) -> usize {
        self.len
    }

    /// The most recently assigned variable, if any.
    pub fn tail_var(&self) -> Option<Var> {
        if self.tail == NO_VAR {
            None
        } else {
            Some(Var::from_index(self.tail as usize))
        }
    }

    /// The trail predecessor of an assigned variable.
    pub fn prev_var(&self, var: Var) -> Option<Var> {
        let prev = self.prev[var.index()];
        if prev == NO_VAR {
            None
        } else {
            Some(Var::from_index(prev as usize))
        }
    }

    /// The trail-latest variable of the given level, unless the level is collapsed.
    pub fn last_var_at_level(&self, level: usize) -> Option<Var> {
        let var = self.last_at_level[level];
        if var == NO_VAR {
            None
        } else {
            Some(Var::from_index(var as usize))
        }
    }

    /// Number of level 0 assignments made so far, including removed ones.
    pub fn top_level_assignment_count(&self) -> usize {
        // Level 0 is the trail prefix ending at its per-level tail pointer.
        let prefix = match self.last_at_level[0] {
            NO_VAR => 0,
            last => {
                let mut prefix = 0;
                let mut cursor = self.head;
                loop {
                    prefix += 1;
                    if cursor == last {
                        break;
                    }
                    cursor = self.next[cursor as usize];
                }
                prefix
            }
        };
        self.units_removed + prefix
    }

    /// Splice a variable into the trail as the latest assignment of the given level.
    pub fn append_var(&mut self, var: Var, level: usize) {
        let idx = var.index() as LitIdx;

        debug_assert!(self.prev[var.index()] == NO_VAR && self.next[var.index()] == NO_VAR);
        debug_assert!(level < self.last_at_level.len());

        // The insertion point is the latest variable of the nearest populated level at or below
        // the target level; inserting right after it keeps the trail level-sorted.
        let after = self.last_at_level[..=level]
            .iter()
            .rev()
            .cloned()
            .find(|&entry| entry != NO_VAR);

        match after {
            None => {
                // New first entry.
                self.next[var.index()] = self.head;
                if self.head != NO_VAR {
                    self.prev[self.head as usize] = idx;
                } else {
                    self.tail = idx;
                }
                self.head = idx;
            }
            Some(after) => {
                let after_next = self.next[after as usize];
                self.next[var.index()] = after_next;
                self.prev[var.index()] = after;
                self.next[after as usize] = idx;
                if after_next != NO_VAR {
                    self.prev[after_next as usize] = idx;
                } else {
                    self.tail = idx;
                }
            }
        }

        self.last_at_level[level] = idx;
        self.len += 1;
    }

    /// Unsplice a variable from the trail.
    ///
    /// `level` is the variable's decision level and `prev_is_same_level` tells whether its
    /// trail predecessor belongs to the same level, which is needed to maintain the per-level
    /// tail pointers.
    pub fn remove_var(&mut self, var: Var, level: usize, prev_is_same_level: bool) {
        let idx = var.index() as LitIdx;
        let prev = self.prev[var.index()];
        let next = self.next[var.index()];

        if self.last_at_level[level] == idx {
            self.last_at_level[level] = if prev_is_same_level { prev } else { NO_VAR };
        }

        if prev != NO_VAR {
            self.next[prev as usize] = next;
        } else {
            self.head = next;
        }
        if next != NO_VAR {
            self.prev[next as usize] = prev;
        } else {
            self.tail = prev;
        }

        self.prev[var.index()] = NO_VAR;
        self.next[var.index()] = NO_VAR;
        self.len -= 1;
    }

    /// Drop all trail entries.
    ///
    /// Can only be called with no active decisions; used after simplification has processed
    /// the level 0 prefix.
    pub fn clear_top_level(&mut self) {
        debug_assert_eq!(self.current_level(), 0);
        let mut cursor = self.head;
        while cursor != NO_VAR {
            let next = self.next[cursor as usize];
            self.prev[cursor as usize] = NO_VAR;
            self.next[cursor as usize] = NO_VAR;
            cursor = next;
        }
        self.units_removed += self.len;
        self.head = NO_VAR;
        self.tail = NO_VAR;
        self.len = 0;
        self.last_at_level[0] = NO_VAR;
        self.queue.clear();
        self.queue_head = 0;
    }

    /// Record the branching score of a variable assigned at the given level.
    pub fn note_score(&mut self, level: usize, score: f64) {
        let best = &mut self.best_score_at_level[level];
        if score > *best {
            *best = score;
        }
    }

    /// Scale all cached branching scores, as done when the activities rescale.
    pub fn rescale_scores(&mut self, factor: f64) {
        for score in self.best_score_at_level.iter_mut() {
            *score *= factor;
        }
    }

    /// The level with the highest recorded branching score in `lo..hi`.
    pub fn best_scored_level(&self, lo: usize, hi: usize) -> usize {
        let mut best_level = lo;
        let mut best_score = std::f64::NEG_INFINITY;
        for level in lo..hi {
            let score = self.best_score_at_level[level];
            if score > best_score {
                best_score = score;
                best_level = level;
            }
        }
        best_level
    }

    /// Append an assignment to the propagation queue.
    pub fn enqueue_lit(&mut self, lit: Lit) {
        self.queue.push(lit);
    }

    /// Return the next assignment to propagate and remove it from the queue.
    pub fn pop_queue(&mut self) -> Option<Lit> {
        if self.queue_head < self.queue.len() {
            let lit = self.queue[self.queue_head];
            self.queue_head += 1;
            Some(lit)
        } else {
            self.queue.clear();
            self.queue_head = 0;
            None
        }
    }

    /// Whether all enqueued assignments are processed.
    pub fn fully_propagated(&self) -> bool {
        self.queue_head == self.queue.len()
    }

    /// Truncate the per-level bookkeeping to the given level.
    fn truncate_levels(&mut self, level: usize) {
        self.last_at_level.truncate(level + 1);
        self.decision_at_level.truncate(level + 1);
        self.best_score_at_level.truncate(level + 1);
    }
}

/// Enqueue the assignment of true to a literal.
///
/// This updates the assignment, trail and implication graph and schedules the literal for
/// propagation. The literal has to be unassigned when calling this.
pub fn enqueue_assignment(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TrailP,
        VsidsP
    ),
    lit: Lit,
    reason: Reason,
    level: usize,
) {
    let assignment = ctx.part_mut(AssignmentP);
    debug_assert!(assignment.lit_value(lit) == None);

    assignment.assign_lit(lit);

    ctx.part_mut(ImplGraphP).update_node(lit.var(), reason, level);

    let score = ctx.part(VsidsP).score(lit.var());
    let trail = ctx.part_mut(TrailP);
    if level > 0 && level == trail.current_level() && trail.last_var_at_level(level).is_none() {
        trail.decision_at_level[level] = lit;
    }
    trail.append_var(lit.var(), level);
    trail.note_score(level, score);
    trail.enqueue_lit(lit);
}

/// Undo all assignments in decision levels deeper than the given level.
pub fn backtrack(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut TrailP,
        mut VsidsP,
        ImplGraphP
    ),
    level: usize,
) {
    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    if level >= trail.current_level() {
        return;
    }

    // Levels are monotone along the trail, so everything to unassign is a trail suffix.
    while let Some(var) = trail.tail_var() {
        let var_level = ctx.part(ImplGraphP).level(var);
        if var_level <= level {
            break;
        }
        let prev_is_same_level = trail
            .prev_var(var)
            .map(|prev| ctx.part(ImplGraphP).level(prev) == var_level)
            .unwrap_or(false);
        trail.remove_var(var, var_level, prev_is_same_level);

        make_available(ctx.borrow(), var);
        ctx.part_mut(AssignmentP).unassign_var(var);
    }

    trail.truncate_levels(level);
}

/// Undo all decisions and assumptions.
pub fn full_restart(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut IncrementalP,
        mut TrailP,
        mut VsidsP,
        ImplGraphP,
    ),
) {
    ctx.part_mut(IncrementalP).full_restart();
    backtrack(ctx.borrow(), 0);
}

/// Undo all decisions, but keep the assumptions.
pub fn restart(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut StatsP,
        mut TrailP,
        mut VsidsP,
        ImplGraphP,
        IncrementalP,
    ),
) {
    let level = ctx.part(IncrementalP).assumption_levels();
    ctx.part_mut(StatsP).restarts += 1;
    backtrack(ctx.borrow(), level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splicing_keeps_levels_sorted() {
        let mut trail = Trail::default();
        trail.set_var_count(8);

        let var = |n: usize| Var::from_index(n);

        trail.append_var(var(0), 0);
        trail.new_decision_level();
        trail.append_var(var(1), 1);
        trail.append_var(var(2), 1);
        trail.new_decision_level();
        trail.append_var(var(3), 2);

        // Mid-trail insertion at a lower level, as done by delayed implication repair.
        trail.append_var(var(4), 1);

        let mut order = vec![];
        let mut cursor = trail.tail_var();
        while let Some(v) = cursor {
            order.push(v.index());
            cursor = trail.prev_var(v);
        }
        assert_eq!(order, vec![3, 4, 2, 1, 0]);

        assert_eq!(trail.last_var_at_level(1), Some(var(4)));
        assert_eq!(trail.last_var_at_level(2), Some(var(3)));

        // Removing the only variable of a level collapses it.
        trail.remove_var(var(3), 2, false);
        assert_eq!(trail.last_var_at_level(2), None);
        assert_eq!(trail.tail_var(), Some(var(4)));

        // A later insertion at the collapsed level's parent still works.
        trail.append_var(var(5), 2);
        assert_eq!(trail.tail_var(), Some(var(5)));
        assert_eq!(trail.len(), 5);
    }

    #[test]
    fn queue_drains_and_resets() {
        let mut trail = Trail::default();
        trail.set_var_count(4);

        trail.enqueue_lit(Lit::from_dimacs(1));
        trail.enqueue_lit(Lit::from_dimacs(-2));

        assert_eq!(trail.pop_queue(), Some(Lit::from_dimacs(1)));
        assert!(!trail.fully_propagated());
        assert_eq!(trail.pop_queue(), Some(Lit::from_dimacs(-2)));
        assert!(trail.fully_propagated());
        assert_eq!(trail.pop_queue(), None);

        trail.enqueue_lit(Lit::from_dimacs(3));
        assert_eq!(trail.pop_queue(), Some(Lit::from_dimacs(3)));
    }
}
