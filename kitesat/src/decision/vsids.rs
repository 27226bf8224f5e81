//! The VSIDS branching heuristic.
//!
//! VSIDS (Variable State Independent Decaying Sum) keeps an activity per variable. On each
//! conflict the participating variables are bumped by an increment; instead of decaying all
//! activities afterwards, the increment itself is divided by the decay factor, which is
//! equivalent up to a global scaling factor. The decay factor is not constant: it drifts from
//! an initial value towards a per-query-phase maximum, in steps driven by the scheduler.
//!
//! When any activity exceeds 1e100, all activities and the increment are rescaled by 1e-100.
//! The same rescaling is reported to the trail's per-level score cache through the context
//! notification in [`crate::context`].
use ordered_float::OrderedFloat;

use kitesat_formula::Var;

/// Rescale everything when an activity exceeds this value.
const RESCALE_LIMIT: f64 = 1e100;

/// Factor applied when rescaling.
const RESCALE_FACTOR: f64 = 1e-100;

/// The VSIDS branching heuristic.
///
/// A binary max-heap over the unassigned variables with an explicit position index per
/// variable. The comparison is a total order: ties in activity are broken by the variable
/// index, optionally inverted to prefer later insertion order.
pub struct Vsids {
    /// The activity of each variable.
    activity: Vec<OrderedFloat<f64>>,
    /// A binary heap of the variables.
    heap: Vec<Var>,
    /// The position in the binary heap for each variable.
    position: Vec<Option<usize>>,
    /// The value to add on bumping.
    bump: f64,
    /// The inverse of the decay factor.
    inv_decay: f64,
    /// Tie-break bit: prefer the higher variable index on equal activity.
    prefer_late: bool,
    /// Set when the last bump or boost triggered a rescale.
    rescaled: bool,
}

impl Default for Vsids {
    fn default() -> Vsids {
        Vsids {
            activity: vec![],
            heap: vec![],
            position: vec![],
            bump: 1.0,
            inv_decay: 1.0 / 0.8,
            prefer_late: false,
            rescaled: false,
        }
    }
}

impl Vsids {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        let old_count = self.activity.len();
        debug_assert!(!self.heap.iter().any(|&v| v.index() >= count));
        self.activity.resize(count, OrderedFloat(0.0));
        self.position.resize(count, None);

        for i in old_count..count {
            self.make_available(Var::from_index(i));
        }
    }

    /// Change the decay factor.
    pub fn set_decay(&mut self, decay: f64) {
        debug_assert!(decay > 0.0 && decay < 1.0);
        self.inv_decay = 1.0 / decay;
    }

    /// The current activity of a variable.
    pub fn score(&self, var: Var) -> f64 {
        self.activity[var.index()].0
    }

    /// Whether the last activity update triggered a rescale, clearing the flag.
    ///
    /// Used to keep externally cached scores consistent.
    pub fn take_rescaled(&mut self) -> bool {
        std::mem::replace(&mut self.rescaled, false)
    }

    /// Bump a variable by increasing its activity by the current increment.
    pub fn bump(&mut self, var: Var) {
        self.add_to_activity(var, self.bump);
    }

    /// Bump a variable by a multiple of the current increment.
    ///
    /// A multiplier of zero leaves all activities unchanged; the heap position of the variable
    /// is unaffected either way.
    pub fn boost(&mut self, var: Var, multiplier: f64) {
        self.add_to_activity(var, self.bump * multiplier);
    }

    fn add_to_activity(&mut self, var: Var, amount: f64) {
        let rescale = {
            let value = &mut self.activity[var.index()];
            value.0 += amount;
            value.0 >= RESCALE_LIMIT
        };
        if rescale {
            self.rescale();
        }
        if let Some(pos) = self.position[var.index()] {
            self.sift_up(pos);
        }
    }

    /// Decay all variable activities.
    pub fn decay(&mut self) {
        self.bump *= self.inv_decay;
        if self.bump >= RESCALE_LIMIT {
            self.rescale();
        }
    }

    /// Rescale all values to avoid an overflow.
    fn rescale(&mut self) {
        for activity in &mut self.activity {
            activity.0 *= RESCALE_FACTOR;
        }
        self.bump *= RESCALE_FACTOR;
        self.rescaled = true;
    }

    /// Set the activity tie-break order.
    pub fn set_prefer_late(&mut self, prefer_late: bool) {
        self.prefer_late = prefer_late;
    }

    /// Re-index the variables, keeping the activities of the surviving ones.
    ///
    /// The heap is emptied; the caller re-inserts the unassigned variables afterwards.
    pub fn remap(&mut self, map: &[Option<Var>]) {
        let new_count = map.iter().filter(|entry| entry.is_some()).count();
        let mut new_activity = vec![OrderedFloat(0.0); new_count];
        for (old_index, entry) in map.iter().enumerate() {
            if let Some(new_var) = entry {
                new_activity[new_var.index()] = self.activity[old_index];
            }
        }
        self.activity = new_activity;
        self.heap.clear();
        self.position = vec![None; new_count];
    }

    /// Insert a variable into the heap if not already present.
    pub fn make_available(&mut self, var: Var) {
        if self.position[var.index()].is_none() {
            let position = self.heap.len();
            self.position[var.index()] = Some(position);
            self.heap.push(var);
            self.sift_up(position);
        }
    }

    /// Remove and return the variable with the highest activity.
    pub fn pop(&mut self) -> Option<Var> {
        if self.heap.is_empty() {
            None
        } else {
            let var = self.heap.swap_remove(0);
            if !self.heap.is_empty() {
                let top_var = self.heap[0];
                self.position[top_var.index()] = Some(0);
                self.sift_down(0);
            }
            self.position[var.index()] = None;
            Some(var)
        }
    }

    /// Total order used by the heap.
    fn precedes(&self, a: Var, b: Var) -> bool {
        let key_a = self.activity[a.index()];
        let key_b = self.activity[b.index()];
        if key_a != key_b {
            return key_a > key_b;
        }
        (a.index() > b.index()) == self.prefer_late
    }

    /// Move a variable closer to the root until the heap property is satisfied.
    fn sift_up(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        loop {
            if pos == 0 {
                return;
            }
            let parent_pos = (pos - 1) / 2;
            let parent_var = self.heap[parent_pos];
            if !self.precedes(var, parent_var) {
                return;
            }
            self.position[var.index()] = Some(parent_pos);
            self.heap[parent_pos] = var;
            self.position[parent_var.index()] = Some(pos);
            self.heap[pos] = parent_var;
            pos = parent_pos;
        }
    }

    /// Move a variable away from the root until the heap property is satisfied.
    fn sift_down(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        loop {
            let mut first_pos = pos;
            let mut first_var = var;

            let left_pos = pos * 2 + 1;
            if left_pos < self.heap.len() {
                let left_var = self.heap[left_pos];
                if self.precedes(left_var, first_var) {
                    first_pos = left_pos;
                    first_var = left_var;
                }
            }

            let right_pos = pos * 2 + 2;
            if right_pos < self.heap.len() {
                let right_var = self.heap[right_pos];
                if self.precedes(right_var, first_var) {
                    first_pos = right_pos;
                    first_var = right_var;
                }
            }

            if first_pos == pos {
                return;
            }

            self.position[var.index()] = Some(first_pos);
            self.heap[first_pos] = var;
            self.position[first_var.index()] = Some(pos);
            self.heap[pos] = first_var;
            pos = first_pos;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(vsids: &mut Vsids) -> Vec<usize> {
        let mut order = vec![];
        while let Some(var) = vsids.pop() {
            order.push(var.index());
        }
        order
    }

    #[test]
    fn heap_sorts_by_activity() {
        let mut vsids = Vsids::default();
        vsids.set_var_count(8);

        for _ in 0..8 {
            vsids.pop();
        }

        for i in 0..8 {
            for _ in 0..i {
                vsids.bump(Var::from_index(i));
            }
        }

        for i in 0..8 {
            vsids.make_available(Var::from_index((i * 5) % 8));
        }

        assert_eq!(drain(&mut vsids), vec![7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn decay_scales_later_bumps() {
        let mut vsids = Vsids::default();
        vsids.set_var_count(4);
        vsids.set_decay(0.5);

        vsids.bump(Var::from_index(0));
        vsids.decay();
        vsids.bump(Var::from_index(1));

        // The later bump outweighs the earlier one.
        assert!(vsids.score(Var::from_index(1)) > vsids.score(Var::from_index(0)));
    }

    #[test]
    fn rescale_keeps_order_and_reports() {
        let mut vsids = Vsids::default();
        vsids.set_var_count(3);
        vsids.set_decay(0.01);

        vsids.bump(Var::from_index(0));
        for _ in 0..51 {
            vsids.decay();
        }
        vsids.bump(Var::from_index(2));

        assert!(vsids.take_rescaled());
        assert!(!vsids.take_rescaled());

        assert!(vsids.score(Var::from_index(2)) > vsids.score(Var::from_index(0)));
        assert!(vsids.score(Var::from_index(2)) < RESCALE_LIMIT);

        assert_eq!(drain(&mut vsids).first(), Some(&2));
    }

    #[test]
    fn boost_multiplies_the_increment() {
        let mut vsids = Vsids::default();
        vsids.set_var_count(2);

        vsids.bump(Var::from_index(0));
        vsids.boost(Var::from_index(1), 3.0);

        assert_eq!(vsids.score(Var::from_index(1)), 3.0 * vsids.score(Var::from_index(0)));

        vsids.boost(Var::from_index(0), 0.0);
        assert_eq!(vsids.score(Var::from_index(0)), 1.0);
    }
}
