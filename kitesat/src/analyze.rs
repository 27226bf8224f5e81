//! Learns a new clause by analyzing a conflict.
//!
//! The first unique implication point (1-UIP) clause is derived by resolving the contradicting
//! clause with the reasons of the conflict level literals in reverse trail order. Interleaved
//! with the walk, on-the-fly subsumption detects resolution parents (and the contradicting
//! clause itself) that are subsumed by the running resolvent; their pivot literal can then be
//! excised in place. Excisions are queued and applied only after the asserting literal is
//! known, as the affected clauses may still be visited by the same walk.
//!
//! The derived clause is afterwards shrunk by recursive minimization and by resolution with
//! binary clauses, optionally lifted towards per-level UIPs, and optionally accompanied by a
//! second asserting clause anchored at the conflict level's decision.
use std::mem::swap;

use partial_ref::{partial, split_borrow, PartialRef};

use vec_mut_scan::VecMutScan;

use kitesat_formula::{Lit, Var};

use crate::clause::ClauseRef;
use crate::context::{
    AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseStoreP, Context, ImplGraphP,
    IncrementalP, SolverConfigP, StatsP, TmpDataP, TrailP, VsidsP,
};
use crate::glue::compute_glue;
use crate::prop::{Conflict, Reason};

/// Temporaries and results of conflict analysis.
#[derive(Default)]
pub struct AnalyzeConflict {
    /// The learned clause after analysis finishes, asserting literal in position 0.
    clause: Vec<Lit>,
    /// Number of unresolved conflict level literals in the current resolvent.
    current_level_count: usize,
    /// Variables in the current resolvent.
    var_flags: Vec<bool>,
    /// Entries to clean in `var_flags`.
    to_clean: Vec<Var>,
    /// Variables of the contradicting clause, for on-the-fly subsumption.
    conflict_flags: Vec<bool>,
    /// Entries to clean in `conflict_flags`.
    conflict_to_clean: Vec<Var>,
    /// Long clauses involved in the conflict, for activity and glue updates.
    involved: Vec<ClauseRef>,
    /// Queued pivot excisions `(clause, pivot)` from on-the-fly subsumption.
    excisions: Vec<(ClauseRef, Lit)>,
    /// The contradicting clause when an excision was queued for it.
    conflict_excision: Option<ClauseRef>,
    /// Stack for recursive minimization.
    stack: Vec<Lit>,
    /// Glue level of the learned clause.
    glue: u32,
    /// Second asserting clause anchored at the conflict level's decision, if recorded.
    flipped_clause: Vec<Lit>,
    /// Whether the ALL-UIP lift currently runs, maintained by the restart controller.
    pub all_uip_active: bool,
}

impl AnalyzeConflict {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_flags.resize(count, false);
        self.conflict_flags.resize(count, false);
    }

    /// The learned clause.
    pub fn clause(&self) -> &[Lit] {
        &self.clause
    }

    /// Glue level of the learned clause.
    pub fn glue(&self) -> u32 {
        self.glue
    }

    /// Long clauses involved in the conflict.
    pub fn involved(&self) -> &[ClauseRef] {
        &self.involved
    }

    /// Queued on-the-fly subsumption excisions.
    pub fn excisions(&self) -> &[(ClauseRef, Lit)] {
        &self.excisions
    }

    /// The contradicting clause, when an excision was queued for it.
    pub fn conflict_excision(&self) -> Option<ClauseRef> {
        self.conflict_excision
    }

    /// The recorded second asserting clause, empty when none was recorded.
    pub fn flipped_clause(&self) -> &[Lit] {
        &self.flipped_clause
    }
}

/// Learns a new clause by analyzing a conflict.
///
/// Returns the lowest decision level at which the learned clause is asserting. The caller has
/// already backtracked to the maximum decision level present in the contradicting clause, and
/// that level holds at least two of its literals.
pub fn analyze_conflict(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut StatsP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        AssignmentP,
        BinaryClausesP,
        ClauseStoreP,
        ImplGraphP,
        IncrementalP,
        SolverConfigP,
    ),
    conflict: Conflict,
) -> usize {
    let conflict_level = ctx.part(TrailP).current_level();

    {
        let analyze = ctx.part_mut(AnalyzeConflictP);
        analyze.clause.clear();
        analyze.involved.clear();
        analyze.excisions.clear();
        analyze.conflict_excision = None;
        analyze.flipped_clause.clear();
        analyze.current_level_count = 0;
    }

    debug_assert!(conflict_level > 0);

    // We start with all the literals of the contradicting clause.
    let mut conflict_len = 0;
    match conflict {
        Conflict::Binary(lits) => {
            for &lit in lits.iter() {
                add_literal(ctx.borrow(), lit, conflict_level);
                conflict_len += 1;
            }
        }
        Conflict::Long(cref) => {
            for index in 0..ctx.part(ClauseStoreP).len(cref) {
                let lit = ctx.part(ClauseStoreP).lit(cref, index);
                add_literal(ctx.borrow(), lit, conflict_level);
                conflict_len += 1;
            }
            ctx.part_mut(AnalyzeConflictP).involved.push(cref);
        }
    }

    // Track the contradicting clause's variables so the walk can detect when the resolvent
    // subsumes it.
    let conflict_cref = match conflict {
        Conflict::Long(cref) if ctx.part(SolverConfigP).otfs_contradicting => Some(cref),
        _ => None,
    };
    let mut conflict_remaining = 0;
    if conflict_cref.is_some() {
        let analyze = ctx.part_mut(AnalyzeConflictP);
        // All resolvent variables so far come from the contradicting clause.
        for i in 0..analyze.to_clean.len() {
            let var = analyze.to_clean[i];
            analyze.conflict_flags[var.index()] = true;
            analyze.conflict_to_clean.push(var);
        }
        conflict_remaining = analyze.to_clean.len();
    }

    // To get rid of all but one literal of the conflict level, we resolve the clause with the
    // reasons of those literals. The correct order for this is reverse chronological.
    let mut cursor = ctx.part(TrailP).tail_var();

    while let Some(var) = cursor {
        cursor = ctx.part(TrailP).prev_var(var);

        let flagged = {
            let analyze = ctx.part_mut(AnalyzeConflictP);
            let flag = &mut analyze.var_flags[var.index()];
            let present = *flag;
            if present {
                *flag = false;
                analyze.current_level_count -= 1;
            }
            present
        };

        if !flagged {
            continue;
        }

        // The falsified literal this variable contributes to the resolvent.
        let assigned_value = ctx.part(AssignmentP).var_value(var).unwrap();
        let pivot_lit = var.lit(assigned_value);

        if conflict_cref.is_some() && ctx.part(AnalyzeConflictP).conflict_flags[var.index()] {
            conflict_remaining -= 1;
        }

        if ctx.part(AnalyzeConflictP).current_level_count == 0 {
            // This is the 1-UIP: its falsified literal completes the clause and is kept in
            // position 0, where it asserts the flipped assignment after backtracking.
            let analyze = ctx.part_mut(AnalyzeConflictP);
            analyze.clause.push(pivot_lit);
            let end = analyze.clause.len() - 1;
            analyze.clause.swap(0, end);
            break;
        }

        // Resolve with the reason of the removed literal.
        let reason = *ctx.part(ImplGraphP).reason(var);

        match reason {
            Reason::Decision => unreachable!("conflict level literal without a reason"),
            Reason::Binary([other]) => {
                add_literal(ctx.borrow(), other, conflict_level);
            }
            Reason::Long(cref) => {
                parent_subsumption_check(ctx.borrow(), cref, var);

                for index in 1..ctx.part(ClauseStoreP).len(cref) {
                    let lit = ctx.part(ClauseStoreP).lit(cref, index);
                    add_literal(ctx.borrow(), lit, conflict_level);
                }
                ctx.part_mut(AnalyzeConflictP).involved.push(cref);
            }
        }

        // When every resolvent literal comes from the contradicting clause, the resolvent
        // subsumes it with the pivot removed.
        if let Some(cref) = conflict_cref {
            let analyze = ctx.part(AnalyzeConflictP);
            let resolvent_size = analyze.clause.len() + analyze.current_level_count;
            if analyze.conflict_flags[var.index()]
                && conflict_remaining == resolvent_size
                && conflict_len >= 3
                && excision_allowed(ctx.borrow(), cref)
            {
                queue_excision(ctx.borrow(), cref, pivot_lit);
                ctx.part_mut(AnalyzeConflictP).conflict_excision = Some(cref);
            }
        }
    }

    if ctx.part(SolverConfigP).minimize_learnt {
        minimize_clause(ctx.borrow());
    }

    minimize_with_binaries(ctx.borrow());

    {
        let analyze = ctx.part_mut(AnalyzeConflictP);
        for var in analyze.to_clean.drain(..) {
            analyze.var_flags[var.index()] = false;
        }
        for var in analyze.conflict_to_clean.drain(..) {
            analyze.conflict_flags[var.index()] = false;
        }
    }

    if ctx.part(AnalyzeConflictP).all_uip_active {
        all_uip_shrink(ctx.borrow());
    }

    // We find the highest level literal besides the asserted literal and move it into
    // position 1. This is important to ensure the watchlist constraints are not violated on
    // backtracking.
    let mut backtrack_to = 0;

    {
        let mut borrowed: partial!(
            Context,
            mut AnalyzeConflictP,
            mut StatsP,
            mut TmpDataP,
            mut TrailP,
            mut VsidsP,
            AssignmentP,
            BinaryClausesP,
            ClauseStoreP,
            ImplGraphP,
            IncrementalP,
            SolverConfigP,
        ) = ctx.borrow();
        let (analyze, ctx) = borrowed.split_part_mut(AnalyzeConflictP);
        if analyze.clause.len() > 1 {
            let (prefix, rest) = analyze.clause.split_at_mut(2);
            let lit_1 = &mut prefix[1];
            backtrack_to = ctx.part(ImplGraphP).level(lit_1.var());
            for lit in rest.iter_mut() {
                let lit_level = ctx.part(ImplGraphP).level(lit.var());
                if lit_level > backtrack_to {
                    backtrack_to = lit_level;
                    swap(lit_1, lit);
                }
            }
        }
    }

    let glue = {
        let mut borrowed: partial!(
            Context,
            mut AnalyzeConflictP,
            mut StatsP,
            mut TmpDataP,
            mut TrailP,
            mut VsidsP,
            AssignmentP,
            BinaryClausesP,
            ClauseStoreP,
            ImplGraphP,
            IncrementalP,
            SolverConfigP,
        ) = ctx.borrow();
        let (analyze, mut ctx) = borrowed.split_part_mut(AnalyzeConflictP);
        // The clause is still in conflict, so the computed glue is one higher than it will be
        // once the clause becomes asserting after backtracking.
        compute_glue(ctx.borrow(), &analyze.clause).saturating_sub(1)
    };
    ctx.part_mut(AnalyzeConflictP).glue = glue;

    if let Some(swapped_backtrack_to) =
        record_flipped_clause(ctx.borrow(), conflict_level, backtrack_to)
    {
        backtrack_to = swapped_backtrack_to;
    }

    ctx.part_mut(VsidsP).decay();

    // A rescale during the bumps invalidates the cached per-level scores.
    if ctx.part_mut(VsidsP).take_rescaled() {
        ctx.part_mut(TrailP).rescale_scores(1e-100);
    }

    backtrack_to
}

/// Add a literal to the current resolvent.
fn add_literal(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut VsidsP,
        ImplGraphP,
    ),
    lit: Lit,
    conflict_level: usize,
) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let lit_level = ctx.part(ImplGraphP).level(lit.var());
    // No need to add literals that are set by unit clauses or already present.
    if lit_level > 0 && !analyze.var_flags[lit.index()] {
        ctx.part_mut(VsidsP).bump(lit.var());

        analyze.var_flags[lit.index()] = true;
        analyze.to_clean.push(lit.var());
        if lit_level == conflict_level {
            analyze.current_level_count += 1;
        } else {
            analyze.clause.push(lit);
        }
    }
}

/// Whether on-the-fly subsumption may rewrite the given clause.
fn excision_allowed(
    mut ctx: partial!(Context, ClauseStoreP, SolverConfigP),
    cref: ClauseRef,
) -> bool {
    let store = ctx.part(ClauseStoreP);
    let config = ctx.part(SolverConfigP);
    !store.is_learnt(cref) || store.glue(cref) >= config.otfs_min_glue
}

/// Queue an excision unless one is already queued for the same clause.
fn queue_excision(
    mut ctx: partial!(Context, mut AnalyzeConflictP),
    cref: ClauseRef,
    pivot: Lit,
) {
    let analyze = ctx.part_mut(AnalyzeConflictP);
    if !analyze.excisions.iter().any(|&(queued, _)| queued == cref) {
        analyze.excisions.push((cref, pivot));
    }
}

/// Check whether the resolvent subsumes the parent clause being resolved against.
///
/// The check runs before the parent's literals are added: the resolvent subsumes the parent
/// minus its pivot exactly when every resolvent literal already occurs in the parent.
fn parent_subsumption_check(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        ClauseStoreP,
        SolverConfigP,
    ),
    cref: ClauseRef,
    pivot_var: Var,
) {
    if !ctx.part(SolverConfigP).otfs_parents {
        return;
    }
    let len = ctx.part(ClauseStoreP).len(cref);
    if !excision_allowed(ctx.borrow(), cref) {
        return;
    }

    let (analyze, ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let store = ctx.part(ClauseStoreP);

    let resolvent_size = analyze.clause.len() + analyze.current_level_count;

    let mut flagged = 0;
    for index in 1..len {
        if analyze.var_flags[store.lit(cref, index).index()] {
            flagged += 1;
        }
    }

    if flagged == resolvent_size {
        // The pivot is the implied literal in position 0.
        debug_assert_eq!(store.lit(cref, 0).var(), pivot_var);
        let pivot = store.lit(cref, 0);
        if !analyze.excisions.iter().any(|&(queued, _)| queued == cref) {
            analyze.excisions.push((cref, pivot));
        }
    }
}

/// Lift the learned clause towards per-level UIPs.
///
/// For each decision level holding more than one clause literal, the literals of that level
/// are resolved with their reasons down to a single literal, the level's own first UIP. A
/// level's lift is abandoned when it would add more new lower level literals than the
/// configured gap allows, or when the walk reaches the level's decision while more than one
/// literal of the level is outstanding. Success is tracked so the restart controller can
/// disable the lift when it rarely pays off.
fn all_uip_shrink(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut StatsP,
        AssignmentP,
        ClauseStoreP,
        ImplGraphP,
        SolverConfigP,
        TrailP,
    ),
) {
    let gap = ctx.part(SolverConfigP).all_uip_gap as usize;

    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);

    if analyze.clause.len() < 3 {
        return;
    }

    ctx.part_mut(StatsP).all_uip_attempts += 1;
    let original_len = analyze.clause.len();

    // Flags track clause membership during the lifts.
    for &lit in analyze.clause.iter() {
        analyze.var_flags[lit.index()] = true;
    }

    // Distinct levels with more than one literal, highest first.
    let mut levels: Vec<usize> = analyze.clause[1..]
        .iter()
        .map(|lit| ctx.part(ImplGraphP).level(lit.var()))
        .collect();
    levels.sort_unstable_by(|a, b| b.cmp(a));
    levels.dedup();

    for level in levels {
        let group_len = analyze.clause[1..]
            .iter()
            .filter(|lit| ctx.part(ImplGraphP).level(lit.var()) == level)
            .count();
        if group_len < 2 {
            continue;
        }

        let mut pending = group_len;
        let mut newly_flagged: Vec<Var> = vec![];
        let mut additions: Vec<Lit> = vec![];
        let mut level_uip = None;
        let mut failed = false;

        let mut cursor = ctx.part(TrailP).last_var_at_level(level);

        while let Some(var) = cursor {
            if ctx.part(ImplGraphP).level(var) != level {
                break;
            }
            cursor = ctx.part(TrailP).prev_var(var);

            if !analyze.var_flags[var.index()] {
                continue;
            }
            analyze.var_flags[var.index()] = false;
            pending -= 1;

            let assigned_value = ctx.part(AssignmentP).var_value(var).unwrap();
            let pivot_lit = var.lit(assigned_value);

            if pending == 0 {
                level_uip = Some(pivot_lit);
                break;
            }

            let reason = *ctx.part(ImplGraphP).reason(var);
            if reason.is_decision() {
                // More than one literal outstanding but nothing left to resolve with.
                failed = true;
                break;
            }

            let reason_len = match reason {
                Reason::Decision => 0,
                Reason::Binary(_) => 1,
                Reason::Long(cref) => ctx.part(ClauseStoreP).len(cref) - 1,
            };

            for index in 0..reason_len {
                let lit = match reason {
                    Reason::Decision => unreachable!(),
                    Reason::Binary([other]) => other,
                    Reason::Long(cref) => ctx.part(ClauseStoreP).lit(cref, index + 1),
                };
                let lit_level = ctx.part(ImplGraphP).level(lit.var());
                if lit_level == 0 || analyze.var_flags[lit.index()] {
                    continue;
                }
                analyze.var_flags[lit.index()] = true;
                newly_flagged.push(lit.var());
                if lit_level == level {
                    pending += 1;
                } else {
                    additions.push(lit);
                }
            }

            if additions.len() > gap + group_len - 1 {
                failed = true;
                break;
            }
        }

        match level_uip {
            Some(uip_lit) if !failed => {
                // Replace the level's group by its UIP and the collected additions.
                let graph = ctx.part(ImplGraphP);
                analyze
                    .clause
                    .retain(|lit| graph.level(lit.var()) != level || lit.var() == uip_lit.var());
                if analyze.clause.iter().all(|&lit| lit != uip_lit) {
                    analyze.clause.push(uip_lit);
                }
                analyze.var_flags[uip_lit.index()] = true;
                for &lit in additions.iter() {
                    analyze.clause.push(lit);
                }
            }
            _ => {
                // Undo this level's walk: drop the transient flags and restore the group.
                for var in newly_flagged {
                    analyze.var_flags[var.index()] = false;
                }
                for &lit in analyze.clause.iter() {
                    analyze.var_flags[lit.index()] = true;
                }
            }
        }
    }

    if analyze.clause.len() <= original_len {
        ctx.part_mut(StatsP).all_uip_successes += 1;
    }

    for i in 0..analyze.clause.len() {
        let index = analyze.clause[i].index();
        analyze.var_flags[index] = false;
    }
}

/// A Bloom filter of levels.
#[derive(Default)]
struct LevelAbstraction {
    bits: u64,
}

impl LevelAbstraction {
    /// Add a level to the Bloom filter.
    pub fn add(&mut self, level: usize) {
        self.bits |= 1 << (level % 64)
    }

    /// Test whether a level could be in the Bloom filter.
    pub fn test(&self, level: usize) -> bool {
        self.bits & (1 << (level % 64)) != 0
    }
}

/// Performs recursive clause minimization.
///
/// **Note:** Requires AnalyzeConflict's var_flags to be set for exactly the variables of the
/// unminimized clause. This also sets some more var_flags, but lists them in to_clean.
///
/// This routine tries to remove some redundant literals of the learned clause. The idea is to
/// detect literals of the learned clause that are already implied by other literals of the
/// clause.
///
/// This is done by performing a DFS in the implication graph (following edges in reverse) for
/// each literal apart from the asserting one. The search doesn't expand literals already known
/// to be implied by literals of the clause. When a parentless literal that is not in the
/// clause is found, the literal under test is not redundant.
///
/// Two optimizations are used: the search stops as soon as a literal of a decision level not
/// present in the clause is found, as the DFS would eventually reach that level's decision,
/// which cannot be in the clause. Membership of decision levels is tested approximately using
/// a Bloom filter. The other optimization avoids duplicating work: when a literal is found
/// redundant, the whole search stayed within implied literals, and their var_flags stay set so
/// the following searches treat them as known-implied. When a literal is found non-redundant,
/// the var_flags set during its DFS are reset.
fn minimize_clause(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        ClauseStoreP,
        ImplGraphP,
    ),
) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    split_borrow!(store_ctx = &(ClauseStoreP) ctx);
    let impl_graph = ctx.part(ImplGraphP);
    let store = store_ctx.part(ClauseStoreP);

    let mut involved_levels = LevelAbstraction::default();

    for &lit in analyze.clause.iter() {
        involved_levels.add(impl_graph.level(lit.var()));
    }

    let var_flags = &mut analyze.var_flags;
    let to_clean = &mut analyze.to_clean;
    let stack = &mut analyze.stack;

    let mut scan = VecMutScan::new(&mut analyze.clause);

    // We always keep the asserting literal.
    scan.next();

    'next_lit: while let Some(lit) = scan.next() {
        if impl_graph.reason(lit.var()).is_decision() {
            continue;
        }

        // Start the DFS.
        stack.clear();
        stack.push(!*lit);

        // Used to remember which var_flags are set during this DFS.
        let top = to_clean.len();

        while let Some(lit) = stack.pop() {
            let reason = *impl_graph.reason(lit.var());

            let reason_len = match reason {
                Reason::Decision => 0,
                Reason::Binary(_) => 1,
                Reason::Long(cref) => store.len(cref) - 1,
            };

            for reason_index in 0..reason_len {
                let reason_lit = match reason {
                    Reason::Decision => unreachable!(),
                    Reason::Binary([other]) => other,
                    Reason::Long(cref) => store.lit(cref, reason_index + 1),
                };

                let reason_level = impl_graph.level(reason_lit.var());

                if !var_flags[reason_lit.index()] && reason_level > 0 {
                    // We haven't established reason_lit to be redundant, haven't visited it
                    // yet and it's not implied by unit clauses.

                    if impl_graph.reason(reason_lit.var()).is_decision()
                        || !involved_levels.test(reason_level)
                    {
                        // reason_lit is a decision not in the clause or in a decision level
                        // known not to be in the clause. Abort the search.

                        // Reset the var_flags set during _this_ DFS.
                        for var in to_clean.drain(top..) {
                            var_flags[var.index()] = false;
                        }
                        continue 'next_lit;
                    } else {
                        var_flags[reason_lit.index()] = true;
                        to_clean.push(reason_lit.var());
                        stack.push(!reason_lit);
                    }
                }
            }
        }

        lit.remove();
    }
}

/// Remove literals by resolving with binary clauses of the asserting literal.
///
/// A literal `l` of the clause can be dropped when a binary clause contains the asserting
/// literal together with `!l`: resolving on `l` reproduces the clause without `l`. Only short
/// clauses of low glue are worth the binary watch scan.
fn minimize_with_binaries(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut TmpDataP,
        BinaryClausesP,
        ImplGraphP,
        IncrementalP,
        SolverConfigP,
    ),
) {
    let max_size = ctx.part(SolverConfigP).bin_minimize_max_size;
    let max_glue = ctx.part(SolverConfigP).bin_minimize_max_glue;

    if max_glue == 0 || ctx.part(AnalyzeConflictP).clause.len() > max_size {
        return;
    }
    if ctx.part(AnalyzeConflictP).clause.len() < 3 {
        return;
    }

    let glue = {
        let mut borrowed: partial!(
            Context,
            mut AnalyzeConflictP,
            mut TmpDataP,
            BinaryClausesP,
            ImplGraphP,
            IncrementalP,
            SolverConfigP,
        ) = ctx.borrow();
        let (analyze, mut ctx) = borrowed.split_part_mut(AnalyzeConflictP);
        compute_glue(ctx.borrow(), &analyze.clause)
    };
    if glue > max_glue {
        return;
    }

    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);
    let flags = &mut tmp.flags;

    let asserting = analyze.clause[0];

    // Mark the negations of the clause literals, then scan the binary implications of the
    // negated asserting literal for marked entries.
    for &lit in analyze.clause[1..].iter() {
        flags[(!lit).code()] = true;
    }

    let mut removable = false;
    for &implied in ctx.part(BinaryClausesP).implied(!asserting) {
        if flags[implied.code()] {
            // Binary clause {asserting, !lit} exists, so lit is redundant.
            flags[implied.code()] = false;
            removable = true;
        }
    }

    if removable {
        analyze
            .clause
            .retain(|&lit| lit == asserting || flags[(!lit).code()]);
    }

    for &lit in analyze.clause[1..].iter() {
        flags[(!lit).code()] = false;
    }
}

/// Record a second asserting clause anchored at the conflict level's decision.
///
/// The walk continues past the first UIP down to the decision literal itself, producing the
/// clause that asserts the decision's negation. The clause is kept when its glue is within the
/// configured bound and it brings literals beyond a plain replacement of the main clause's
/// asserting literal. When it asserts at a strictly lower level than the main clause, it is
/// swapped in as the main result and the new backtrack level is returned; a unit main clause
/// is never swapped away.
fn record_flipped_clause(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut StatsP,
        mut TmpDataP,
        AssignmentP,
        ClauseStoreP,
        ImplGraphP,
        IncrementalP,
        SolverConfigP,
        TrailP,
    ),
    conflict_level: usize,
    main_backtrack_to: usize,
) -> Option<usize> {
    let max_glue = ctx.part(SolverConfigP).flipped_max_glue;
    if max_glue == 0 || ctx.part(AnalyzeConflictP).clause.len() < 2 {
        return None;
    }

    // Continue the resolution past the first UIP, removing every conflict level literal except
    // the decision itself. The main clause's lower level literals are reused; the continued
    // resolution can only add literals below the conflict level.
    let mut flipped: Vec<Lit> = Vec::new();
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);

    let uip = analyze.clause[0];

    let mut pending = 1usize;
    analyze.var_flags[uip.index()] = true;
    let mut to_clean = vec![uip.var()];

    for &lit in analyze.clause[1..].iter() {
        analyze.var_flags[lit.index()] = true;
        to_clean.push(lit.var());
        flipped.push(lit);
    }

    let mut anchor = None;

    let mut cursor = Some(uip.var());
    while let Some(var) = cursor {
        cursor = ctx.part(TrailP).prev_var(var);

        if !analyze.var_flags[var.index()] {
            continue;
        }
        analyze.var_flags[var.index()] = false;
        if ctx.part(ImplGraphP).level(var) < conflict_level {
            // A lower level literal, already part of the flipped clause.
            continue;
        }
        pending -= 1;

        let assigned_value = ctx.part(AssignmentP).var_value(var).unwrap();
        let pivot_lit = var.lit(assigned_value);

        let reason = *ctx.part(ImplGraphP).reason(var);

        if reason.is_decision() {
            // Reached the conflict level's decision; its falsified literal anchors the
            // flipped clause, asserting the decision's negation.
            anchor = Some(pivot_lit);
            break;
        }

        let reason_len = match reason {
            Reason::Decision => 0,
            Reason::Binary(_) => 1,
            Reason::Long(cref) => ctx.part(ClauseStoreP).len(cref) - 1,
        };

        for index in 0..reason_len {
            let lit = match reason {
                Reason::Decision => unreachable!(),
                Reason::Binary([other]) => other,
                Reason::Long(cref) => ctx.part(ClauseStoreP).lit(cref, index + 1),
            };
            let level = ctx.part(ImplGraphP).level(lit.var());
            if level == 0 || analyze.var_flags[lit.index()] {
                continue;
            }
            analyze.var_flags[lit.index()] = true;
            to_clean.push(lit.var());
            if level == conflict_level {
                pending += 1;
            } else {
                flipped.push(lit);
            }
        }

        debug_assert!(pending > 0);
    }

    for var in to_clean {
        analyze.var_flags[var.index()] = false;
    }

    let anchor = anchor?;

    flipped.push(anchor);
    let end = flipped.len() - 1;
    flipped.swap(0, end);

    // A flipped clause of the main clause's size merely replaces the asserting literal by the
    // weaker decision literal; the main clause covers it.
    if ctx.part(SolverConfigP).flipped_drop_subsumed && flipped.len() == analyze.clause.len() {
        return None;
    }

    let glue = compute_glue(ctx.borrow(), &flipped).saturating_sub(1);
    if glue > max_glue {
        return None;
    }

    // Order the flipped clause for watching: the highest level literal moves to position 1.
    let mut flipped_backtrack_to = 0;
    if flipped.len() > 1 {
        let (prefix, rest) = flipped.split_at_mut(2);
        let lit_1 = &mut prefix[1];
        flipped_backtrack_to = ctx.part(ImplGraphP).level(lit_1.var());
        for lit in rest.iter_mut() {
            let lit_level = ctx.part(ImplGraphP).level(lit.var());
            if lit_level > flipped_backtrack_to {
                flipped_backtrack_to = lit_level;
                swap(lit_1, lit);
            }
        }
    }

    // Use the flipped clause as the main clause when it asserts at a strictly lower level.
    let mut swapped = None;
    if flipped_backtrack_to < main_backtrack_to {
        swap(&mut analyze.clause, &mut flipped);
        analyze.glue = glue;
        ctx.part_mut(StatsP).flipped_swaps += 1;
        swapped = Some(flipped_backtrack_to);
    }

    analyze.flipped_clause = flipped;
    swapped
}
