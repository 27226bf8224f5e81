//! Search statistics.

/// Counters exposed through the solver API and used by the heuristics.
#[derive(Default)]
pub struct Stats {
    /// Number of `solve` invocations so far.
    pub solves: u64,
    /// Total number of conflicts.
    pub conflicts: u64,
    /// Conflicts at the point the current query started.
    pub conflicts_at_query_start: u64,
    /// Total number of restarts.
    pub restarts: u64,
    /// Total number of backtracks (chronological and non-chronological).
    pub backtracks: u64,
    /// Total number of propagated implications.
    pub propagations: u64,
    /// Number of decisions.
    pub decisions: u64,
    /// Implications that were re-established at a lower decision level.
    pub delayed_implications: u64,
    /// Decision levels that did not have to be redone thanks to trail reuse.
    pub assump_reuse_levels_saved: u64,
    /// Literals excised from clauses by on-the-fly subsumption.
    pub otfs_excised: u64,
    /// Learnt clauses replaced by a reused contradicting clause.
    pub otfs_reused: u64,
    /// Clauses deleted by the reduction policy.
    pub clauses_deleted: u64,
    /// Clause store compaction runs.
    pub compactions: u64,
    /// Simplification runs.
    pub simplifications: u64,
    /// Learnt clauses swapped for a better flipped clause.
    pub flipped_swaps: u64,
    /// ALL-UIP lift attempts and successes for the current restart window.
    pub all_uip_attempts: u64,
    pub all_uip_successes: u64,
    /// Unit clauses imported from a parallel driver.
    pub units_imported: u64,
}

impl Stats {
    /// Conflicts since the current query started.
    pub fn query_conflicts(&self) -> u64 {
        self.conflicts - self.conflicts_at_query_start
    }
}
