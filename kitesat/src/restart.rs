//! Restart control.
//!
//! Two pacing strategies are available, selected per query phase: a numeric controller firing
//! after a threshold of conflicts that grows arithmetically or follows a scaled Luby sequence,
//! and a glue-average controller in the Glucose style that fires when the recent learnt-clause
//! glue average exceeds the long-term average, with restart blocking while the trail indicates
//! local progress.
//!
//! The controller also owns the polarity phase toggle: over a configurable fraction of
//! restarts, user-fixed polarities are not forced onto decisions.
use crate::config::{RestartStrategy, SolverConfig};
use crate::stats::Stats;

pub mod luby;

use luby::LubySequence;

/// Classification of the current query, steering the restart strategy.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum QueryPhase {
    /// The first query on this solver.
    Initial,
    /// An incremental query expected to be short.
    ShortIncremental,
    /// Any other incremental query.
    NormalIncremental,
}

impl Default for QueryPhase {
    fn default() -> QueryPhase {
        QueryPhase::Initial
    }
}

/// Windowed running average over an integer sequence.
struct WinAverage {
    window: Vec<u64>,
    size: usize,
    next: usize,
    sum: u64,
}

impl WinAverage {
    fn new(size: usize) -> WinAverage {
        WinAverage {
            window: vec![],
            size: size.max(1),
            next: 0,
            sum: 0,
        }
    }

    fn push(&mut self, value: u64) {
        if self.window.len() < self.size {
            self.window.push(value);
            self.sum += value;
        } else {
            self.sum -= self.window[self.next];
            self.window[self.next] = value;
            self.sum += value;
            self.next = (self.next + 1) % self.size;
        }
    }

    fn clear(&mut self) {
        self.window.clear();
        self.next = 0;
        self.sum = 0;
    }

    fn is_filled(&self) -> bool {
        self.window.len() == self.size
    }

    fn mean(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.sum as f64 / self.window.len() as f64
        }
    }
}

/// Restart controller state.
pub struct Restart {
    /// Conflicts when the last restart happened.
    pub conflicts_at_restart: u64,
    /// Current numeric threshold in conflicts.
    numeric_threshold: u64,
    luby: LubySequence,
    /// Recent learnt clause glues.
    glue_window: WinAverage,
    /// Long-term glue statistics.
    glue_sum: u64,
    glue_count: u64,
    /// Recent trail sizes at conflicts, for restart blocking.
    trail_window: WinAverage,
    /// Whether user-fixed polarities are currently forced onto decisions.
    force_user_polarity: bool,
    /// Phase of the running query.
    pub query_phase: QueryPhase,
}

impl Default for Restart {
    fn default() -> Restart {
        let config = SolverConfig::default();
        Restart {
            conflicts_at_restart: 0,
            numeric_threshold: config.restart_numeric_init,
            luby: LubySequence::default(),
            glue_window: WinAverage::new(config.restart_glue_window),
            glue_sum: 0,
            glue_count: 0,
            trail_window: WinAverage::new(config.restart_blocking_window),
            force_user_polarity: true,
            query_phase: QueryPhase::Initial,
        }
    }
}

impl Restart {
    /// Whether user-fixed polarities are currently forced onto decisions.
    pub fn force_user_polarity(&self) -> bool {
        self.force_user_polarity
    }

    /// The restart strategy active for the running query.
    fn strategy(&self, config: &SolverConfig) -> RestartStrategy {
        match self.query_phase {
            QueryPhase::Initial => config.restart_strategy_init,
            QueryPhase::ShortIncremental => config.restart_strategy_short,
            QueryPhase::NormalIncremental => config.restart_strategy_normal,
        }
    }

    /// Reconfigure the windows when the configuration changed.
    pub fn configure(&mut self, config: &SolverConfig) {
        self.glue_window = WinAverage::new(config.restart_glue_window);
        self.trail_window = WinAverage::new(config.restart_blocking_window);
        self.numeric_threshold = config.restart_numeric_init;
    }

    /// Record a conflict and its learnt clause glue.
    ///
    /// The trail size blocks an upcoming glue restart when the solver assigns distinctly more
    /// variables than it recently did, indicating local progress.
    pub fn note_conflict(&mut self, config: &SolverConfig, glue: u32, trail_len: usize) {
        self.glue_sum += glue as u64;
        self.glue_count += 1;

        if self.trail_window.is_filled()
            && trail_len as f64 > config.restart_blocking_margin * self.trail_window.mean()
        {
            self.glue_window.clear();
        }
        self.trail_window.push(trail_len as u64);
        self.glue_window.push(glue as u64);
    }

    /// Whether a restart should fire now.
    pub fn should_restart(&self, config: &SolverConfig, stats: &Stats) -> bool {
        match self.strategy(config) {
            RestartStrategy::Numeric => {
                stats.conflicts - self.conflicts_at_restart >= self.numeric_threshold
            }
            RestartStrategy::GlueAverage => {
                self.glue_count > 0
                    && self.glue_window.is_filled()
                    && self.glue_window.mean() * config.restart_glue_margin
                        > self.glue_sum as f64 / self.glue_count as f64
            }
        }
    }

    /// Advance the controller state after a restart fired.
    pub fn on_restart(&mut self, config: &SolverConfig, stats: &Stats) {
        self.conflicts_at_restart = stats.conflicts;
        self.glue_window.clear();

        if config.restart_numeric_luby {
            self.numeric_threshold = config.restart_luby_scale * self.luby.advance();
        } else {
            self.numeric_threshold += config.restart_numeric_inc;
        }

        // Leave user polarities unforced over the configured fraction of restarts.
        let fraction = config.phase_unforce_restart_fraction;
        self.force_user_polarity = if fraction <= 0.0 {
            true
        } else {
            // Spread the unforced restarts evenly using the fractional part of a running
            // product.
            (stats.restarts as f64 * fraction).fract() + fraction <= 1.0
        };
    }

    /// Whether the adaptive ALL-UIP lift should run, judged by its recent success rate.
    pub fn all_uip_active(&self, config: &SolverConfig, stats: &Stats) -> bool {
        match config.all_uip_mode {
            0 => false,
            1 => stats.restarts >= config.all_uip_first_restart,
            _ => {
                stats.restarts >= config.all_uip_first_restart
                    && (stats.all_uip_attempts < 100
                        || stats.all_uip_successes as f64
                            >= stats.all_uip_attempts as f64 * config.all_uip_success_rate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_luby_thresholds() {
        let config = SolverConfig::default();
        let mut stats = Stats::default();
        let mut restart = Restart::default();

        stats.conflicts = config.restart_numeric_init - 1;
        assert!(!restart.should_restart(&config, &stats));
        stats.conflicts += 1;
        assert!(restart.should_restart(&config, &stats));

        restart.on_restart(&config, &stats);
        assert!(!restart.should_restart(&config, &stats));

        // Luby yields 1, 1, 2, ... scaled by the configured factor.
        stats.conflicts += config.restart_luby_scale;
        assert!(restart.should_restart(&config, &stats));
    }

    #[test]
    fn glue_average_fires_on_bad_glues() {
        let mut config = SolverConfig::default();
        config.restart_strategy_init = crate::config::RestartStrategy::GlueAverage;
        config.restart_glue_window = 4;

        let stats = Stats::default();
        let mut restart = Restart::default();
        restart.configure(&config);

        // A long run of good clauses, then a burst of bad ones.
        for _ in 0..100 {
            restart.note_conflict(&config, 2, 50);
        }
        assert!(!restart.should_restart(&config, &stats));

        for _ in 0..4 {
            restart.note_conflict(&config, 20, 50);
        }
        assert!(restart.should_restart(&config, &stats));
    }
}
