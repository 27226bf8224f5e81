//! Solver configuration.
//!
//! All tunables live in [`SolverConfig`]. Each field has a fixed legal range and can be set
//! through [`SolverConfig::set_param`] using a hierarchical dotted name. The special
//! `/mode/value` meta-parameter switches between preconfigured profiles, overwriting the
//! grouped parameters it controls.
use std::env;
use std::fs;

use anyhow::Context as _;
use thiserror::Error;

/// Environment variable naming an optional `name value`-per-line configuration file.
pub const CONFIG_FILE_ENV: &str = "KITESAT_CONFIG";

/// Number of preconfigured parameter profiles.
pub const MODE_COUNT: u32 = 9;

/// Rule used to pick one of several simultaneous contradictions.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ConflictChoice {
    First,
    Last,
    Smallest,
    LowestGlue,
}

/// Restart pacing strategy.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RestartStrategy {
    /// Conflict-counting with an arithmetic or Luby-scaled threshold.
    Numeric,
    /// Recent-LBD-average versus global-average with restart blocking.
    GlueAverage,
}

/// Errors reported when setting a parameter.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("parameter {0} does not exist")]
    UnknownName(String),
    #[error("parameter {name}: value {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("parameter {name}: value {value} must be an integer")]
    NotAnInteger { name: String, value: f64 },
}

/// Configurable parameters used during solving.
///
/// The `(Default: ...)` values correspond to mode 0.
pub struct SolverConfig {
    /// Currently selected parameter profile. (Default: 0)
    pub mode: u32,

    /// Store long clauses bit-compressed. Only honored before the first clause. (Default: false)
    pub compress: bool,

    /// Rule for choosing among contradictions found in one propagation pass. (Default: First)
    pub conflict_choice: ConflictChoice,

    /// Initial value of the VSIDS activity increment. (Default: 1.0)
    pub var_activity_inc: f64,

    /// Initial VSIDS decay factor; drifts up towards `var_decay_max`. (Default: 0.8)
    pub var_decay_init: f64,

    /// Upper limit the VSIDS decay factor drifts towards. (Default: 0.95)
    pub var_decay_max: f64,

    /// Amount added to the decay factor at each drift step. (Default: 0.01)
    pub var_decay_inc: f64,

    /// Conflicts between decay drift steps. (Default: 5000)
    pub var_decay_update_conf_rate: u64,

    /// Flip the saved polarity on every Nth decision, 0 disables. (Default: 0)
    pub polarity_flip_interval: u64,

    /// Prefer the later created variable on equal branching activity. (Default: false)
    pub vsids_tie_break_late: bool,

    /// Restart strategy for the initial query. (Default: Numeric)
    pub restart_strategy_init: RestartStrategy,

    /// Restart strategy for short incremental queries. (Default: Numeric)
    pub restart_strategy_short: RestartStrategy,

    /// Restart strategy for normal incremental queries. (Default: Numeric)
    pub restart_strategy_normal: RestartStrategy,

    /// Conflicts before the first numeric restart. (Default: 100)
    pub restart_numeric_init: u64,

    /// Arithmetic increment of the numeric restart threshold. (Default: 50)
    pub restart_numeric_inc: u64,

    /// Use a Luby sequence instead of arithmetic growth for numeric restarts. (Default: true)
    pub restart_numeric_luby: bool,

    /// Scale factor applied to Luby sequence values (number of conflicts). (Default: 128)
    pub restart_luby_scale: u64,

    /// Window size of the recent-LBD average. (Default: 50)
    pub restart_glue_window: usize,

    /// Restart when recent LBD mean times this exceeds the global mean. (Default: 0.8)
    pub restart_glue_margin: f64,

    /// Block a restart when the trail is this much larger than the recent mean. (Default: 1.4)
    pub restart_blocking_margin: f64,

    /// Window size of the recent assignments-at-conflict average. (Default: 5000)
    pub restart_blocking_window: usize,

    /// A query counts as short-incremental below this many conflicts. (Default: 1000)
    pub short_query_conflicts: u64,

    /// Fraction of restarts during which user-fixed polarities are not forced. (Default: 0.0)
    pub phase_unforce_restart_fraction: f64,

    /// Backtrack chronologically when the jump would skip more than this many levels,
    /// 0 disables chronological backtracking. (Default: 100)
    pub chrono_backtrack_if_higher: u64,

    /// Conflicts before chronological backtracking is first considered. (Default: 4000)
    pub chrono_backtrack_postpone_conflicts: u64,

    /// Replace the chronological target by the highest-score level in range. (Default: false)
    pub custom_backtrack: bool,

    /// Apply recursive learned clause minimization. (Default: true)
    pub minimize_learnt: bool,

    /// Maximum glue for binary-resolution minimization, 0 disables. (Default: 6)
    pub bin_minimize_max_glue: u32,

    /// Maximum size for binary-resolution minimization. (Default: 30)
    pub bin_minimize_max_size: usize,

    /// Excise pivots from subsumed resolution parents. (Default: true)
    pub otfs_parents: bool,

    /// Excise pivots from a subsumed contradicting clause. (Default: true)
    pub otfs_contradicting: bool,

    /// Only excise from learnt parents when their glue is at least this. (Default: 3)
    pub otfs_min_glue: u32,

    /// ALL-UIP lifting: 0 off, 1 on, 2 adaptive by success rate. (Default: 0)
    pub all_uip_mode: u32,

    /// Restart number at which ALL-UIP lifting starts. (Default: 5)
    pub all_uip_first_restart: u64,

    /// Disable adaptive ALL-UIP below this success rate. (Default: 0.8)
    pub all_uip_success_rate: f64,

    /// Running literal-growth budget of the ALL-UIP lift. (Default: 0)
    pub all_uip_gap: u64,

    /// Record a second asserting clause when its glue is at most this, 0 disables. (Default: 0)
    pub flipped_max_glue: u32,

    /// Drop the flipped clause when the main clause subsumes it. (Default: true)
    pub flipped_drop_subsumed: bool,

    /// Never delete learnt clauses with glue at most this. (Default: 2)
    pub glue_never_delete: u32,

    /// Protect a clause once when its glue drops to at most this. (Default: 6)
    pub glue_protect_once: u32,

    /// Fraction of deletion candidates to delete. (Default: 0.5)
    pub reduce_fraction: f64,

    /// Number of glue clusters ordering deletion candidates. (Default: 8)
    pub reduce_glue_clusters: u32,

    /// Learnt clause count triggering the first reduction. (Default: 2000)
    pub reduce_trigger_init: u64,

    /// Arithmetic increment of the reduction trigger. (Default: 1000)
    pub reduce_trigger_inc: u64,

    /// Multiplicative growth of the reduction trigger. (Default: 1.1)
    pub reduce_trigger_mult: f64,

    /// Grow the reduction trigger multiplicatively instead of arithmetically. (Default: false)
    pub reduce_trigger_geometric: bool,

    /// Multiplicative decay for clause activities. (Default: 0.999)
    pub clause_activity_decay: f32,

    /// Run level-0 simplification when new units arrived. (Default: true)
    pub simplify: bool,

    /// Re-index variables during simplification. (Default: true)
    pub simplify_reindex_vars: bool,

    /// Compact clause storage when this fraction of it is wasted. (Default: 0.25)
    pub store_wasted_fraction: f64,

    /// Reuse the trail prefix shared with the previous assumption set. (Default: true)
    pub assumptions_reuse_trail: bool,

    /// Ignore assumption-level literals when computing glue. (Default: false)
    pub assumptions_ignore_in_glue: bool,

    /// Skip storing user clauses already satisfied at level 0 above this size. (Default: 0)
    pub drop_globally_satisfied_min_size: usize,

    /// Global wall-clock budget in seconds for the whole solver lifetime, +inf disables.
    /// (Default: +inf)
    pub global_timeout: f64,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            mode: 0,
            compress: false,
            conflict_choice: ConflictChoice::First,
            var_activity_inc: 1.0,
            var_decay_init: 0.8,
            var_decay_max: 0.95,
            var_decay_inc: 0.01,
            var_decay_update_conf_rate: 5000,
            polarity_flip_interval: 0,
            vsids_tie_break_late: false,
            restart_strategy_init: RestartStrategy::Numeric,
            restart_strategy_short: RestartStrategy::Numeric,
            restart_strategy_normal: RestartStrategy::Numeric,
            restart_numeric_init: 100,
            restart_numeric_inc: 50,
            restart_numeric_luby: true,
            restart_luby_scale: 128,
            restart_glue_window: 50,
            restart_glue_margin: 0.8,
            restart_blocking_margin: 1.4,
            restart_blocking_window: 5000,
            short_query_conflicts: 1000,
            phase_unforce_restart_fraction: 0.0,
            chrono_backtrack_if_higher: 100,
            chrono_backtrack_postpone_conflicts: 4000,
            custom_backtrack: false,
            minimize_learnt: true,
            bin_minimize_max_glue: 6,
            bin_minimize_max_size: 30,
            otfs_parents: true,
            otfs_contradicting: true,
            otfs_min_glue: 3,
            all_uip_mode: 0,
            all_uip_first_restart: 5,
            all_uip_success_rate: 0.8,
            all_uip_gap: 0,
            flipped_max_glue: 0,
            flipped_drop_subsumed: true,
            glue_never_delete: 2,
            glue_protect_once: 6,
            reduce_fraction: 0.5,
            reduce_glue_clusters: 8,
            reduce_trigger_init: 2000,
            reduce_trigger_inc: 1000,
            reduce_trigger_mult: 1.1,
            reduce_trigger_geometric: false,
            clause_activity_decay: 0.999,
            simplify: true,
            simplify_reindex_vars: true,
            store_wasted_fraction: 0.25,
            assumptions_reuse_trail: true,
            assumptions_ignore_in_glue: false,
            drop_globally_satisfied_min_size: 0,
            global_timeout: std::f64::INFINITY,
        }
    }
}

/// Check that a value lies within the legal range of a parameter.
fn in_range(name: &str, value: f64, min: f64, max: f64) -> Result<f64, ParamError> {
    if value < min || value > max {
        Err(ParamError::OutOfRange {
            name: name.into(),
            value,
            min,
            max,
        })
    } else {
        Ok(value)
    }
}

/// Check that a value is a whole number within the legal range of a parameter.
fn int_in_range(name: &str, value: f64, min: f64, max: f64) -> Result<u64, ParamError> {
    if value.trunc() != value {
        return Err(ParamError::NotAnInteger {
            name: name.into(),
            value,
        });
    }
    Ok(in_range(name, value, min, max)? as u64)
}

/// Check that a value is a boolean parameter value.
fn as_bool(name: &str, value: f64) -> Result<bool, ParamError> {
    Ok(int_in_range(name, value, 0.0, 1.0)? != 0)
}

impl SolverConfig {
    /// Set a parameter by its dotted name.
    ///
    /// All values are passed as `f64`, which covers every parameter type in use. Integer and
    /// boolean parameters reject fractional values.
    pub fn set_param(&mut self, name: &str, value: f64) -> Result<(), ParamError> {
        match name {
            "/mode/value" => {
                let mode = int_in_range(name, value, 0.0, (MODE_COUNT - 1) as f64)? as u32;
                self.apply_mode(mode);
            }
            "/store/compress" => self.compress = as_bool(name, value)?,
            "/bcp/best_contradiction_strat" => {
                self.conflict_choice = match int_in_range(name, value, 0.0, 3.0)? {
                    0 => ConflictChoice::First,
                    1 => ConflictChoice::Last,
                    2 => ConflictChoice::Smallest,
                    _ => ConflictChoice::LowestGlue,
                };
            }
            "/decision/vsids/var_activity_inc" => {
                self.var_activity_inc = in_range(name, value, 1e-10, 1e10)?
            }
            "/decision/vsids/var_decay_init" => {
                self.var_decay_init = in_range(name, value, 0.5, 0.999)?
            }
            "/decision/vsids/var_decay_max" => {
                self.var_decay_max = in_range(name, value, 0.5, 0.999)?
            }
            "/decision/vsids/var_decay_inc" => {
                self.var_decay_inc = in_range(name, value, 0.0, 0.5)?
            }
            "/decision/vsids/var_decay_update_conf_rate" => {
                self.var_decay_update_conf_rate = int_in_range(name, value, 1.0, 1e9)?
            }
            "/decision/polarity/flip_factor" => {
                self.polarity_flip_interval = int_in_range(name, value, 0.0, 1e9)?
            }
            "/decision/vsids/tie_break_late" => {
                self.vsids_tie_break_late = as_bool(name, value)?
            }
            "/restarts/strategy_init" => {
                self.restart_strategy_init = restart_strategy(name, value)?
            }
            "/restarts/strategy_s" => {
                self.restart_strategy_short = restart_strategy(name, value)?
            }
            "/restarts/strategy_n" => {
                self.restart_strategy_normal = restart_strategy(name, value)?
            }
            "/restarts/numeric/init" => {
                self.restart_numeric_init = int_in_range(name, value, 1.0, 1e9)?
            }
            "/restarts/numeric/inc" => {
                self.restart_numeric_inc = int_in_range(name, value, 0.0, 1e9)?
            }
            "/restarts/numeric/luby" => self.restart_numeric_luby = as_bool(name, value)?,
            "/restarts/numeric/luby_scale" => {
                self.restart_luby_scale = int_in_range(name, value, 1.0, 1e9)?
            }
            "/restarts/lbd/window" => {
                self.restart_glue_window = int_in_range(name, value, 1.0, 1e6)? as usize
            }
            "/restarts/lbd/margin" => {
                self.restart_glue_margin = in_range(name, value, 0.1, 10.0)?
            }
            "/restarts/lbd/blocking_margin" => {
                self.restart_blocking_margin = in_range(name, value, 0.1, 10.0)?
            }
            "/restarts/lbd/blocking_window" => {
                self.restart_blocking_window = int_in_range(name, value, 1.0, 1e6)? as usize
            }
            "/restarts/short_query_conflicts" => {
                self.short_query_conflicts = int_in_range(name, value, 0.0, 1e12)?
            }
            "/phase/unforce_restarts_fraction" => {
                self.phase_unforce_restart_fraction = in_range(name, value, 0.0, 1.0)?
            }
            "/backtracking/chrono_bt_if_higher" => {
                self.chrono_backtrack_if_higher = int_in_range(name, value, 0.0, 1e9)?
            }
            "/backtracking/conflicts_to_postpone_chrono" => {
                self.chrono_backtrack_postpone_conflicts = int_in_range(name, value, 0.0, 1e12)?
            }
            "/backtracking/custom_bt_strat" => self.custom_backtrack = as_bool(name, value)?,
            "/conflicts/minimize_clauses" => self.minimize_learnt = as_bool(name, value)?,
            "/conflicts/bin_res_max_lbd" => {
                self.bin_minimize_max_glue = int_in_range(name, value, 0.0, 1e6)? as u32
            }
            "/conflicts/bin_res_max_size" => {
                self.bin_minimize_max_size = int_in_range(name, value, 0.0, 1e6)? as usize
            }
            "/conflicts/on_the_fly_subsumption/parent" => {
                self.otfs_parents = as_bool(name, value)?
            }
            "/conflicts/on_the_fly_subsumption/contradicting" => {
                self.otfs_contradicting = as_bool(name, value)?
            }
            "/conflicts/on_the_fly_subsumption/min_glue" => {
                self.otfs_min_glue = int_in_range(name, value, 0.0, 1e6)? as u32
            }
            "/conflicts/all_uip/mode" => {
                self.all_uip_mode = int_in_range(name, value, 0.0, 2.0)? as u32
            }
            "/conflicts/all_uip/first_restart" => {
                self.all_uip_first_restart = int_in_range(name, value, 0.0, 1e9)?
            }
            "/conflicts/all_uip/success_rate_failure_thr" => {
                self.all_uip_success_rate = in_range(name, value, 0.0, 1.0)?
            }
            "/conflicts/all_uip/gap" => self.all_uip_gap = int_in_range(name, value, 0.0, 1e6)?,
            "/conflicts/flipped_recording_max_lbd" => {
                self.flipped_max_glue = int_in_range(name, value, 0.0, 1e6)? as u32
            }
            "/conflicts/flipped_drop_if_subsumed" => {
                self.flipped_drop_subsumed = as_bool(name, value)?
            }
            "/deletion/clause/glue_never_delete" => {
                self.glue_never_delete = int_in_range(name, value, 0.0, 1e6)? as u32
            }
            "/deletion/clause/glue_min_freeze" => {
                self.glue_protect_once = int_in_range(name, value, 0.0, 1e6)? as u32
            }
            "/deletion/clause/frac_to_delete" => {
                self.reduce_fraction = in_range(name, value, 0.0, 1.0)?
            }
            "/deletion/clause/glue_clusters" => {
                self.reduce_glue_clusters = int_in_range(name, value, 1.0, 256.0)? as u32
            }
            "/deletion/clause/trigger_init" => {
                self.reduce_trigger_init = int_in_range(name, value, 1.0, 1e12)?
            }
            "/deletion/clause/trigger_linc" => {
                self.reduce_trigger_inc = int_in_range(name, value, 0.0, 1e12)?
            }
            "/deletion/clause/trigger_mult" => {
                self.reduce_trigger_mult = in_range(name, value, 1.0, 10.0)?
            }
            "/deletion/clause/strategy" => {
                self.reduce_trigger_geometric = as_bool(name, value)?
            }
            "/deletion/clause/activity_decay" => {
                self.clause_activity_decay = in_range(name, value, 0.5, 0.99999)? as f32
            }
            "/deletion/simplify" => self.simplify = as_bool(name, value)?,
            "/deletion/simplify_reindex_vars" => {
                self.simplify_reindex_vars = as_bool(name, value)?
            }
            "/deletion/wasted_fraction_thr" => {
                self.store_wasted_fraction = in_range(name, value, 0.01, 1.0)?
            }
            "/assumptions/reuse_trail" => self.assumptions_reuse_trail = as_bool(name, value)?,
            "/assumptions/ignore_in_glue" => {
                self.assumptions_ignore_in_glue = as_bool(name, value)?
            }
            "/add_user_clause/remove_clss_globally_sat_larger_size" => {
                self.drop_globally_satisfied_min_size =
                    int_in_range(name, value, 0.0, 1e9)? as usize
            }
            "/global/overall_timeout" => {
                self.global_timeout = if value <= 0.0 {
                    std::f64::INFINITY
                } else {
                    value
                }
            }
            _ => return Err(ParamError::UnknownName(name.into())),
        }
        Ok(())
    }

    /// Overwrite the grouped parameters controlled by the mode meta-parameter.
    ///
    /// Mode 0 is the default configuration; the other profiles shift the search towards
    /// heavier clause management, glue-driven restarts or chronological backtracking.
    fn apply_mode(&mut self, mode: u32) {
        *self = SolverConfig {
            mode,
            // Construction-time and user-sticky settings survive a mode switch.
            compress: self.compress,
            global_timeout: self.global_timeout,
            ..SolverConfig::default()
        };

        match mode {
            0 => (),
            1 => {
                self.restart_strategy_init = RestartStrategy::GlueAverage;
                self.restart_strategy_short = RestartStrategy::GlueAverage;
                self.restart_strategy_normal = RestartStrategy::GlueAverage;
            }
            2 => {
                self.chrono_backtrack_if_higher = 0;
                self.restart_numeric_luby = false;
            }
            3 => {
                self.restart_strategy_init = RestartStrategy::GlueAverage;
                self.chrono_backtrack_if_higher = 50;
                self.custom_backtrack = true;
            }
            4 => {
                self.otfs_min_glue = 2;
                self.flipped_max_glue = 6;
            }
            5 => {
                self.all_uip_mode = 2;
                self.restart_strategy_normal = RestartStrategy::GlueAverage;
            }
            6 => {
                self.var_decay_max = 0.99;
                self.reduce_trigger_geometric = true;
                self.reduce_trigger_init = 4000;
            }
            7 => {
                self.polarity_flip_interval = 1024;
                self.restart_numeric_init = 200;
            }
            _ => {
                self.bin_minimize_max_glue = 0;
                self.minimize_learnt = false;
                self.chrono_backtrack_if_higher = 25;
            }
        }
    }

    /// Load parameters from the file named by [`CONFIG_FILE_ENV`], if set.
    ///
    /// The file contains one `name value` pair per line; empty lines and lines starting with
    /// `#` are skipped.
    pub fn load_env_config(&mut self) -> anyhow::Result<()> {
        let path = match env::var(CONFIG_FILE_ENV) {
            Ok(path) => path,
            Err(_) => return Ok(()),
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path))?;

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let name = fields.next().unwrap();
            let value: f64 = fields
                .next()
                .with_context(|| format!("{}:{}: missing value", path, line_no + 1))?
                .parse()
                .with_context(|| format!("{}:{}: malformed value", path, line_no + 1))?;
            self.set_param(name, value)
                .with_context(|| format!("{}:{}", path, line_no + 1))?;
        }

        Ok(())
    }
}

fn restart_strategy(name: &str, value: f64) -> Result<RestartStrategy, ParamError> {
    Ok(match int_in_range(name, value, 0.0, 1.0)? {
        0 => RestartStrategy::Numeric,
        _ => RestartStrategy::GlueAverage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_checks() {
        let mut config = SolverConfig::default();

        assert!(config.set_param("/deletion/clause/frac_to_delete", 0.3).is_ok());
        assert_eq!(config.reduce_fraction, 0.3);

        assert!(config.set_param("/deletion/clause/frac_to_delete", 1.5).is_err());
        assert!(config.set_param("/restarts/numeric/init", 10.5).is_err());
        assert!(config.set_param("/no/such/param", 1.0).is_err());
    }

    #[test]
    fn mode_switch_overwrites_grouped_params() {
        let mut config = SolverConfig::default();
        config.set_param("/backtracking/chrono_bt_if_higher", 7.0).unwrap();
        config.set_param("/mode/value", 1.0).unwrap();

        assert_eq!(config.mode, 1);
        assert_eq!(config.restart_strategy_normal, RestartStrategy::GlueAverage);
        // Grouped parameters are reset to the profile's values.
        assert_eq!(config.chrono_backtrack_if_higher, 100);
    }

    #[test]
    fn bool_params_reject_fractions() {
        let mut config = SolverConfig::default();
        assert!(config.set_param("/deletion/simplify", 0.5).is_err());
        assert!(config.set_param("/deletion/simplify", 0.0).is_ok());
        assert!(!config.simplify);
    }
}
