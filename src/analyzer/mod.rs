mod baseline;
mod classifier;
mod differ;

pub use baseline::{Baseline, HIGH_PRIV, LOW_PRIV, NO_AUTH, PLAIN};
pub use classifier::{PathCategory, discovery_rule, header_bypass_rule, idor_rule, path_category, sql_error_rule};
pub use differ::{DiffSignals, DiffThresholds, boolean_pair_hit, compare, timing_hit};
