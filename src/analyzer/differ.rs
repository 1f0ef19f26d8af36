use serde::{Deserialize, Serialize};

use crate::models::ResponseRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffThresholds {
    /// True/false length delta must be strictly greater than this.
    pub boolean_min_delta: i64,
    /// True-condition length must be strictly closer than this to the baseline.
    pub boolean_baseline_tolerance: i64,
    pub induced_delay_ms: u64,
    /// Inclusive percentage of `induced_delay_ms` that counts as a timing hit.
    pub timing_percent: u64,
    pub idor_min_body: usize,
    pub path_variant_delta: i64,
    pub param_length_delta: i64,
}

impl Default for DiffThresholds {
    fn default() -> Self {
        Self {
            boolean_min_delta: 50,
            boolean_baseline_tolerance: 100,
            induced_delay_ms: 5000,
            timing_percent: 90,
            idor_min_body: 100,
            path_variant_delta: 500,
            param_length_delta: 100,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiffSignals<'a> {
    pub status_changed: bool,
    pub length_delta: i64,
    pub elapsed_delta_ms: i64,
    response: &'a ResponseRecord,
}

impl<'a> DiffSignals<'a> {
    pub fn reflects(&self, token: &str) -> bool {
        !token.is_empty() && self.response.body.contains(token)
    }

    pub fn abs_length_delta(&self) -> i64 {
        self.length_delta.abs()
    }
}

pub fn compare<'a>(response: &'a ResponseRecord, baseline: &ResponseRecord) -> DiffSignals<'a> {
    DiffSignals {
        status_changed: response.status != baseline.status,
        length_delta: response.body_len() as i64 - baseline.body_len() as i64,
        elapsed_delta_ms: response.elapsed_ms as i64 - baseline.elapsed_ms as i64,
        response,
    }
}

pub fn timing_hit(elapsed_ms: u64, thresholds: &DiffThresholds) -> bool {
    elapsed_ms.saturating_mul(100) >= thresholds.induced_delay_ms.saturating_mul(thresholds.timing_percent)
}

pub fn boolean_pair_hit(baseline_len: usize, true_len: usize, false_len: usize, thresholds: &DiffThresholds) -> bool {
    let near_baseline = (true_len as i64 - baseline_len as i64).abs() < thresholds.boolean_baseline_tolerance;
    let diverges = (true_len as i64 - false_len as i64).abs() > thresholds.boolean_min_delta;
    near_baseline && diverges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: u16, body: &str, elapsed_ms: u64) -> ResponseRecord {
        ResponseRecord::new(status, Vec::new(), body.to_string(), "http://t/".into(), elapsed_ms)
    }

    #[test]
    fn test_compare_signals() {
        let baseline = record(200, "hello", 40);
        let response = record(500, "hello world TOKEN", 140);
        let diff = compare(&response, &baseline);

        assert!(diff.status_changed);
        assert_eq!(diff.length_delta, 12);
        assert_eq!(diff.elapsed_delta_ms, 100);
        assert!(diff.reflects("TOKEN"));
        assert!(!diff.reflects("token"));
        assert!(!diff.reflects(""));
    }

    #[test]
    fn test_timing_boundary() {
        let th = DiffThresholds::default();
        assert!(timing_hit(4500, &th));
        assert!(!timing_hit(4499, &th));
        assert!(timing_hit(15_000, &th));
    }

    #[test]
    fn test_boolean_pair_boundaries() {
        let th = DiffThresholds::default();
        assert!(!boolean_pair_hit(1000, 1000, 950, &th));
        assert!(boolean_pair_hit(1000, 1000, 949, &th));
        assert!(!boolean_pair_hit(1000, 1100, 900, &th));
        assert!(boolean_pair_hit(1000, 1099, 900, &th));
    }

    #[test]
    fn test_thresholds_deserialize_partial() {
        let th: DiffThresholds = serde_json::from_str(r#"{"booleanMinDelta": 10}"#).unwrap();
        assert_eq!(th.boolean_min_delta, 10);
        assert_eq!(th.induced_delay_ms, 5000);
    }
}
