//! Benjamini–Hochberg false-discovery-rate correction.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A record paired with its corrected q-value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithQValue<T> {
    #[serde(flatten)]
    pub record: T,
    pub q_value: f64,
}

/// Benjamini–Hochberg step-up q-values for p-values sorted ascending.
///
/// For rank i (1-indexed) of n, the raw value is `p(i) * n / i`; a single
/// back-to-front pass enforces `q(i) = min(q(i), q(i+1))` with no ceiling at
/// the top rank, and every value is capped at 1.0.
pub fn calculate_qvalues(sorted_pvalues: &[f64]) -> Vec<f64> {
    let n = sorted_pvalues.len();
    let mut qvalues = vec![0.0; n];
    let mut running_min = f64::INFINITY;
    for rank in (1..=n).rev() {
        let raw = sorted_pvalues[rank - 1] * n as f64 / rank as f64;
        running_min = running_min.min(raw);
        qvalues[rank - 1] = running_min.min(1.0);
    }
    qvalues
}

/// Stable-sorts `records` by ascending p-value (ties keep input order) and
/// attaches q-values from one pass over the full record set.
///
/// Output is in the sorted order; callers needing the original order must
/// re-key by record identity.
pub fn attach_qvalues<T, P>(records: Vec<T>, p_value: P) -> Vec<WithQValue<T>>
where
    P: Fn(&T) -> f64,
{
    let mut records = records;
    records.sort_by(|a, b| {
        p_value(a)
            .partial_cmp(&p_value(b))
            .unwrap_or(Ordering::Equal)
    });
    let pvalues: Vec<f64> = records.iter().map(&p_value).collect();
    let qvalues = calculate_qvalues(&pvalues);
    records
        .into_iter()
        .zip(qvalues)
        .map(|(record, q_value)| WithQValue { record, q_value })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "expected {e}, got {a}");
        }
    }

    #[test]
    fn step_up_worked_example() {
        let q = calculate_qvalues(&[0.01, 0.03, 0.04, 0.20]);
        // raw values are [0.04, 0.06, 0.0533…, 0.20]; the monotone pass
        // lowers rank 2 to rank 3's value
        assert_close(&q, &[0.04, 0.16 / 3.0, 0.16 / 3.0, 0.20]);
    }

    #[test]
    fn monotone_pass_lowers_earlier_ranks() {
        let q = calculate_qvalues(&[0.04, 0.05]);
        // raw values are [0.08, 0.05]; rank 1 drops to rank 2's value
        assert_close(&q, &[0.05, 0.05]);
    }

    #[test]
    fn qvalues_are_monotone_bounded_and_dominate_pvalues() {
        let pvalues = [0.001, 0.008, 0.039, 0.041, 0.042, 0.06, 0.074, 0.205, 0.212, 0.216,
            0.222, 0.251, 0.269, 0.275, 0.34, 0.341, 0.384, 0.569, 0.594, 0.696, 0.762,
            0.94, 0.942, 0.975, 0.986];
        let q = calculate_qvalues(&pvalues);

        for window in q.windows(2) {
            assert!(window[0] <= window[1]);
        }
        for (p, q) in pvalues.iter().zip(&q) {
            assert!(*q >= *p);
            assert!((0.0..=1.0).contains(q));
        }
    }

    #[test]
    fn empty_and_single_inputs() {
        assert!(calculate_qvalues(&[]).is_empty());
        assert_close(&calculate_qvalues(&[0.3]), &[0.3]);
    }

    #[test]
    fn attach_sorts_and_keeps_tie_order() {
        let records = vec![("late", 0.04), ("tied-first", 0.01), ("tied-second", 0.01)];
        let corrected = attach_qvalues(records, |r| r.1);

        let names: Vec<&str> = corrected.iter().map(|r| r.record.0).collect();
        assert_eq!(names, vec!["tied-first", "tied-second", "late"]);
        // n=3: raw [0.03, 0.015, 0.04] → monotone [0.015, 0.015, 0.04]
        assert!((corrected[0].q_value - 0.015).abs() < 1e-9);
        assert!((corrected[1].q_value - 0.015).abs() < 1e-9);
        assert!((corrected[2].q_value - 0.04).abs() < 1e-9);
    }

    #[test]
    fn with_qvalue_flattens_in_json() {
        #[derive(serde::Serialize)]
        struct Rec {
            gene: &'static str,
            p_value: f64,
        }
        let wrapped = WithQValue {
            record: Rec {
                gene: "TP53",
                p_value: 0.01,
            },
            q_value: 0.02,
        };
        let json = serde_json::to_value(&wrapped).unwrap();
        assert_eq!(json["gene"], "TP53");
        assert_eq!(json["q_value"], 0.02);
    }
}
