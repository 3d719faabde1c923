use serde::{Deserialize, Serialize};

pub type MetricFn = fn(&[u8], &[u8]) -> f64;

/// Compare to metric values, determining if b is better.
/// If one of them is NaN favor the non NaN value.
/// If both are NaN, consider the first value to be better.
pub fn is_comparison_better(value: f64, comparison: f64, maximize: bool) -> bool {
    match (value.is_nan(), comparison.is_nan()) {
        (true, true) | (false, true) => false,
        (true, false) => true,
        (false, false) => {
            if maximize {
                value < comparison
            } else {
                value > comparison
            }
        }
    }
}

/// Validation metric of the candidate models, on hard labels where `1` is the
/// positive (fail) class.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    F1,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::F1 => "f1",
        }
    }

    pub fn metric_fn(&self) -> MetricFn {
        match self {
            Metric::F1 => f1_score,
        }
    }

    pub fn maximize(&self) -> bool {
        true
    }
}

struct Confusion {
    tp: usize,
    fp: usize,
    fn_: usize,
}

fn confusion(y: &[u8], yhat: &[u8]) -> Confusion {
    let mut c = Confusion { tp: 0, fp: 0, fn_: 0 };
    for (&truth, &pred) in y.iter().zip(yhat) {
        match (truth, pred) {
            (1, 1) => c.tp += 1,
            (0, 1) => c.fp += 1,
            (1, 0) => c.fn_ += 1,
            _ => (),
        }
    }
    c
}

/// Binary F1 of the positive class; zero when there are no true positives.
pub fn f1_score(y: &[u8], yhat: &[u8]) -> f64 {
    let c = confusion(y, yhat);
    let den = 2 * c.tp + c.fp + c.fn_;
    if den == 0 {
        0.0
    } else {
        (2 * c.tp) as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::precision_round;

    #[test]
    fn test_f1_score() {
        let y = vec![1, 1, 0, 0, 1, 0];
        let yhat = vec![1, 0, 0, 1, 1, 0];
        // tp=2 fp=1 fn=1
        assert_eq!(precision_round(f1_score(&y, &yhat), 6), 0.666667);
        // tp=1 fp=2 fn=0
        assert_eq!(precision_round(f1_score(&[1, 0, 0], &[1, 1, 1]), 6), 0.5);
    }

    #[test]
    fn test_f1_zero_division() {
        assert_eq!(f1_score(&[0, 0, 0], &[0, 0, 0]), 0.0);
        assert_eq!(f1_score(&[1, 1], &[0, 0]), 0.0);
    }

    #[test]
    fn test_is_comparison_better() {
        assert!(is_comparison_better(0.5, 0.6, true));
        assert!(!is_comparison_better(0.6, 0.6, true));
        assert!(is_comparison_better(f64::NAN, 0.1, true));
        assert!(!is_comparison_better(0.1, f64::NAN, true));
        assert!(is_comparison_better(0.6, 0.5, false));
    }

    #[test]
    fn test_metric_f1() {
        assert_eq!(Metric::F1.name(), "f1");
        assert!(Metric::F1.maximize());
        assert_eq!(Metric::F1.metric_fn()(&[1, 0], &[1, 0]), 1.0);
    }
}
