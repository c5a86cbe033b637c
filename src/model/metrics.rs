//! Binary classification metrics. Undefined ratios are reported as 0.

use serde::{Deserialize, Serialize};

use crate::error::{ChurnError, Result};

/// 2x2 confusion matrix, `counts[actual][predicted]`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn from_labels(actual: &[usize], predicted: &[usize]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(ChurnError::DataProcessing(format!(
                "{} actual labels but {} predictions",
                actual.len(),
                predicted.len()
            )));
        }
        let mut counts = [[0usize; 2]; 2];
        for (&a, &p) in actual.iter().zip(predicted) {
            let cell = counts.get_mut(a).and_then(|row| row.get_mut(p)).ok_or_else(|| {
                ChurnError::config(format!("Label pair ({a}, {p}) is not binary"))
            })?;
            *cell += 1;
        }
        Ok(Self { counts })
    }

    pub fn true_negatives(&self) -> usize {
        self.counts[0][0]
    }

    pub fn false_positives(&self) -> usize {
        self.counts[0][1]
    }

    pub fn false_negatives(&self) -> usize {
        self.counts[1][0]
    }

    pub fn true_positives(&self) -> usize {
        self.counts[1][1]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<22}{:>12}{:>12}", "", "Predicted 0", "Predicted 1")?;
        writeln!(
            f,
            "{:<22}{:>12}{:>12}",
            "Actual 0 (No Churn)",
            self.true_negatives(),
            self.false_positives()
        )?;
        write!(
            f,
            "{:<22}{:>12}{:>12}",
            "Actual 1 (Churn)",
            self.false_negatives(),
            self.true_positives()
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
}

impl Metrics {
    pub fn compute(actual: &[usize], predicted: &[usize]) -> Result<Self> {
        let confusion = ConfusionMatrix::from_labels(actual, predicted)?;
        let tp = confusion.true_positives() as f64;
        let fp = confusion.false_positives() as f64;
        let fn_ = confusion.false_negatives() as f64;

        let accuracy = ratio(
            (confusion.true_positives() + confusion.true_negatives()) as f64,
            confusion.total() as f64,
        );
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = ratio(2.0 * precision * recall, precision + recall);

        Ok(Self {
            accuracy,
            precision,
            recall,
            f1,
            confusion,
        })
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_on_known_labels() -> anyhow::Result<()> {
        let actual = [1, 1, 1, 0, 0, 0, 0, 1];
        let predicted = [1, 0, 1, 0, 1, 0, 0, 1];
        let m = Metrics::compute(&actual, &predicted)?;

        assert_eq!(m.confusion.counts, [[3, 1], [1, 3]]);
        assert!((m.accuracy - 0.75).abs() < 1e-12);
        assert!((m.precision - 0.75).abs() < 1e-12);
        assert!((m.recall - 0.75).abs() < 1e-12);
        assert!((m.f1 - 0.75).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_undefined_ratios_are_zero() -> anyhow::Result<()> {
        let m = Metrics::compute(&[0, 0, 1], &[0, 0, 0])?;
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert!((m.accuracy - 2.0 / 3.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_rejects_mismatched_or_non_binary() {
        assert!(Metrics::compute(&[0, 1], &[0]).is_err());
        assert!(Metrics::compute(&[0, 2], &[0, 1]).is_err());
    }

    #[test]
    fn test_display_has_labelled_rows() -> anyhow::Result<()> {
        let cm = ConfusionMatrix::from_labels(&[0, 1], &[0, 1])?;
        let text = cm.to_string();
        assert!(text.contains("Actual 1 (Churn)"));
        assert!(text.contains("Predicted 0"));
        Ok(())
    }
}
