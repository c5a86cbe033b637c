use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::data::split::TargetEncoding;
use crate::error::{ChurnError, Result};

/// Probability at or above which a customer is classified as churning.
pub const DECISION_THRESHOLD: f64 = 0.5;

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// A fitted binary logistic regression.
///
/// `weights[i]` belongs to `feature_names[i]`; the weights always score class
/// code 1 (churn) as the positive class.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogisticModel {
    pub target: String,
    pub target_encoding: TargetEncoding,
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub bias: f64,
    /// Inverse regularization strength `C` the model was fitted with
    pub regularization: f64,
    pub converged: bool,
}

impl LogisticModel {
    pub fn new(
        target: impl Into<String>,
        target_encoding: TargetEncoding,
        feature_names: Vec<String>,
        weights: Vec<f64>,
        bias: f64,
    ) -> Result<Self> {
        if feature_names.len() != weights.len() {
            return Err(ChurnError::config(format!(
                "{} weights supplied for {} features",
                weights.len(),
                feature_names.len()
            )));
        }
        Ok(Self {
            target: target.into(),
            target_encoding,
            feature_names,
            weights,
            bias,
            regularization: 1.0,
            converged: true,
        })
    }

    pub fn with_regularization(mut self, c: f64) -> Self {
        self.regularization = c;
        self
    }

    pub fn with_converged(mut self, converged: bool) -> Self {
        self.converged = converged;
        self
    }

    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    /// Log-odds of churn, `w·x + b`.
    pub fn decision_function(&self, x: ArrayView1<'_, f64>) -> f64 {
        self.weights
            .iter()
            .zip(x.iter())
            .map(|(w, v)| w * v)
            .sum::<f64>()
            + self.bias
    }

    pub fn probability(&self, x: ArrayView1<'_, f64>) -> f64 {
        sigmoid(self.decision_function(x))
    }

    /// Weights paired with their feature names, strongest effect first.
    pub fn ranked_weights(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .feature_names
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn model() -> anyhow::Result<LogisticModel> {
        Ok(LogisticModel::new(
            "Exited",
            TargetEncoding::Identity,
            vec!["Age".to_owned(), "IsActiveMember".to_owned()],
            vec![0.05, -1.2],
            -2.0,
        )?)
    }

    #[test]
    fn test_sigmoid_is_stable_at_extremes() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-15);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_probability_matches_log_odds() -> anyhow::Result<()> {
        let m = model()?;
        let x = array![40.0, 1.0];
        let z = 0.05 * 40.0 - 1.2 - 2.0;
        assert!((m.decision_function(x.view()) - z).abs() < 1e-12);
        assert!((m.probability(x.view()) - sigmoid(z)).abs() < 1e-15);
        Ok(())
    }

    #[test]
    fn test_weight_count_must_match_features() {
        let result = LogisticModel::new(
            "Exited",
            TargetEncoding::Identity,
            vec!["Age".to_owned()],
            vec![0.1, 0.2],
            0.0,
        );
        assert!(matches!(result, Err(ChurnError::Config(_))));
    }

    #[test]
    fn test_ranked_weights() -> anyhow::Result<()> {
        let m = model()?;
        assert_eq!(m.ranked_weights().first().map(|(n, _)| *n), Some("IsActiveMember"));
        Ok(())
    }
}
