use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::logistic::{DECISION_THRESHOLD, LogisticModel};
use crate::error::{ChurnError, Result};

/// Default number of contributors listed on each side.
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChurnLabel {
    Churn,
    NoChurn,
}

/// One feature's push on the log-odds of churn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FeatureContribution {
    pub feature: String,
    pub value: f64,
    pub weight: f64,
    /// `weight * value`
    pub contribution: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub label: ChurnLabel,
    pub churn_probability: f64,
    pub no_churn_probability: f64,
    pub log_odds: f64,
    /// Features pushing towards churn, largest contribution first
    pub top_positive: Vec<FeatureContribution>,
    /// Features pushing away from churn, smallest contribution first
    pub top_negative: Vec<FeatureContribution>,
}

impl Prediction {
    pub fn message(&self) -> String {
        match self.label {
            ChurnLabel::Churn => format!(
                "Customer WILL churn with probability {:.2}%",
                self.churn_probability * 100.0
            ),
            ChurnLabel::NoChurn => format!(
                "Customer will NOT churn with probability {:.2}%",
                self.no_churn_probability * 100.0
            ),
        }
    }
}

/// Scores one customer.
///
/// `values` must name every model feature and nothing else.
pub fn predict(model: &LogisticModel, values: &BTreeMap<String, f64>, top_n: usize) -> Result<Prediction> {
    if let Some(unknown) = values.keys().find(|k| !model.feature_names.contains(k)) {
        return Err(ChurnError::config(format!(
            "Unknown feature '{unknown}'; the model was trained on: {}",
            model.feature_names.join(", ")
        )));
    }
    let missing: Vec<&str> = model
        .feature_names
        .iter()
        .filter(|name| !values.contains_key(*name))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(ChurnError::config(format!(
            "Missing value(s) for feature(s): {}",
            missing.join(", ")
        )));
    }

    let x: Array1<f64> = model
        .feature_names
        .iter()
        .map(|name| values.get(name).copied().unwrap_or_default())
        .collect();
    let log_odds = model.decision_function(x.view());
    let churn_probability = super::logistic::sigmoid(log_odds);

    let contributions: Vec<FeatureContribution> = model
        .feature_names
        .iter()
        .zip(x.iter().zip(&model.weights))
        .map(|(feature, (&value, &weight))| FeatureContribution {
            feature: feature.clone(),
            value,
            weight,
            contribution: weight * value,
        })
        .collect();

    // Stable sorts keep feature order among equal contributions.
    let mut top_positive = contributions.clone();
    top_positive.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
    top_positive.truncate(top_n);

    let mut top_negative = contributions;
    top_negative.sort_by(|a, b| a.contribution.total_cmp(&b.contribution));
    top_negative.truncate(top_n);

    let label = if churn_probability >= DECISION_THRESHOLD {
        ChurnLabel::Churn
    } else {
        ChurnLabel::NoChurn
    };

    let prediction = Prediction {
        label,
        churn_probability,
        no_churn_probability: 1.0 - churn_probability,
        log_odds,
        top_positive,
        top_negative,
    };
    tracing::debug!("{}", prediction.message());
    Ok(prediction)
}
