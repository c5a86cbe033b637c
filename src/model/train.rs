use linfa::traits::{Fit as _, Predict as _};
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::logistic::{DECISION_THRESHOLD, LogisticModel};
use super::metrics::Metrics;
use crate::data::split::Split;
use crate::error::{ChurnError, Result};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrainOptions {
    /// Inverse regularization strength; the L2 penalty is `1 / c`
    pub c: f64,
    pub max_iterations: u64,
    pub gradient_tolerance: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iterations: 1000,
            gradient_tolerance: 1e-4,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model: LogisticModel,
    pub metrics: Metrics,
    /// p(churn) for every test row, aligned with `Split::test_rows`
    pub test_probabilities: Vec<f64>,
    pub test_predictions: Vec<usize>,
    /// Infinity norm of the penalized log-loss gradient at the fitted weights
    pub gradient_norm: f64,
    pub duration: Duration,
    pub interpretation: Vec<String>,
}

pub fn train(split: &Split, options: &TrainOptions) -> Result<TrainingReport> {
    let start = Instant::now();
    validate(split, options)?;

    let dataset = linfa::Dataset::new(split.x_train.clone(), split.y_train.clone());
    let fitted = LogisticRegression::default()
        .alpha(1.0 / options.c)
        .with_intercept(true)
        .max_iterations(options.max_iterations)
        .gradient_tolerance(options.gradient_tolerance)
        .fit(&dataset)
        .map_err(|e| ChurnError::DataProcessing(format!("Logistic regression training failed: {e}")))?;

    let mut weights = fitted.params().clone();
    let mut bias = fitted.intercept();

    // The estimator picks its own positive class; re-orient so class 1 is positive.
    let predicted: Array1<usize> = fitted.predict(&split.x_train);
    if scores_class_zero(&split.x_train, &weights, bias, &predicted) {
        weights.mapv_inplace(|w| -w);
        bias = -bias;
    }

    let alpha = 1.0 / options.c;
    let gradient_norm = penalized_gradient_norm(&split.x_train, &split.y_train, &weights, bias, alpha);
    let converged = gradient_norm <= options.gradient_tolerance * split.train_len() as f64;
    if !converged {
        tracing::warn!(
            "ConvergenceWarning: logistic regression did not converge within {} iterations (gradient norm {:.3e}); consider scaling features or raising the iteration cap",
            options.max_iterations,
            gradient_norm
        );
    }

    let model = LogisticModel::new(
        split.target.clone(),
        split.target_encoding.clone(),
        split.feature_names.clone(),
        weights.to_vec(),
        bias,
    )?
    .with_regularization(options.c)
    .with_converged(converged);

    let test_probabilities: Vec<f64> = split
        .x_test
        .axis_iter(Axis(0))
        .map(|row| model.probability(row))
        .collect();
    let test_predictions: Vec<usize> = test_probabilities
        .iter()
        .map(|&p| usize::from(p >= DECISION_THRESHOLD))
        .collect();
    let actual = split.y_test.to_vec();
    let metrics = Metrics::compute(&actual, &test_predictions)?;

    tracing::info!(
        "Trained logistic regression on {} rows x {} features: accuracy {:.4}, F1 {:.4}",
        split.train_len(),
        model.n_features(),
        metrics.accuracy,
        metrics.f1
    );

    let interpretation = interpret(&model, &metrics);
    Ok(TrainingReport {
        model,
        metrics,
        test_probabilities,
        test_predictions,
        gradient_norm,
        duration: start.elapsed(),
        interpretation,
    })
}

fn validate(split: &Split, options: &TrainOptions) -> Result<()> {
    if !(options.c.is_finite() && options.c > 0.0) {
        return Err(ChurnError::config(format!(
            "Regularization strength C must be a positive number, got {}",
            options.c
        )));
    }
    if options.max_iterations == 0 {
        return Err(ChurnError::config("Iteration cap must be at least 1"));
    }

    let has_class = |labels: &Array1<usize>, class: usize| labels.iter().any(|&y| y == class);
    if let Some(bad) = split.y_train.iter().chain(split.y_test.iter()).find(|&&y| y > 1) {
        return Err(ChurnError::config(format!(
            "Target '{}' has class code {bad}; logistic regression needs a binary target",
            split.target
        )));
    }
    if !(has_class(&split.y_train, 0) && has_class(&split.y_train, 1)) {
        return Err(ChurnError::config(format!(
            "Training labels for '{}' must contain both classes 0 and 1",
            split.target
        )));
    }
    Ok(())
}

/// True when positive margins coincide with the estimator predicting class 0.
fn scores_class_zero(x: &Array2<f64>, w: &Array1<f64>, b: f64, predicted: &Array1<usize>) -> bool {
    let margins = x.dot(w) + b;
    margins
        .iter()
        .zip(predicted)
        .max_by(|l, r| l.0.abs().total_cmp(&r.0.abs()))
        .is_some_and(|(&m, &p)| m != 0.0 && (m > 0.0) != (p == 1))
}

/// `max |X^T (sigmoid(Xw + b) - y) + alpha * w|`, bias term included.
fn penalized_gradient_norm(
    x: &Array2<f64>,
    y: &Array1<usize>,
    w: &Array1<f64>,
    b: f64,
    alpha: f64,
) -> f64 {
    let residual: Array1<f64> = (x.dot(w) + b)
        .iter()
        .zip(y)
        .map(|(&z, &label)| super::logistic::sigmoid(z) - label as f64)
        .collect();
    let grad_w = x.t().dot(&residual) + &(w * alpha);
    let grad_b = residual.sum();
    grad_w.iter().fold(grad_b.abs(), |acc, g| acc.max(g.abs()))
}

fn interpret(model: &LogisticModel, metrics: &Metrics) -> Vec<String> {
    let target = &model.target;
    let pct = metrics.accuracy * 100.0;
    let mut lines = vec![format!(
        "The model correctly identifies the '{target}' category {pct:.1}% of the time."
    )];
    if metrics.accuracy > 0.8 {
        lines.push("This is considered a very reliable classification.".to_owned());
    } else if metrics.accuracy < 0.6 {
        lines.push(
            "The model is not much better than a coin flip; consider adding more relevant features."
                .to_owned(),
        );
    }
    for (name, weight) in model.ranked_weights().into_iter().take(3) {
        let direction = if weight > 0.0 { "raises" } else { "lowers" };
        lines.push(format!("Primary Driver: a higher '{name}' {direction} the churn risk."));
    }
    if !model.converged {
        lines.push(
            "The optimizer stopped before converging; the weights may be imprecise.".to_owned(),
        );
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::split::{SplitOptions, split};
    use crate::data::types::Dataset;
    use polars::prelude::*;

    /// Churn driven by a single, well separated feature.
    fn separable_split() -> anyhow::Result<Split> {
        let n = 200;
        let score: Vec<f64> = (0..n).map(|i| (i % 20) as f64 / 10.0 - 1.0).collect();
        let noise: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64 / 11.0).collect();
        let exited: Vec<i64> = score.iter().map(|&s| i64::from(s > 0.0)).collect();
        let df = DataFrame::new(vec![
            Column::from(Series::new("Score".into(), score)),
            Column::from(Series::new("Noise".into(), noise)),
            Column::from(Series::new("Exited".into(), exited)),
        ])?;
        let ds = Dataset::from_frame(df)?;
        Ok(split(&ds, &SplitOptions::new("Exited"))?)
    }

    #[test]
    fn test_train_scores_churn_as_positive() -> anyhow::Result<()> {
        let s = separable_split()?;
        let report = train(&s, &TrainOptions::default())?;

        assert_eq!(report.model.feature_names, vec!["Score", "Noise"]);
        assert!(report.model.weights[0] > 0.0, "{:?}", report.model.weights);
        assert!(report.metrics.accuracy > 0.9, "{:?}", report.metrics);
        assert_eq!(report.test_probabilities.len(), s.test_len());
        assert_eq!(report.metrics.confusion.total(), s.test_len());
        Ok(())
    }

    #[test]
    fn test_probabilities_come_from_stored_weights() -> anyhow::Result<()> {
        let s = separable_split()?;
        let report = train(&s, &TrainOptions::default())?;
        for (row, &p) in s.x_test.axis_iter(Axis(0)).zip(&report.test_probabilities) {
            assert!((report.model.probability(row) - p).abs() < 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_invalid_options_rejected() -> anyhow::Result<()> {
        let s = separable_split()?;
        for options in [
            TrainOptions { c: 0.0, ..TrainOptions::default() },
            TrainOptions { c: f64::INFINITY, ..TrainOptions::default() },
            TrainOptions { max_iterations: 0, ..TrainOptions::default() },
        ] {
            assert!(
                matches!(train(&s, &options), Err(ChurnError::Config(_))),
                "{options:?}"
            );
        }
        Ok(())
    }

    #[test]
    fn test_non_binary_target_rejected() -> anyhow::Result<()> {
        let mut s = separable_split()?;
        s.y_train.mapv_inplace(|y| y * 2);
        assert!(matches!(
            train(&s, &TrainOptions::default()),
            Err(ChurnError::Config(_))
        ));
        Ok(())
    }

    #[test]
    fn test_gradient_norm_zero_at_optimum_of_trivial_problem() {
        // Balanced labels on a zero feature: w = 0, b = 0 is optimal.
        let x = Array2::<f64>::zeros((4, 1));
        let y = Array1::from(vec![0, 1, 0, 1]);
        let w = Array1::from(vec![0.0]);
        assert!(penalized_gradient_norm(&x, &y, &w, 0.0, 1.0).abs() < 1e-12);
    }
}
