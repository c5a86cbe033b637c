//! Seeded, stratified train/test split.
//!
//! The train partition gets `floor(rows * train_fraction)` rows. When the
//! target holds more than one class every class is split on its own:
//! class `c` with `n_c` rows contributes `floor(n_c * n_train / n)` rows to the
//! train side, and the rows left over after flooring go one at a time to the
//! classes with the largest remainders (ties to the lower class code). Each
//! class's share of the train set is therefore within `1 / n_train` of its
//! share of the full data.

use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::types::{ColumnKind, Dataset};
use crate::error::{ChurnError, Result};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SplitOptions {
    pub target: String,
    pub train_fraction: f64,
    pub seed: u64,
}

impl SplitOptions {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            train_fraction: 0.7,
            seed: 42,
        }
    }

    pub fn with_train_fraction(mut self, train_fraction: f64) -> Self {
        self.train_fraction = train_fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// How target values were turned into class codes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TargetEncoding {
    /// Integer labels 0 and 1 used as codes directly
    Identity,
    /// Other integer labels, code = position in ascending order
    Levels(Vec<i64>),
    /// false -> 0, true -> 1
    Boolean,
    /// Text categories, code = position in first-encountered order
    Categories(Vec<String>),
}

impl TargetEncoding {
    /// Original target value for a class code.
    pub fn label_for(&self, code: usize) -> Option<String> {
        match self {
            Self::Identity => Some(code.to_string()),
            Self::Levels(levels) => levels.get(code).map(ToString::to_string),
            Self::Boolean => match code {
                0 => Some("false".to_owned()),
                1 => Some("true".to_owned()),
                _ => None,
            },
            Self::Categories(categories) => categories.get(code).cloned(),
        }
    }
}

/// A column left out of the feature matrix, and why.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExcludedColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct Split {
    pub target: String,
    pub target_encoding: TargetEncoding,
    pub feature_names: Vec<String>,
    pub excluded: Vec<ExcludedColumn>,
    pub x_train: Array2<f64>,
    pub y_train: Array1<usize>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<usize>,
    /// Source row of each train sample, aligned with `x_train`
    pub train_rows: Vec<usize>,
    /// Source row of each test sample, aligned with `x_test`
    pub test_rows: Vec<usize>,
    pub stratified: bool,
}

impl Split {
    pub fn train_len(&self) -> usize {
        self.train_rows.len()
    }

    pub fn test_len(&self) -> usize {
        self.test_rows.len()
    }

    /// Share of each class code among the train labels.
    pub fn train_distribution(&self) -> BTreeMap<usize, f64> {
        class_distribution(self.y_train.iter().copied())
    }
}

pub fn class_distribution(labels: impl Iterator<Item = usize>) -> BTreeMap<usize, f64> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    let mut total = 0usize;
    for label in labels {
        *counts.entry(label).or_default() += 1;
        total += 1;
    }
    counts
        .into_iter()
        .map(|(label, count)| (label, count as f64 / total as f64))
        .collect()
}

pub fn split(dataset: &Dataset, options: &SplitOptions) -> Result<Split> {
    let fraction = options.train_fraction;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(ChurnError::config(format!(
            "Train fraction must be between 0 and 1 (exclusive), got {fraction}"
        )));
    }

    let target = options.target.as_str();
    let target_kind = dataset.kind_of(target).ok_or_else(|| {
        ChurnError::config(format!("Target column '{target}' not found in the dataset"))
    })?;
    let (codes, target_encoding) = encode_target(dataset, target, target_kind)?;

    let mut feature_names = Vec::new();
    let mut excluded = Vec::new();
    for (name, kind) in dataset.columns().filter(|(name, _)| *name != target) {
        if kind.is_model_input() {
            feature_names.push(name.to_owned());
        } else {
            excluded.push(ExcludedColumn {
                name: name.to_owned(),
                kind,
                reason: "non-numeric; one-hot encode it to use it as a feature".to_owned(),
            });
        }
    }
    if feature_names.is_empty() {
        return Err(ChurnError::config(
            "No numeric or boolean feature columns left besides the target; encode categorical columns first",
        ));
    }

    let n = dataset.height();
    let mut columns = Vec::with_capacity(feature_names.len());
    for name in &feature_names {
        let values = dataset.numeric_values(name)?;
        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            return Err(ChurnError::config(format!(
                "Feature column '{name}' has {missing} missing value(s)"
            )));
        }
        columns.push(values.into_iter().flatten().collect::<Vec<f64>>());
    }

    let n_train = (n as f64 * fraction).floor() as usize;
    if n_train == 0 || n_train >= n {
        return Err(ChurnError::config(format!(
            "A train fraction of {fraction} over {n} rows leaves an empty train or test set"
        )));
    }

    let (train_rows, test_rows, stratified) = partition(&codes, n_train, options.seed)?;

    let full = Array2::from_shape_fn((n, columns.len()), |(row, col)| {
        columns
            .get(col)
            .and_then(|values| values.get(row))
            .copied()
            .unwrap_or_default()
    });
    let labels = |rows: &[usize]| -> Array1<usize> {
        rows.iter()
            .map(|&row| codes.get(row).copied().unwrap_or_default())
            .collect()
    };

    let result = Split {
        target: target.to_owned(),
        target_encoding,
        x_train: full.select(Axis(0), &train_rows),
        y_train: labels(&train_rows),
        x_test: full.select(Axis(0), &test_rows),
        y_test: labels(&test_rows),
        feature_names,
        excluded,
        train_rows,
        test_rows,
        stratified,
    };

    tracing::info!(
        "Split {} rows into {} train / {} test (stratified: {}, seed {})",
        n,
        result.train_len(),
        result.test_len(),
        result.stratified,
        options.seed
    );
    Ok(result)
}

fn encode_target(
    dataset: &Dataset,
    target: &str,
    kind: ColumnKind,
) -> Result<(Vec<usize>, TargetEncoding)> {
    if kind == ColumnKind::Categorical {
        let values = dataset.text_values(target)?;
        check_no_missing(target, values.iter().filter(|v| v.is_none()).count())?;

        let mut categories: Vec<String> = Vec::new();
        let mut codes = Vec::with_capacity(values.len());
        for value in values.into_iter().flatten() {
            let code = match categories.iter().position(|c| *c == value) {
                Some(code) => code,
                None => {
                    categories.push(value);
                    categories.len() - 1
                }
            };
            codes.push(code);
        }
        tracing::info!("Target '{target}' is categorical; mapped to codes {categories:?}");
        return Ok((codes, TargetEncoding::Categories(categories)));
    }

    let values = dataset.numeric_values(target)?;
    check_no_missing(target, values.iter().filter(|v| v.is_none()).count())?;

    let labels = values
        .into_iter()
        .flatten()
        .map(|v| {
            if v.is_finite() && v.fract() == 0.0 {
                Ok(v as i64)
            } else {
                Err(ChurnError::config(format!(
                    "Target column '{target}' must hold integer class labels, found {v}"
                )))
            }
        })
        .collect::<Result<Vec<i64>>>()?;

    if kind == ColumnKind::Boolean {
        let codes = labels.iter().map(|&v| usize::from(v != 0)).collect();
        return Ok((codes, TargetEncoding::Boolean));
    }
    if labels.iter().all(|&v| v == 0 || v == 1) {
        let codes = labels.iter().map(|&v| usize::from(v == 1)).collect();
        return Ok((codes, TargetEncoding::Identity));
    }

    let levels: Vec<i64> = labels
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let codes = labels
        .iter()
        .map(|v| levels.binary_search(v).unwrap_or_default())
        .collect();
    tracing::info!("Target '{target}' has labels {levels:?}; mapped to codes in ascending order");
    Ok((codes, TargetEncoding::Levels(levels)))
}

fn check_no_missing(target: &str, missing: usize) -> Result<()> {
    if missing > 0 {
        return Err(ChurnError::config(format!(
            "Target column '{target}' has {missing} missing value(s)"
        )));
    }
    Ok(())
}

/// Returns (train rows, test rows, stratified), both in shuffled order.
fn partition(codes: &[usize], n_train: usize, seed: u64) -> Result<(Vec<usize>, Vec<usize>, bool)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = codes.len();

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &code) in codes.iter().enumerate() {
        by_class.entry(code).or_default().push(row);
    }

    if by_class.len() < 2 {
        let mut rows: Vec<usize> = (0..n).collect();
        rows.shuffle(&mut rng);
        let test = rows.split_off(n_train);
        return Ok((rows, test, false));
    }

    if let Some((code, _)) = by_class.iter().find(|(_, rows)| rows.len() < 2) {
        return Err(ChurnError::config(format!(
            "Target class {code} has only 1 row; stratification needs at least 2 per class"
        )));
    }

    let counts: Vec<usize> = by_class.values().map(Vec::len).collect();
    let quotas = allocate(&counts, n_train, n);

    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n - n_train);
    for (mut rows, quota) in by_class.into_values().zip(quotas) {
        rows.shuffle(&mut rng);
        let rest = rows.split_off(quota.min(rows.len()));
        train.extend(rows);
        test.extend(rest);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok((train, test, true))
}

/// Largest-remainder apportionment of `n_train` rows across classes.
fn allocate(counts: &[usize], n_train: usize, n: usize) -> Vec<usize> {
    let mut quotas: Vec<usize> = counts.iter().map(|&c| c * n_train / n).collect();
    let assigned: usize = quotas.iter().sum();

    let mut remainders: Vec<(usize, usize)> = counts
        .iter()
        .enumerate()
        .map(|(class, &c)| (class, c * n_train % n))
        .collect();
    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    for (class, _) in remainders.into_iter().take(n_train - assigned) {
        if let Some(q) = quotas.get_mut(class) {
            *q += 1;
        }
    }
    quotas
}
