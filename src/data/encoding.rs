//! One-hot encoding of categorical columns.
//!
//! Each selected column is replaced, at its own position, by one `Int32` 0/1
//! indicator column per distinct non-null value. Indicators are named
//! `{column}_{value}` and ordered by value (byte-wise lexicographic order), so
//! the output depends only on the input data. With `drop_first` the indicator
//! for the smallest value is omitted. Null entries are 0 in every indicator.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::types::{ColumnKind, Dataset, missing_column};
use crate::error::{ChurnError, Result};

/// Before/after view of an encoding pass.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncodeReport {
    pub encoded: Vec<String>,
    pub drop_first: bool,
    pub columns_before: usize,
    pub columns_after: usize,
    pub new_columns: Vec<String>,
}

/// Columns eligible for one-hot encoding, in table order.
pub fn categorical_columns(dataset: &Dataset) -> Vec<String> {
    dataset
        .columns()
        .filter(|(_, kind)| *kind == ColumnKind::Categorical)
        .map(|(name, _)| name.to_owned())
        .collect()
}

pub fn encode<S: AsRef<str>>(dataset: &Dataset, columns: &[S], drop_first: bool) -> Result<Dataset> {
    let selection: BTreeMap<&str, bool> = columns
        .iter()
        .map(|c| (c.as_ref(), drop_first))
        .collect();
    encode_selection(dataset, &selection)
}

/// Like [`encode`], with `drop_first` chosen per column.
pub fn encode_selection(dataset: &Dataset, selection: &BTreeMap<&str, bool>) -> Result<Dataset> {
    if selection.is_empty() {
        return Err(ChurnError::config("Select at least one column to encode"));
    }
    for &name in selection.keys() {
        match dataset.kind_of(name) {
            Some(ColumnKind::Categorical) => {}
            Some(kind) => {
                return Err(ChurnError::config(format!(
                    "Column '{name}' is {kind}; only categorical columns can be one-hot encoded"
                )));
            }
            None => return Err(missing_column(name)),
        }
    }

    let mut taken: HashSet<String> = dataset
        .columns()
        .filter(|(name, _)| !selection.contains_key(name))
        .map(|(name, _)| name.to_owned())
        .collect();

    let mut out_columns = Vec::new();
    let mut kinds = Vec::new();

    for (col, (name, kind)) in dataset.frame().get_columns().iter().zip(dataset.columns()) {
        let Some(&drop_first) = selection.get(name) else {
            out_columns.push(col.clone());
            kinds.push(kind);
            continue;
        };

        let series = col.as_materialized_series();
        let values: Vec<Option<&str>> = series.str()?.into_iter().collect();
        let categories: BTreeSet<&str> = values.iter().flatten().copied().collect();

        for category in categories.iter().skip(usize::from(drop_first)) {
            let indicator_name = format!("{name}_{category}");
            if !taken.insert(indicator_name.clone()) {
                return Err(ChurnError::config(format!(
                    "Encoding '{name}' would create column '{indicator_name}', which already exists"
                )));
            }
            let indicator: Vec<i32> = values
                .iter()
                .map(|v| i32::from(*v == Some(*category)))
                .collect();
            out_columns.push(Column::from(Series::new(indicator_name.into(), indicator)));
            kinds.push(ColumnKind::Numeric);
        }
    }

    let encoded = Dataset::with_kinds(DataFrame::new(out_columns)?, kinds)?;
    tracing::info!(
        "One-hot encoded {} column(s): {} -> {} columns",
        selection.len(),
        dataset.width(),
        encoded.width()
    );
    Ok(encoded)
}

/// Summarizes which columns an encoding pass added.
pub fn encode_report<S: AsRef<str>>(
    before: &Dataset,
    after: &Dataset,
    columns: &[S],
    drop_first: bool,
) -> EncodeReport {
    let previous: HashSet<&str> = before.columns().map(|(name, _)| name).collect();
    EncodeReport {
        encoded: columns.iter().map(|c| c.as_ref().to_owned()).collect(),
        drop_first,
        columns_before: before.width(),
        columns_after: after.width(),
        new_columns: after
            .columns()
            .filter(|(name, _)| !previous.contains(name))
            .map(|(name, _)| name.to_owned())
            .collect(),
    }
}
