//! Per-column summaries behind the "Visualize Data" step.
//!
//! Numeric columns get the figures a histogram needs (range, mean, spread and
//! fixed-width bins), categorical columns get value counts sorted by value,
//! and boolean columns get true/false counts. Nothing here renders anything;
//! callers decide how to draw the numbers.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{ColumnKind, Dataset};
use crate::error::Result;

/// Number of equal-width bins in a numeric histogram.
pub const HISTOGRAM_BINS: usize = 30;

#[derive(Clone, Deserialize, Serialize, Debug)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnKind,
    pub count: usize,
    pub nulls: usize,
    pub stats: ColumnStats,
}

impl ColumnSummary {
    pub fn null_pct(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.nulls as f64 / self.count as f64) * 100.0
        }
    }
}

#[derive(Clone, Deserialize, Serialize, Debug)]
pub enum ColumnStats {
    Numeric(NumericStats),
    Boolean(BooleanStats),
    Categorical(CategoricalStats),
}

impl ColumnStats {
    pub fn n_distinct(&self) -> usize {
        match self {
            Self::Numeric(s) => s.distinct_count,
            Self::Categorical(s) => s.counts.len(),
            Self::Boolean(s) => usize::from(s.true_count > 0) + usize::from(s.false_count > 0),
        }
    }
}

#[derive(Clone, Deserialize, Serialize, Debug, Default)]
pub struct NumericStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub distinct_count: usize,
    pub bin_width: f64,
    pub histogram: Vec<(f64, usize)>, // bin centre and count
}

#[derive(Clone, Deserialize, Serialize, Debug, Default)]
pub struct BooleanStats {
    pub true_count: usize,
    pub false_count: usize,
}

#[derive(Clone, Deserialize, Serialize, Debug, Default)]
pub struct CategoricalStats {
    /// (value, count), sorted by value
    pub counts: Vec<(String, usize)>,
}

impl CategoricalStats {
    pub fn top_value(&self) -> Option<&(String, usize)> {
        self.counts.iter().max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
    }
}

pub fn summarize(dataset: &Dataset) -> Result<Vec<ColumnSummary>> {
    let frame = dataset.frame();
    let mut summaries = Vec::with_capacity(dataset.width());

    for (name, kind) in dataset.columns() {
        let col = frame.column(name)?;
        let stats = match kind {
            ColumnKind::Numeric => ColumnStats::Numeric(analyse_numeric(col)?),
            ColumnKind::Boolean => ColumnStats::Boolean(analyse_boolean(col)?),
            ColumnKind::Categorical => ColumnStats::Categorical(analyse_categorical(col)?),
        };
        summaries.push(ColumnSummary {
            name: name.to_owned(),
            kind,
            count: col.len(),
            nulls: col.null_count(),
            stats,
        });
    }

    tracing::debug!("Summarized {} columns", summaries.len());
    Ok(summaries)
}

pub fn analyse_numeric(col: &Column) -> Result<NumericStats> {
    let series = col.as_materialized_series();
    let casted = series.cast(&DataType::Float64)?;
    let ca = casted.f64()?;

    let min = ca.min();
    let max = ca.max();
    let (bin_width, histogram) = calculate_histogram(ca, min, max);

    Ok(NumericStats {
        min,
        max,
        mean: ca.mean(),
        std_dev: ca.std(1),
        distinct_count: series.drop_nulls().n_unique()?,
        bin_width,
        histogram,
    })
}

pub fn calculate_histogram(
    ca: &Float64Chunked,
    min: Option<f64>,
    max: Option<f64>,
) -> (f64, Vec<(f64, usize)>) {
    let (Some(min), Some(max)) = (min, max) else {
        return (0.0, Vec::new());
    };
    let values = ca.into_iter().flatten().filter(|v| v.is_finite());

    if max - min <= f64::EPSILON {
        return (0.0, vec![(min, values.count())]);
    }

    let bin_width = (max - min) / HISTOGRAM_BINS as f64;
    let mut counts = vec![0usize; HISTOGRAM_BINS];
    for v in values {
        // The maximum lands on the upper edge of the last bin.
        let idx = (((v - min) / bin_width) as usize).min(HISTOGRAM_BINS - 1);
        if let Some(slot) = counts.get_mut(idx) {
            *slot += 1;
        }
    }

    let histogram = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| (min + bin_width * (i as f64 + 0.5), count))
        .collect();
    (bin_width, histogram)
}

pub fn analyse_boolean(col: &Column) -> Result<BooleanStats> {
    let series = col.as_materialized_series();
    let ca = series.bool()?;
    let true_count = ca.into_iter().flatten().filter(|v| *v).count();
    let false_count = ca.len() - ca.null_count() - true_count;
    Ok(BooleanStats {
        true_count,
        false_count,
    })
}

pub fn analyse_categorical(col: &Column) -> Result<CategoricalStats> {
    let series = col.as_materialized_series();
    let mut freq: BTreeMap<String, usize> = BTreeMap::new();
    for value in series.str()?.into_iter().flatten() {
        *freq.entry(value.to_owned()).or_default() += 1;
    }
    Ok(CategoricalStats {
        counts: freq.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> anyhow::Result<Dataset> {
        let age = Series::new("Age".into(), vec![Some(20.0), Some(50.0), None, Some(35.0)]);
        let country = Series::new(
            "Country".into(),
            vec![Some("Spain"), Some("France"), Some("Spain"), None],
        );
        let active = Series::new("IsActive".into(), vec![true, true, false, true]);
        let df = DataFrame::new(vec![
            Column::from(age),
            Column::from(country),
            Column::from(active),
        ])?;
        Ok(Dataset::from_frame(df)?)
    }

    #[test]
    fn test_summaries_follow_column_kinds() -> anyhow::Result<()> {
        let summaries = summarize(&dataset()?)?;
        assert_eq!(summaries.len(), 3);

        let age = &summaries[0];
        assert_eq!(age.nulls, 1);
        assert!((age.null_pct() - 25.0).abs() < 1e-12);
        let ColumnStats::Numeric(stats) = &age.stats else {
            panic!("Age should be numeric");
        };
        assert_eq!(stats.min, Some(20.0));
        assert_eq!(stats.max, Some(50.0));
        assert_eq!(stats.distinct_count, 3);
        assert_eq!(stats.histogram.len(), HISTOGRAM_BINS);
        let binned: usize = stats.histogram.iter().map(|(_, c)| c).sum();
        assert_eq!(binned, 3);

        let ColumnStats::Categorical(country) = &summaries[1].stats else {
            panic!("Country should be categorical");
        };
        assert_eq!(
            country.counts,
            vec![("France".to_owned(), 1), ("Spain".to_owned(), 2)]
        );
        assert_eq!(country.top_value().map(|(v, _)| v.as_str()), Some("Spain"));

        let ColumnStats::Boolean(active) = &summaries[2].stats else {
            panic!("IsActive should be boolean");
        };
        assert_eq!((active.true_count, active.false_count), (3, 1));
        assert_eq!(summaries[2].stats.n_distinct(), 2);
        Ok(())
    }

    #[test]
    fn test_constant_column_single_bin() -> anyhow::Result<()> {
        let s = Series::new("x".into(), vec![7.0, 7.0, 7.0]);
        let stats = analyse_numeric(&Column::from(s))?;
        assert_eq!(stats.bin_width, 0.0);
        assert_eq!(stats.histogram, vec![(7.0, 3)]);
        Ok(())
    }
}
