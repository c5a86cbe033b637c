use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ChurnError, Result};

/// Logical type of a column, fixed when the data is loaded.
#[derive(Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Debug)]
pub enum ColumnKind {
    Numeric,
    Boolean,
    Categorical,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "Numeric",
            Self::Boolean => "Boolean",
            Self::Categorical => "Categorical",
        }
    }

    /// Anything that is neither boolean nor numeric is treated as categorical text.
    pub fn from_dtype(dtype: &DataType) -> Self {
        if dtype.is_bool() {
            Self::Boolean
        } else if dtype.is_primitive_numeric() {
            Self::Numeric
        } else {
            Self::Categorical
        }
    }

    /// Whether the column can feed the linear model as-is
    pub fn is_model_input(&self) -> bool {
        matches!(self, Self::Numeric | Self::Boolean)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    pub dtype: String,
}

/// A table whose columns each carry an explicit [`ColumnKind`].
///
/// Categorical columns are always stored as UTF-8 strings. The kinds travel
/// with the frame, so later stages never re-inspect dtypes to decide how to
/// treat a column.
#[derive(Clone, Debug)]
pub struct Dataset {
    frame: DataFrame,
    kinds: Vec<ColumnKind>,
}

impl Dataset {
    /// Assigns a kind to every column of a freshly loaded frame.
    pub fn from_frame(frame: DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(frame.width());
        let mut kinds = Vec::with_capacity(frame.width());

        for col in frame.get_columns() {
            let kind = ColumnKind::from_dtype(col.dtype());
            if kind == ColumnKind::Categorical && col.dtype() != &DataType::String {
                let series = col.as_materialized_series().cast(&DataType::String)?;
                columns.push(Column::from(series));
            } else {
                columns.push(col.clone());
            }
            kinds.push(kind);
        }

        Self::with_kinds(DataFrame::new(columns)?, kinds)
    }

    /// Wraps a frame whose kinds are already known, e.g. after encoding.
    pub fn with_kinds(frame: DataFrame, kinds: Vec<ColumnKind>) -> Result<Self> {
        if frame.width() != kinds.len() {
            return Err(ChurnError::DataProcessing(format!(
                "{} column kinds supplied for {} columns",
                kinds.len(),
                frame.width()
            )));
        }
        Ok(Self { frame, kinds })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    /// Column names paired with their kinds, in table order
    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnKind)> + '_ {
        self.frame
            .get_columns()
            .iter()
            .zip(self.kinds.iter().copied())
            .map(|(col, kind)| (col.name().as_str(), kind))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().map(|(name, _)| name.to_owned()).collect()
    }

    pub fn schema_info(&self) -> Vec<ColumnInfo> {
        self.frame
            .get_columns()
            .iter()
            .zip(&self.kinds)
            .map(|(col, kind)| ColumnInfo {
                name: col.name().to_string(),
                kind: *kind,
                dtype: col.dtype().to_string(),
            })
            .collect()
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.columns()
            .find(|(col, _)| *col == name)
            .map(|(_, kind)| kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    /// Values of a numeric or boolean column as `f64` (booleans become 0/1).
    pub fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        match self.kind_of(name) {
            Some(ColumnKind::Numeric | ColumnKind::Boolean) => {}
            Some(kind) => {
                return Err(ChurnError::config(format!(
                    "Column '{name}' is {kind}, expected a numeric or boolean column"
                )));
            }
            None => return Err(missing_column(name)),
        }
        let casted = self
            .frame
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let ca = casted.f64()?;
        Ok(ca.into_iter().collect())
    }

    /// Values of a categorical column.
    pub fn text_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        match self.kind_of(name) {
            Some(ColumnKind::Categorical) => {}
            Some(kind) => {
                return Err(ChurnError::config(format!(
                    "Column '{name}' is {kind}, expected a categorical column"
                )));
            }
            None => return Err(missing_column(name)),
        }
        let series = self.frame.column(name)?.as_materialized_series();
        Ok(series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_owned))
            .collect())
    }

    /// Serializes the table as CSV with a header row.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut df = self.frame.clone();
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf)
            .include_header(true)
            .finish(&mut df)?;
        Ok(buf)
    }
}

pub(crate) fn missing_column(name: &str) -> ChurnError {
    ChurnError::config(format!("Column '{name}' not found"))
}
