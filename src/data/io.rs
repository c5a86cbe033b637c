use polars::prelude::*;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::types::Dataset;
use crate::error::{ChurnError, Result};

/// Rows scanned to infer column types.
pub const INFER_SCHEMA_ROWS: usize = 10_000;

/// Reads a delimited text file with a header row.
///
/// Fails with [`ChurnError::Io`] when the file cannot be read, is not valid
/// delimited text, or holds no data rows.
pub fn load_csv(path: &Path) -> Result<Dataset> {
    // Surface a missing file as NotFound rather than a parser message.
    std::fs::metadata(path).map_err(|e| {
        ChurnError::Io(std::io::Error::new(
            e.kind(),
            format!("Cannot read {}: {e}", path.display()),
        ))
    })?;

    let frame = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .finish()
        .and_then(LazyFrame::collect)
        .map_err(|e| malformed(path, &e.to_string()))?;

    if frame.width() == 0 {
        return Err(malformed(path, "no columns found"));
    }
    if frame.height() == 0 {
        return Err(malformed(path, "no data rows found"));
    }

    tracing::info!(
        "Loaded {} rows x {} columns from {}",
        frame.height(),
        frame.width(),
        path.display()
    );
    Dataset::from_frame(frame)
}

fn malformed(path: &Path, reason: &str) -> ChurnError {
    ChurnError::Io(std::io::Error::new(
        ErrorKind::InvalidData,
        format!("{} is not valid delimited tabular text: {reason}", path.display()),
    ))
}

/// Raw and processed copies of the session's dataset.
///
/// `raw` is never modified after loading; `processed` starts as a copy of it
/// and is only ever replaced wholesale.
#[derive(Clone, Debug, Default)]
pub struct DatasetStore {
    raw: Option<Dataset>,
    processed: Option<Dataset>,
    source: Option<PathBuf>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a file and makes it both the raw and the processed dataset.
    pub fn load(&mut self, path: &Path) -> Result<&Dataset> {
        let dataset = load_csv(path)?;
        self.processed = Some(dataset.clone());
        self.source = Some(path.to_path_buf());
        Ok(self.raw.insert(dataset))
    }

    /// Installs an already built dataset (e.g. one assembled in memory).
    pub fn set_raw(&mut self, dataset: Dataset) -> &Dataset {
        self.source = None;
        self.processed = Some(dataset.clone());
        self.raw.insert(dataset)
    }

    pub fn replace_processed(&mut self, dataset: Dataset) {
        self.processed = Some(dataset);
    }

    pub fn raw(&self) -> Option<&Dataset> {
        self.raw.as_ref()
    }

    pub fn processed(&self) -> Option<&Dataset> {
        self.processed.as_ref()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::ColumnKind;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> anyhow::Result<PathBuf> {
        let path = dir.path().join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    #[test]
    fn test_load_csv_assigns_kinds() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = write(
            &dir,
            "churn.csv",
            "Age,Country,Balance,Exited\n42,France,0.0,1\n35,Spain,1250.5,0\n51,Germany,98000.25,0\n",
        )?;

        let ds = load_csv(&path)?;
        assert_eq!(ds.height(), 3);
        assert_eq!(ds.column_names(), vec!["Age", "Country", "Balance", "Exited"]);
        assert_eq!(ds.kind_of("Country"), Some(ColumnKind::Categorical));
        assert_eq!(ds.kind_of("Balance"), Some(ColumnKind::Numeric));
        assert_eq!(ds.kind_of("Exited"), Some(ColumnKind::Numeric));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_csv(Path::new("does/not/exist.csv")).unwrap_err();
        match err {
            ChurnError::Io(e) => assert_eq!(e.kind(), ErrorKind::NotFound),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_file_is_io_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = write(&dir, "empty.csv", "")?;
        assert!(matches!(load_csv(&path), Err(ChurnError::Io(_))));
        Ok(())
    }

    #[test]
    fn test_header_only_is_io_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = write(&dir, "header.csv", "Age,Country,Exited\n")?;
        assert!(matches!(load_csv(&path), Err(ChurnError::Io(_))));
        Ok(())
    }

    #[test]
    fn test_store_keeps_raw_when_processed_replaced() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = write(&dir, "churn.csv", "Age,Country\n42,France\n35,Spain\n")?;

        let mut store = DatasetStore::new();
        assert!(store.raw().is_none());
        assert!(store.processed().is_none());

        store.load(&path)?;
        assert_eq!(store.source(), Some(path.as_path()));

        let raw = store
            .raw()
            .ok_or_else(|| anyhow::anyhow!("raw dataset missing after load"))?;
        let age_only = Dataset::with_kinds(raw.frame().select(["Age"])?, vec![ColumnKind::Numeric])?;
        store.replace_processed(age_only);

        assert_eq!(store.raw().map(Dataset::width), Some(2));
        assert_eq!(store.processed().map(Dataset::width), Some(1));
        Ok(())
    }
}
