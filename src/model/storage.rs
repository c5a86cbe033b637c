//! Durable copy of the last trained model.
//!
//! Two JSON files live in the store directory: the full model and, next to it,
//! the ordered feature list the model expects. Both are overwritten on every
//! save.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::logistic::LogisticModel;
use crate::error::{ChurnError, Result, ResultExt as _};

pub const MODEL_FILE: &str = "logistic_model.json";
pub const FEATURES_FILE: &str = "feature_columns.json";

#[derive(Clone, Debug)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn features_path(&self) -> PathBuf {
        self.dir.join(FEATURES_FILE)
    }

    pub fn exists(&self) -> bool {
        self.model_path().is_file() && self.features_path().is_file()
    }

    pub fn save(&self, model: &LogisticModel) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create model directory {}", self.dir.display()))?;
        fs::write(self.model_path(), serde_json::to_string_pretty(model)?)
            .context("Failed to write model file")?;
        fs::write(
            self.features_path(),
            serde_json::to_string_pretty(&model.feature_names)?,
        )
        .context("Failed to write feature list")?;
        tracing::info!("Saved model to {}", self.dir.display());
        Ok(())
    }

    /// Reads the model back; a missing, unparsable or inconsistent pair of
    /// files is an I/O error.
    pub fn load(&self) -> Result<LogisticModel> {
        let model: LogisticModel = read_json(&self.model_path())?;
        let features: Vec<String> = read_json(&self.features_path())?;

        if features != model.feature_names || model.weights.len() != features.len() {
            return Err(ChurnError::Io(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("{FEATURES_FILE} does not match the feature list in {MODEL_FILE}"),
            )));
        }

        tracing::info!(
            "Loaded model with {} features from {}",
            features.len(),
            self.dir.display()
        );
        Ok(model)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| {
        ChurnError::Io(std::io::Error::new(
            e.kind(),
            format!("Cannot read {}: {e}", path.display()),
        ))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        ChurnError::Io(std::io::Error::new(
            ErrorKind::InvalidData,
            format!("{} is not a valid model artifact: {e}", path.display()),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::split::TargetEncoding;
    use tempfile::TempDir;

    fn model() -> anyhow::Result<LogisticModel> {
        Ok(LogisticModel::new(
            "Exited",
            TargetEncoding::Categories(vec!["No".to_owned(), "Yes".to_owned()]),
            vec!["Age".to_owned(), "Geography_Germany".to_owned()],
            vec![0.043_129_871_5, 0.781_234_567_890_123],
            -3.217_650_094_116_4,
        )?
        .with_regularization(0.5)
        .with_converged(false))
    }

    #[test]
    fn test_save_then_load_is_exact() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = ModelStore::new(dir.path().join("models"));
        assert!(!store.exists());

        let original = model()?;
        store.save(&original)?;
        assert!(store.exists());
        assert_eq!(store.load()?, original);
        Ok(())
    }

    #[test]
    fn test_shortest_repr_floats_load_bit_identical() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = ModelStore::new(dir.path());
        // Values whose shortest decimal form needs 17 significant digits
        let weights = vec![-3.723_973_441_856_864_4, 0.1 + 0.2, 1.0 / 3.0, 5e-324];
        let names = (0..weights.len()).map(|i| format!("f{i}")).collect();
        let original = LogisticModel::new(
            "Exited",
            TargetEncoding::Identity,
            names,
            weights.clone(),
            -3.723_973_441_856_864_4,
        )?;
        store.save(&original)?;

        let loaded = store.load()?;
        for (a, b) in loaded.weights.iter().zip(&weights) {
            assert_eq!(a.to_bits(), b.to_bits(), "{a} vs {b}");
        }
        assert_eq!(loaded.bias.to_bits(), original.bias.to_bits());
        Ok(())
    }

    #[test]
    fn test_missing_store_is_not_found() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = ModelStore::new(dir.path());
        match store.load() {
            Err(ChurnError::Io(e)) => assert_eq!(e.kind(), ErrorKind::NotFound),
            other => panic!("expected NotFound, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_mismatched_feature_file_rejected() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = ModelStore::new(dir.path());
        store.save(&model()?)?;
        fs::write(store.features_path(), r#"["Age"]"#)?;
        assert!(matches!(store.load(), Err(ChurnError::Io(_))));

        fs::write(store.model_path(), "not json")?;
        assert!(matches!(store.load(), Err(ChurnError::Io(_))));
        Ok(())
    }
}
