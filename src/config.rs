use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::split::SplitOptions;
use crate::error::{ChurnError, Result, ResultExt as _};
use crate::model::predict::DEFAULT_TOP_N;
use crate::model::train::TrainOptions;

pub const CONFIG_FILE: &str = "config.json";

/// Defaults for every workflow step. Missing fields in a config file fall back
/// to these values.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// CSV used when no file is named explicitly
    pub data_path: PathBuf,
    /// Where the trained model and its feature list are stored
    pub model_dir: PathBuf,
    pub target: String,
    pub train_fraction: f64,
    pub seed: u64,
    /// Inverse regularization strength (C)
    pub regularization: f64,
    pub max_iterations: u64,
    pub gradient_tolerance: f64,
    /// Contributors listed on each side of a prediction
    pub top_n: usize,
    pub drop_first: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data").join("Churn_Modelling.csv"),
            model_dir: PathBuf::from("models"),
            target: "Exited".to_owned(),
            train_fraction: 0.7,
            seed: 42,
            regularization: 1.0,
            max_iterations: 1000,
            gradient_tolerance: 1e-4,
            top_n: DEFAULT_TOP_N,
            drop_first: true,
        }
    }
}

impl WorkflowConfig {
    pub fn split_options(&self) -> SplitOptions {
        SplitOptions::new(self.target.clone())
            .with_train_fraction(self.train_fraction)
            .with_seed(self.seed)
    }

    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            c: self.regularization,
            max_iterations: self.max_iterations,
            gradient_tolerance: self.gradient_tolerance,
        }
    }
}

/// Per-user config location, e.g. `~/.config/churnflow/config.json` on Linux.
pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("churnflow").join(CONFIG_FILE))
}

/// Reads a config file; an absent file yields the defaults.
pub fn load_config(path: &Path) -> Result<WorkflowConfig> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(WorkflowConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| ChurnError::config(format!("Invalid config file {}: {e}", path.display())))
}

pub fn save_config(config: &WorkflowConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let config = load_config(&dir.path().join(CONFIG_FILE))?;
        assert_eq!(config, WorkflowConfig::default());
        assert_eq!(config.split_options(), SplitOptions::new("Exited"));
        assert_eq!(config.train_options(), TrainOptions::default());
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "target": "Churned", "seed": 7 }"#)?;

        let config = load_config(&path)?;
        assert_eq!(config.target, "Churned");
        assert_eq!(config.seed, 7);
        assert_eq!(config.train_fraction, 0.7);
        assert_eq!(config.max_iterations, 1000);
        Ok(())
    }

    #[test]
    fn test_save_round_trip_and_invalid_json() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = WorkflowConfig {
            regularization: 0.25,
            drop_first: false,
            ..WorkflowConfig::default()
        };
        save_config(&config, &path)?;
        assert_eq!(load_config(&path)?, config);

        std::fs::write(&path, "{ not json")?;
        assert!(matches!(load_config(&path), Err(ChurnError::Config(_))));
        Ok(())
    }
}
