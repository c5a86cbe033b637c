//! The session context threaded through the six workflow stages.
//!
//! A [`Session`] owns every stage output: the raw and processed data, the
//! split, the fitted model and the last prediction. Each operation checks the
//! status of the stages it reads before doing any work, so running a step out
//! of order yields a [`ChurnError::Precondition`] or [`ChurnError::Stale`]
//! error instead of a panic, and a failed step leaves the session unchanged.
//!
//! Re-running a stage marks every downstream stage that already produced
//! output as [`StageStatus::Stale`]. Stale outputs stay inspectable but are
//! refused as inputs until the stage named in the error is re-run.

pub mod history;
pub mod stages;

pub use history::{StageEvent, StageHistory};
pub use stages::{Stage, StageStatus};

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::Path;

use crate::config::WorkflowConfig;
use crate::data::encoding::{self, EncodeReport};
use crate::data::io::DatasetStore;
use crate::data::profiling::{self, ColumnSummary};
use crate::data::split::{self, Split, SplitOptions};
use crate::data::types::Dataset;
use crate::error::{ChurnError, Result};
use crate::model::predict::{self, Prediction};
use crate::model::train::{self, TrainOptions, TrainingReport};
use crate::model::{LogisticModel, ModelStore};

#[derive(Debug, Default)]
pub struct Session {
    data: DatasetStore,
    encoding: Option<EncodeReport>,
    /// Every column encoded since the last load, with its `drop_first`
    encoded_columns: BTreeMap<String, bool>,
    split: Option<Split>,
    training: Option<TrainingReport>,
    /// Model read from the durable store when nothing was trained here
    stored_model: Option<LogisticModel>,
    last_prediction: Option<Prediction>,
    status: HashMap<Stage, StageStatus>,
    history: StageHistory,
    model_store: Option<ModelStore>,
}

impl Session {
    /// A session that keeps everything in memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that persists trained models to `store` and falls back to it
    /// when predicting before any training.
    pub fn with_model_store(store: ModelStore) -> Self {
        Self {
            model_store: Some(store),
            ..Self::default()
        }
    }

    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::with_model_store(ModelStore::new(&config.model_dir))
    }

    // ---- Stage 1: Load ----

    pub fn load(&mut self, path: &Path) -> Result<&Dataset> {
        let dataset = self.data.load(path)?;
        let detail = format!(
            "{} rows x {} columns from {}",
            dataset.height(),
            dataset.width(),
            path.display()
        );
        self.after_load(detail);
        self.loaded()
    }

    /// Uses a dataset built in memory as if it had just been loaded.
    pub fn load_dataset(&mut self, dataset: Dataset) -> Result<&Dataset> {
        let detail = format!(
            "{} rows x {} columns from memory",
            dataset.height(),
            dataset.width()
        );
        self.data.set_raw(dataset);
        self.after_load(detail);
        self.loaded()
    }

    fn after_load(&mut self, detail: String) {
        self.encoding = None;
        self.encoded_columns.clear();
        self.complete(Stage::Load, detail);
        // Processed data is a fresh copy of raw again: no encoding applies.
        self.status.insert(Stage::Encode, StageStatus::Pending);
    }

    fn loaded(&self) -> Result<&Dataset> {
        self.data
            .raw()
            .ok_or_else(|| ChurnError::Other("No dataset in the session after loading".to_owned()))
    }

    // ---- Stage 2: Visualize ----

    pub fn summarize(&mut self) -> Result<Vec<ColumnSummary>> {
        self.check_inputs(Stage::Visualize)?;
        let summaries = profiling::summarize(self.processed_for(Stage::Visualize)?)?;
        self.complete(
            Stage::Visualize,
            format!("summarized {} columns", summaries.len()),
        );
        Ok(summaries)
    }

    // ---- Stage 3: Encode ----

    /// One-hot encodes `columns` on top of every earlier encode since the last
    /// load and makes the result the processed data.
    ///
    /// The processed data is always rebuilt from raw with the union of all
    /// selections, so repeating a call yields the same table. Selecting a
    /// column again replaces its earlier `drop_first` choice.
    pub fn encode<S: AsRef<str>>(&mut self, columns: &[S], drop_first: bool) -> Result<&EncodeReport> {
        self.check_inputs(Stage::Encode)?;
        if columns.is_empty() {
            return Err(ChurnError::config("Select at least one column to encode"));
        }
        let mut selection: BTreeMap<&str, bool> = self
            .encoded_columns
            .iter()
            .map(|(name, &first)| (name.as_str(), first))
            .collect();
        for column in columns {
            selection.insert(column.as_ref(), drop_first);
        }

        let raw = self.raw_for(Stage::Encode)?;
        let encoded = encoding::encode_selection(raw, &selection)?;
        let report = encoding::encode_report(
            self.processed_for(Stage::Encode)?,
            &encoded,
            columns,
            drop_first,
        );
        if selection.len() > columns.len() {
            tracing::info!(
                "Processed data now encodes {}",
                selection.keys().copied().collect::<Vec<_>>().join(", ")
            );
        }
        self.encoded_columns = selection
            .into_iter()
            .map(|(name, first)| (name.to_owned(), first))
            .collect();

        self.data.replace_processed(encoded);
        self.complete(
            Stage::Encode,
            format!(
                "{} column(s) -> {} indicator(s), {} columns total",
                report.encoded.len(),
                report.new_columns.len(),
                report.columns_after
            ),
        );
        Ok(self.encoding.insert(report))
    }

    // ---- Stage 4: Split ----

    pub fn split(&mut self, options: &SplitOptions) -> Result<&Split> {
        self.check_inputs(Stage::Split)?;
        let result = split::split(self.processed_for(Stage::Split)?, options)?;
        for excluded in &result.excluded {
            tracing::warn!(
                "Column '{}' ({}) excluded from features: {}",
                excluded.name,
                excluded.kind,
                excluded.reason
            );
        }
        self.complete(
            Stage::Split,
            format!(
                "target '{}': {} train / {} test rows, {} features",
                result.target,
                result.train_len(),
                result.test_len(),
                result.feature_names.len()
            ),
        );
        Ok(self.split.insert(result))
    }

    // ---- Stage 5: Train ----

    /// Fits the model on the current split and, when the session has a model
    /// store, persists it.
    pub fn train(&mut self, options: &TrainOptions) -> Result<&TrainingReport> {
        self.check_inputs(Stage::Train)?;
        let split = self.split.as_ref().ok_or(ChurnError::Precondition {
            stage: Stage::Train,
            requires: Stage::Split,
        })?;
        let report = train::train(split, options)?;
        if let Some(store) = &self.model_store {
            store.save(&report.model)?;
        }

        self.complete(
            Stage::Train,
            format!(
                "accuracy {:.4}, F1 {:.4}, converged: {}",
                report.metrics.accuracy, report.metrics.f1, report.model.converged
            ),
        );
        Ok(self.training.insert(report))
    }

    // ---- Stage 6: Predict ----

    pub fn predict(&mut self, values: &BTreeMap<String, f64>, top_n: usize) -> Result<&Prediction> {
        let model = self.prediction_model()?;
        let prediction = predict::predict(model, values, top_n)?;
        self.complete(Stage::Predict, prediction.message());
        Ok(self.last_prediction.insert(prediction))
    }

    /// The model Predict would use right now.
    ///
    /// A model trained in this session wins. The durable store is only read
    /// when no model was ever trained here; a stale session model is refused
    /// rather than swapped for the stored one.
    pub fn prediction_model(&mut self) -> Result<&LogisticModel> {
        match self.status(Stage::Train) {
            StageStatus::Stale => {
                return Err(ChurnError::Stale {
                    stage: Stage::Predict,
                    rerun: Stage::Train,
                });
            }
            StageStatus::Fresh => {
                return self
                    .training
                    .as_ref()
                    .map(|report| &report.model)
                    .ok_or(ChurnError::Precondition {
                        stage: Stage::Predict,
                        requires: Stage::Train,
                    });
            }
            StageStatus::Pending => {}
        }

        if self.stored_model.is_none() {
            let loaded = self.load_stored_model()?;
            self.stored_model = Some(loaded);
        }
        self.stored_model.as_ref().ok_or(ChurnError::Precondition {
            stage: Stage::Predict,
            requires: Stage::Train,
        })
    }

    fn load_stored_model(&self) -> Result<LogisticModel> {
        let precondition = ChurnError::Precondition {
            stage: Stage::Predict,
            requires: Stage::Train,
        };
        let Some(store) = &self.model_store else {
            return Err(precondition);
        };
        match store.load() {
            Ok(model) => {
                tracing::info!("Loaded model and feature columns from {}", store.dir().display());
                Ok(model)
            }
            Err(ChurnError::Io(e)) if e.kind() == ErrorKind::NotFound => Err(precondition),
            Err(e) => Err(e),
        }
    }

    // ---- State ----

    pub fn status(&self, stage: Stage) -> StageStatus {
        self.status.get(&stage).copied().unwrap_or_default()
    }

    /// Every stage with its status, in guided order.
    pub fn statuses(&self) -> Vec<(Stage, StageStatus)> {
        Stage::ALL.iter().map(|&s| (s, self.status(s))).collect()
    }

    /// First stage in guided order that still has to run.
    ///
    /// A stale summary does not hold up guidance: no stage reads it.
    pub fn next_stage(&self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|&s| match self.status(s) {
            StageStatus::Pending => true,
            StageStatus::Stale => s != Stage::Visualize,
            StageStatus::Fresh => false,
        })
    }

    pub fn history(&self) -> &StageHistory {
        &self.history
    }

    pub fn data(&self) -> &DatasetStore {
        &self.data
    }

    /// The data as loaded.
    pub fn raw(&self) -> Option<&Dataset> {
        self.data.raw()
    }

    /// The data later stages read: raw, or its encoded replacement.
    pub fn processed(&self) -> Option<&Dataset> {
        self.data.processed()
    }

    fn raw_for(&self, stage: Stage) -> Result<&Dataset> {
        self.data.raw().ok_or(ChurnError::Precondition {
            stage,
            requires: Stage::Load,
        })
    }

    fn processed_for(&self, stage: Stage) -> Result<&Dataset> {
        self.data.processed().ok_or(ChurnError::Precondition {
            stage,
            requires: Stage::Load,
        })
    }

    pub fn encoding(&self) -> Option<&EncodeReport> {
        self.encoding.as_ref()
    }

    pub fn split_result(&self) -> Option<&Split> {
        self.split.as_ref()
    }

    pub fn training(&self) -> Option<&TrainingReport> {
        self.training.as_ref()
    }

    pub fn last_prediction(&self) -> Option<&Prediction> {
        self.last_prediction.as_ref()
    }

    pub fn target(&self) -> Option<&str> {
        self.split.as_ref().map(|s| s.target.as_str())
    }

    pub fn model_store(&self) -> Option<&ModelStore> {
        self.model_store.as_ref()
    }

    /// Refuses to run `stage` while an input is missing or out of date.
    fn check_inputs(&self, stage: Stage) -> Result<()> {
        for &upstream in stage.reads_from() {
            match self.status(upstream) {
                StageStatus::Fresh => {}
                StageStatus::Stale => {
                    return Err(ChurnError::Stale {
                        stage,
                        rerun: upstream,
                    });
                }
                StageStatus::Pending if stage.requires() == Some(upstream) => {
                    return Err(ChurnError::Precondition {
                        stage,
                        requires: upstream,
                    });
                }
                // Optional input, e.g. Split without a prior Encode.
                StageStatus::Pending => {}
            }
        }
        Ok(())
    }

    fn complete(&mut self, stage: Stage, detail: String) {
        self.status.insert(stage, StageStatus::Fresh);
        for dependent in stage.dependents() {
            if self.status(dependent) != StageStatus::Pending {
                tracing::debug!("{dependent} output is now stale");
                self.status.insert(dependent, StageStatus::Stale);
            }
        }
        tracing::info!("{stage}: {detail}");
        self.history.push(stage, detail);
    }
}
