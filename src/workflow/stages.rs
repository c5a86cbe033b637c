//! Workflow stages and the dependency graph between them

use serde::{Deserialize, Serialize};

/// The six ordered steps of the churn workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Load a CSV file into raw and processed data
    Load,
    /// Per-column summaries of the processed data
    Visualize,
    /// One-hot encode categorical columns
    Encode,
    /// Stratified train/test split
    Split,
    /// Fit, evaluate and persist the logistic model
    Train,
    /// Score a single customer
    Predict,
}

impl Stage {
    pub const ALL: [Self; 6] = [
        Self::Load,
        Self::Visualize,
        Self::Encode,
        Self::Split,
        Self::Train,
        Self::Predict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "Load Data",
            Self::Visualize => "Visualize Data",
            Self::Encode => "Encode Categoricals",
            Self::Split => "Train/Test Split",
            Self::Train => "Train & Evaluate",
            Self::Predict => "Predict",
        }
    }

    pub fn parse_stage(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "load" => Some(Self::Load),
            "visualize" | "visualise" => Some(Self::Visualize),
            "encode" => Some(Self::Encode),
            "split" => Some(Self::Split),
            "train" => Some(Self::Train),
            "predict" => Some(Self::Predict),
            _ => None,
        }
    }

    /// Position in the guided order, starting at 0
    pub fn index(&self) -> usize {
        match self {
            Self::Load => 0,
            Self::Visualize => 1,
            Self::Encode => 2,
            Self::Split => 3,
            Self::Train => 4,
            Self::Predict => 5,
        }
    }

    /// Get the next step in the guided order
    pub fn next_stage(&self) -> Option<Self> {
        match self {
            Self::Load => Some(Self::Visualize),
            Self::Visualize => Some(Self::Encode),
            Self::Encode => Some(Self::Split),
            Self::Split => Some(Self::Train),
            Self::Train => Some(Self::Predict),
            Self::Predict => None,
        }
    }

    /// The stage whose output must exist before this one may run
    pub fn requires(&self) -> Option<Self> {
        match self {
            Self::Load => None,
            Self::Visualize | Self::Encode | Self::Split => Some(Self::Load),
            Self::Train => Some(Self::Split),
            Self::Predict => Some(Self::Train),
        }
    }

    /// Stages whose output this stage reads, directly
    pub fn reads_from(&self) -> &'static [Self] {
        match self {
            Self::Load => &[],
            Self::Visualize | Self::Split => &[Self::Load, Self::Encode],
            Self::Encode => &[Self::Load],
            Self::Train => &[Self::Split],
            Self::Predict => &[Self::Train],
        }
    }

    /// Every stage that (transitively) reads this stage's output, in guided order
    pub fn dependents(&self) -> Vec<Self> {
        let mut affected = vec![*self];
        // Edges only point forward, so one pass in guided order closes the graph.
        for stage in Self::ALL {
            if stage
                .reads_from()
                .iter()
                .any(|upstream| affected.contains(upstream))
                && !affected.contains(&stage)
            {
                affected.push(stage);
            }
        }
        affected.retain(|s| s != self);
        affected
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Freshness of a stage's output within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Never ran in this session
    #[default]
    Pending,
    /// Output matches the current upstream data
    Fresh,
    /// An upstream stage re-ran; output kept but unusable until re-run
    Stale,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_stage() {
        assert_eq!(Stage::Load.next_stage(), Some(Stage::Visualize));
        assert_eq!(Stage::Predict.next_stage(), None);
        for pair in Stage::ALL.windows(2) {
            if let [a, b] = pair {
                assert_eq!(a.next_stage(), Some(*b));
                assert_eq!(a.index() + 1, b.index());
            }
        }
    }

    #[test]
    fn test_stage_string_conversion() {
        assert_eq!(Stage::Split.as_str(), "Train/Test Split");
        assert_eq!(Stage::parse_stage("Encode"), Some(Stage::Encode));
        assert_eq!(Stage::parse_stage("invalid"), None);
    }

    #[test]
    fn test_requirements() {
        assert_eq!(Stage::Load.requires(), None);
        assert_eq!(Stage::Visualize.requires(), Some(Stage::Load));
        assert_eq!(Stage::Encode.requires(), Some(Stage::Load));
        assert_eq!(Stage::Split.requires(), Some(Stage::Load));
        assert_eq!(Stage::Train.requires(), Some(Stage::Split));
        assert_eq!(Stage::Predict.requires(), Some(Stage::Train));
    }

    #[test]
    fn test_dependents_are_transitive() {
        assert_eq!(
            Stage::Load.dependents(),
            vec![
                Stage::Visualize,
                Stage::Encode,
                Stage::Split,
                Stage::Train,
                Stage::Predict
            ]
        );
        assert_eq!(
            Stage::Encode.dependents(),
            vec![Stage::Visualize, Stage::Split, Stage::Train, Stage::Predict]
        );
        assert_eq!(Stage::Split.dependents(), vec![Stage::Train, Stage::Predict]);
        assert!(Stage::Visualize.dependents().is_empty());
        assert!(Stage::Predict.dependents().is_empty());
    }
}
