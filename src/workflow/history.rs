//! Append-only log of completed stages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stages::Stage;

const MAX_ENTRIES: usize = 1000;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StageEvent {
    pub timestamp: DateTime<Utc>,
    pub stage: Stage,
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StageHistory {
    entries: Vec<StageEvent>,
}

impl StageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: Stage, detail: impl Into<String>) {
        self.entries.push(StageEvent {
            timestamp: Utc::now(),
            stage,
            detail: detail.into(),
        });

        // Keep only last 1000 entries
        if self.entries.len() > MAX_ENTRIES {
            self.entries.drain(0..self.entries.len() - MAX_ENTRIES);
        }
    }

    pub fn entries(&self) -> &[StageEvent] {
        &self.entries
    }

    pub fn last(&self) -> Option<&StageEvent> {
        self.entries.last()
    }

    /// Most recent event recorded for a stage
    pub fn last_for(&self, stage: Stage) -> Option<&StageEvent> {
        self.entries.iter().rev().find(|e| e.stage == stage)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_ordered_and_bounded() {
        let mut history = StageHistory::new();
        assert!(history.is_empty());

        for i in 0..(MAX_ENTRIES + 5) {
            history.push(Stage::Load, format!("load #{i}"));
        }
        history.push(Stage::Encode, "encoded Country");

        assert_eq!(history.len(), MAX_ENTRIES);
        assert_eq!(
            history.last().map(|e| e.detail.as_str()),
            Some("encoded Country")
        );
        assert_eq!(
            history.last_for(Stage::Load).map(|e| e.detail.as_str()),
            Some(format!("load #{}", MAX_ENTRIES + 4).as_str())
        );
        assert!(history.last_for(Stage::Train).is_none());
    }
}
