//! Rescued record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::events::FailureStage;

/// One rejected row, field or file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescuedRecord {
    /// File the data came from, if any.
    pub source_file: Option<String>,
    /// Channel (source or table) the record was rescued from.
    pub channel: String,
    pub stage: FailureStage,
    /// 1-based row (or line) number within the source file.
    pub row_number: Option<u64>,
    /// Column that failed, for field-level rescues.
    pub field: Option<String>,
    pub reason: String,
    /// The offending data exactly as read.
    pub raw_payload: String,
    pub rescued_at: DateTime<Utc>,
}

impl RescuedRecord {
    pub fn new(stage: FailureStage, reason: impl Into<String>, raw_payload: impl Into<String>) -> Self {
        Self {
            source_file: None,
            channel: String::new(),
            stage,
            row_number: None,
            field: None,
            reason: reason.into(),
            raw_payload: raw_payload.into(),
            rescued_at: Utc::now(),
        }
    }

    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn with_row_number(mut self, row_number: u64) -> Self {
        self.row_number = Some(row_number);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Counts of rescued records by stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RescueStats {
    pub read: usize,
    pub decode: usize,
    pub parse: usize,
    pub coerce: usize,
    pub expand: usize,
    /// Records already written to storage.
    pub written: usize,
}

impl RescueStats {
    pub fn increment(&mut self, stage: FailureStage) {
        match stage {
            FailureStage::Read => self.read += 1,
            FailureStage::Decode => self.decode += 1,
            FailureStage::Parse => self.parse += 1,
            FailureStage::Coerce => self.coerce += 1,
            FailureStage::Expand => self.expand += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.read + self.decode + self.parse + self.coerce + self.expand
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_increment() {
        let mut stats = RescueStats::default();
        stats.increment(FailureStage::Parse);
        stats.increment(FailureStage::Parse);
        stats.increment(FailureStage::Coerce);

        assert_eq!(stats.parse, 2);
        assert_eq!(stats.coerce, 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_record_serializes_stage_lowercase() {
        let record = RescuedRecord::new(FailureStage::Coerce, "not a long", "noon")
            .with_source_file("sales/2021-10-01.json")
            .with_row_number(3)
            .with_field("ts");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["stage"], "coerce");
        assert_eq!(json["field"], "ts");
        assert_eq!(json["row_number"], 3);
    }
}
