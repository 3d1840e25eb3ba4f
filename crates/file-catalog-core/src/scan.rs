//! Scan manifests.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::formats::ScanMode;
use crate::record::FileRecord;

/// An entry the scanner saw but could not catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

/// Result of one scan over a root path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub root: String,
    pub mode: ScanMode,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub records: Vec<FileRecord>,
    #[serde(default)]
    pub skipped: Vec<SkippedEntry>,
}

impl ScanResult {
    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }

    pub fn record_ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id()).collect()
    }

    /// Summary stored alongside the scan root.
    pub fn details(&self) -> serde_json::Value {
        serde_json::json!({
            "mode": self.mode,
            "records": self.records.len(),
            "skipped": self.skipped.len(),
            "started_at": self.started_at,
            "ended_at": self.ended_at,
            "duration_ms": self.duration().num_milliseconds(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::text_record;

    #[test]
    fn test_duration_and_details() {
        let started_at = Utc::now();
        let result = ScanResult {
            root: "/data".to_string(),
            mode: ScanMode::Docs,
            started_at,
            ended_at: started_at + Duration::milliseconds(1500),
            records: vec![text_record("/data/a.md", "a"), text_record("/data/b.md", "b")],
            skipped: vec![SkippedEntry {
                path: "/data/c.png".to_string(),
                reason: "decode failed".to_string(),
            }],
        };
        assert_eq!(result.duration().num_milliseconds(), 1500);
        assert_eq!(result.record_ids().len(), 2);

        let details = result.details();
        assert_eq!(details["mode"], "docs");
        assert_eq!(details["records"], 2);
        assert_eq!(details["skipped"], 1);
        assert_eq!(details["duration_ms"], 1500);
    }
}
