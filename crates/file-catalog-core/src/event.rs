//! Import status events.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Initiated,
    Created,
    Updated,
    /// The item was already stored; nothing was written.
    Conflict,
    Completed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Initiated => "initiated",
            ImportStatus::Created => "created",
            ImportStatus::Updated => "updated",
            ImportStatus::Conflict => "conflict",
            ImportStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status update from an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEvent {
    pub status: ImportStatus,
    pub message: String,
    /// ID of the item this event is about. Absent for
    /// `Initiated`/`Completed`.
    pub item_id: Option<String>,
}

impl ImportEvent {
    pub fn new(status: ImportStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            item_id: None,
        }
    }

    pub fn for_item(status: ImportStatus, item_id: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            item_id: Some(item_id.to_string()),
        }
    }
}

/// Per-status totals, reported with `Completed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub created: u64,
    pub updated: u64,
    pub conflicts: u64,
}

impl ImportCounts {
    pub fn record(&mut self, status: ImportStatus) {
        match status {
            ImportStatus::Created => self.created += 1,
            ImportStatus::Updated => self.updated += 1,
            ImportStatus::Conflict => self.conflicts += 1,
            ImportStatus::Initiated | ImportStatus::Completed => {}
        }
    }
}

impl fmt::Display for ImportCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created: {}, updated: {}, conflicts: {}",
            self.created, self.updated, self.conflicts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut counts = ImportCounts::default();
        for s in [
            ImportStatus::Initiated,
            ImportStatus::Created,
            ImportStatus::Created,
            ImportStatus::Conflict,
            ImportStatus::Completed,
        ] {
            counts.record(s);
        }
        assert_eq!(counts.created, 2);
        assert_eq!(counts.conflicts, 1);
        assert_eq!(counts.to_string(), "created: 2, updated: 0, conflicts: 1");
    }

    #[test]
    fn test_event_serializes_lowercase_status() {
        let ev = ImportEvent::for_item(ImportStatus::Conflict, "abc", "exists");
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["status"], "conflict");
        assert_eq!(json["item_id"], "abc");
    }
}
