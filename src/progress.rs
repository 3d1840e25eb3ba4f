//! Import and update progress reporting.
//!
//! Renders the events streamed by the importer and the registry so users
//! see each item as it is processed. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.

use serde::Serialize;
use std::io::Write;

use file_catalog_core::event::{ImportEvent, ImportStatus};
use file_catalog_core::registry::UpdateOutcome;

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn import(&self, event: &ImportEvent);

    fn update(&self, outcome: &UpdateOutcome);
}

/// Human-friendly progress on stderr: "created  3f2a9c1b  [text] /notes/a.md".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn import(&self, event: &ImportEvent) {
        let line = match (&event.status, &event.item_id) {
            (ImportStatus::Initiated | ImportStatus::Completed, _) | (_, None) => {
                format!("{}  {}\n", event.status, event.message)
            }
            (status, Some(id)) => {
                format!("{:<9} {}  {}\n", status.as_str(), short_id(id), event.message)
            }
        };
        write_stderr(&line);
    }

    fn update(&self, outcome: &UpdateOutcome) {
        let mark = if outcome.success { "ok" } else { "FAILED" };
        write_stderr(&format!(
            "update {}  {}  {}\n",
            outcome.target, mark, outcome.message
        ));
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn emit<T: Serialize>(kind: &str, payload: &T) {
        let obj = serde_json::json!({ "event": kind, "data": payload });
        if let Ok(line) = serde_json::to_string(&obj) {
            write_stderr(&format!("{}\n", line));
        }
    }
}

impl ProgressReporter for JsonProgress {
    fn import(&self, event: &ImportEvent) {
        Self::emit("import", event);
    }

    fn update(&self, outcome: &UpdateOutcome) {
        Self::emit("update", outcome);
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn import(&self, _event: &ImportEvent) {}

    fn update(&self, _outcome: &UpdateOutcome) {}
}

fn write_stderr(line: &str) {
    let mut err = std::io::stderr().lock();
    let _ = err.write_all(line.as_bytes());
    let _ = err.flush();
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn short_id_truncates() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
