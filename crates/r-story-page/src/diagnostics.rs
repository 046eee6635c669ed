//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Per-page diagnostic log surfaced in development mode.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEntry {
    pub level: DiagnosticLevel,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

/// Shared, append-only list of diagnostics. Identical messages are kept once.
#[derive(Clone, Default)]
pub struct DiagnosticLog {
    entries: Arc<Mutex<Vec<DiagnosticEntry>>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, level: DiagnosticLevel, message: impl fmt::Display) {
        let message = message.to_string();
        let mut entries = self.entries.lock();
        if entries
            .iter()
            .any(|entry| entry.level == level && entry.message == message)
        {
            return;
        }
        entries.push(DiagnosticEntry {
            level,
            message,
            recorded_at: Utc::now(),
        });
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.record(DiagnosticLevel::Warn, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.record(DiagnosticLevel::Error, message);
    }

    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for DiagnosticLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticLog")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_messages_are_recorded_once() {
        let log = DiagnosticLog::new();
        log.warn("advance-to is malformed");
        log.warn("advance-to is malformed");
        log.error("advance-to is malformed");
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].level, DiagnosticLevel::Warn);
    }

    #[test]
    fn clones_share_entries() {
        let log = DiagnosticLog::new();
        let clone = log.clone();
        clone.warn("media timed out");
        assert!(!log.is_empty());
    }
}
