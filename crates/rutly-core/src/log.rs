// ── Send log ──
//
// Append-only record of every send attempt, success or failure. Entries
// are immutable once appended; the only destructive operation is an
// explicit clear from the presentation boundary, which touches neither
// the pending queue nor the rotation index.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome recorded for one send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SendStatus {
    Sent,
    Error { retry: u32 },
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => write!(f, "Sent"),
            Self::Error { retry } => write!(f, "Error (retry {retry})"),
        }
    }
}

/// One send attempt, as shown in the log view.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub to: String,
    pub message: String,
    pub status: SendStatus,
    /// Remote response payload on success, error detail on failure.
    pub response: String,
    /// 1-based registry position of the gateway that handled the attempt.
    pub gateway: usize,
}

/// Thread-safe append-only log storage.
#[derive(Debug, Default)]
pub struct SendLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl SendLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, entry: LogEntry) {
        self.entries().push(entry);
    }

    /// Snapshot of all entries, newest first. The stored order (append
    /// order) is left untouched.
    pub fn snapshot_desc(&self) -> Vec<LogEntry> {
        let mut snapshot = self.entries().clone();
        snapshot.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        snapshot
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
