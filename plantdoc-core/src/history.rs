//! Bounded, newest-first history of past diagnoses
//!
//! The whole list is stored as one JSON array under [`HISTORY_KEY`]. Every
//! write is a read-modify-write of that array.
//!
//! ## Single writer
//!
//! No locking is done. Callers must not run two appends at once; if they
//! do, the later write replaces the earlier one wholesale. The presentation
//! layer satisfies this by allowing only one analysis in flight.
//!
//! ## Failure policy
//!
//! [`HistoryStore::list`] never fails: a missing or corrupt record reads as
//! an empty history so the user can always open the history view. Entries
//! that no longer decode are skipped individually. The write path is
//! strict: [`HistoryStore::append`] refuses to run on top of a failed
//! backend read, and write errors surface as [`Error::Storage`].

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::storage::KeyValueStore;
use crate::types::{HistoryEntry, NewHistoryEntry};

/// Key under which the history array is stored
pub const HISTORY_KEY: &str = "plant_doctor_history";

/// Maximum number of entries kept; older ones are evicted first
pub const HISTORY_CAPACITY: usize = 50;

/// Persistent record of past diagnoses
pub struct HistoryStore {
    store: Box<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Record a diagnosis and return the stored entry.
    ///
    /// The id comes from the entry's timestamp in Unix milliseconds, bumped
    /// past the newest stored id when needed so ids stay unique and
    /// increasing.
    pub fn append(&self, new: NewHistoryEntry) -> Result<HistoryEntry> {
        let existing = self.load().map_err(|e| {
            Error::Storage(format!("failed to read history before saving: {}", e))
        })?;

        let newest = existing.first().and_then(HistoryEntry::numeric_id);
        let id = next_id(creation_millis(&new.timestamp), newest);
        let entry = HistoryEntry::from_new(id.to_string(), new);

        let mut updated = Vec::with_capacity(existing.len() + 1);
        updated.push(entry.clone());
        updated.extend(existing);

        let evicted = updated.len().saturating_sub(HISTORY_CAPACITY);
        updated.truncate(HISTORY_CAPACITY);
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted oldest history entries");
        }

        self.write(&updated)
            .map_err(|e| Error::Storage(format!("failed to save scan to history: {}", e)))?;

        tracing::info!(
            id = %entry.id,
            is_plant = entry.result.is_plant,
            entries = updated.len(),
            "Saved diagnosis to history"
        );
        Ok(entry)
    }

    /// All entries, newest first. Empty if nothing is stored or the record is unreadable.
    pub fn list(&self) -> Vec<HistoryEntry> {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(
                backend = self.store.name(),
                error = %e,
                "Failed to read history"
            );
            Vec::new()
        })
    }

    /// Decode the stored array.
    ///
    /// Backend errors propagate. A record that is not a JSON array reads as
    /// empty, and elements that do not decode as entries are dropped.
    fn load(&self) -> Result<Vec<HistoryEntry>> {
        let raw = match self.store.get(HISTORY_KEY)? {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Ok(Vec::new()),
        };

        let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(error = %e, "History record is corrupt, treating as empty");
                return Ok(Vec::new());
            }
        };

        let total = values.len();
        let entries: Vec<HistoryEntry> = values
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable history entry");
                    None
                }
            })
            .collect();

        if entries.len() < total {
            tracing::warn!(
                kept = entries.len(),
                dropped = total - entries.len(),
                "History record had unreadable entries"
            );
        }
        Ok(entries)
    }

    /// Look up one entry by id
    pub fn get(&self, id: &str) -> Option<HistoryEntry> {
        self.list().into_iter().find(|entry| entry.id == id)
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the stored history with an empty list. Safe to call repeatedly.
    pub fn clear(&self) -> Result<()> {
        self.write(&[])
            .map_err(|e| Error::Storage(format!("failed to clear history: {}", e)))?;
        tracing::info!("Cleared history");
        Ok(())
    }

    fn write(&self, entries: &[HistoryEntry]) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        self.store.set(HISTORY_KEY, &json)
    }
}

/// Milliseconds since the epoch for an RFC 3339 timestamp, or for now if it
/// does not parse.
fn creation_millis(timestamp: &str) -> i64 {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|ts| ts.timestamp_millis())
        .unwrap_or_else(|_| Utc::now().timestamp_millis())
}

fn next_id(candidate: i64, newest: Option<i64>) -> i64 {
    match newest {
        Some(newest) if candidate <= newest => newest.saturating_add(1),
        _ => candidate,
    }
}
