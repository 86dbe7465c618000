//! Session interaction tracking
//!
//! The typed replacement for a global mutable tracker: one
//! [`SessionTracker`] per session, owned by the collection orchestrator,
//! mutated through explicit record methods and persisted to the volatile
//! scope so counters survive a reload within the same session.

use std::sync::Arc;

use chrono::Utc;

use crate::db::{Database, Scope};
use crate::error::Result;
use crate::probe::storage;
use crate::types::{SessionError, SessionTelemetry};

const CLICK_COUNT_KEY: &str = "device_click_count";
const SCROLL_DEPTH_KEY: &str = "device_scroll_depth";
const FORM_SUBMITS_KEY: &str = "device_form_submits";
const LAST_ERROR_KEY: &str = "device_last_error";
const ENTERED_AT_KEY: &str = "device_entered_at";

/// Owns the interaction counters for the current session.
pub struct SessionTracker {
    db: Arc<Database>,
    state: SessionTelemetry,
}

impl SessionTracker {
    /// Restore the tracker for the current session, creating the stable
    /// session id on first use and re-reading any persisted counters.
    pub fn restore(db: Arc<Database>) -> Result<Self> {
        let session_id = storage::session_id(&db)?;

        let read_u64 = |key: &str| -> u64 {
            db.kv_get(Scope::Volatile, key)
                .ok()
                .flatten()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        };

        let entered_at = db
            .kv_get(Scope::Volatile, ENTERED_AT_KEY)
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| Utc::now().timestamp_millis());

        let last_error = db
            .kv_get(Scope::Volatile, LAST_ERROR_KEY)
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok());

        let state = SessionTelemetry {
            session_id,
            entered_at,
            click_count: read_u64(CLICK_COUNT_KEY),
            scroll_depth: read_u64(SCROLL_DEPTH_KEY),
            form_submits: read_u64(FORM_SUBMITS_KEY),
            last_error,
        };

        let tracker = Self { db, state };
        tracker.persist_entered_at();
        Ok(tracker)
    }

    /// Count one user click.
    pub fn record_click(&mut self) {
        self.state.click_count += 1;
        self.persist_u64(CLICK_COUNT_KEY, self.state.click_count);
    }

    /// Track the maximum scroll offset reached, in px.
    pub fn record_scroll(&mut self, offset_px: u64) {
        if offset_px > self.state.scroll_depth {
            self.state.scroll_depth = offset_px;
            self.persist_u64(SCROLL_DEPTH_KEY, self.state.scroll_depth);
        }
    }

    /// Count one form submission.
    pub fn record_form_submit(&mut self) {
        self.state.form_submits += 1;
        self.persist_u64(FORM_SUBMITS_KEY, self.state.form_submits);
    }

    /// Remember the most recent error seen in this session.
    pub fn record_error(&mut self, error: SessionError) {
        if let Ok(raw) = serde_json::to_string(&error) {
            self.persist_str(LAST_ERROR_KEY, &raw);
        }
        self.state.last_error = Some(error);
    }

    /// Current telemetry snapshot, as embedded in a record.
    pub fn snapshot(&self) -> SessionTelemetry {
        self.state.clone()
    }

    fn persist_entered_at(&self) {
        self.persist_str(ENTERED_AT_KEY, &self.state.entered_at.to_string());
    }

    fn persist_u64(&self, key: &str, value: u64) {
        self.persist_str(key, &value.to_string());
    }

    // Counter persistence is best-effort; losing a counter must never
    // break collection.
    fn persist_str(&self, key: &str, value: &str) {
        if let Err(err) = self.db.kv_set(Scope::Volatile, key, value) {
            tracing::debug!(key, %err, "telemetry persist failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Arc<Database> {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_counters_accumulate_and_persist() {
        let db = test_db();
        let mut tracker = SessionTracker::restore(db.clone()).unwrap();

        tracker.record_click();
        tracker.record_click();
        tracker.record_scroll(300);
        tracker.record_scroll(120); // below the max, ignored
        tracker.record_form_submit();

        let snap = tracker.snapshot();
        assert_eq!(snap.click_count, 2);
        assert_eq!(snap.scroll_depth, 300);
        assert_eq!(snap.form_submits, 1);

        // A tracker restored in the same session picks the counters up
        let restored = SessionTracker::restore(db).unwrap();
        let snap = restored.snapshot();
        assert_eq!(snap.click_count, 2);
        assert_eq!(snap.scroll_depth, 300);
        assert_eq!(snap.session_id, tracker.snapshot().session_id);
    }

    #[test]
    fn test_new_session_resets_counters_but_not_id() {
        let db = test_db();
        let mut tracker = SessionTracker::restore(db.clone()).unwrap();
        tracker.record_click();
        let session_id = tracker.snapshot().session_id;

        db.begin_session().unwrap();
        let fresh = SessionTracker::restore(db).unwrap();
        assert_eq!(fresh.snapshot().click_count, 0);
        assert_eq!(fresh.snapshot().session_id, session_id);
    }

    #[test]
    fn test_last_error_round_trips() {
        let db = test_db();
        let mut tracker = SessionTracker::restore(db.clone()).unwrap();
        tracker.record_error(SessionError {
            message: Some("boom".to_string()),
            at: 1234,
            ..Default::default()
        });

        let restored = SessionTracker::restore(db).unwrap();
        let err = restored.snapshot().last_error.unwrap();
        assert_eq!(err.message.as_deref(), Some("boom"));
        assert_eq!(err.at, 1234);
    }
}
