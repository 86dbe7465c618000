//! Submission gate
//!
//! Decides whether a freshly collected record is worth sending: records
//! that differ only in volatile fields (battery level, scroll depth, ...)
//! are duplicates of what the backend already has. The gate keys on a
//! stability signature over the slow-changing identity subset and
//! enforces, in order:
//!
//! 1. at most one submission in flight per session;
//! 2. at most one submission per session, unless forced (a consent
//!    change forces, since it changes the record meaningfully without
//!    touching the signature fields);
//! 3. a minimum interval between attempts, forced or not;
//! 4. suppression of an unchanged signature inside the duplicate window,
//!    forced or not.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::config::GateConfig;
use crate::db::{Database, Scope};
use crate::error::Result;
use crate::transport::RecordSink;
use crate::types::DeviceRecord;

/// Durable key: signature of the last successfully submitted record.
pub const LAST_SIGNATURE_KEY: &str = "last_submitted_signature";
/// Durable key: when the last successful submission happened (RFC 3339).
pub const LAST_SUBMITTED_AT_KEY: &str = "last_submitted_at";
/// Volatile key: set once a submission succeeded this session.
pub const SUBMITTED_ONCE_KEY: &str = "device_saved_once";
/// Volatile key: when the last delivery attempt started (RFC 3339).
pub const LAST_ATTEMPT_AT_KEY: &str = "last_submit_attempt_at";

/// Why the gate rejected a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another submission attempt is in flight
    InFlight,
    /// Already submitted once this session and not forced
    AlreadySubmitted,
    /// Inside the minimum inter-attempt interval
    Throttled,
    /// Unchanged signature inside the duplicate window
    Duplicate,
}

/// Outcome of a gated submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The sink accepted the record
    Delivered { id: Option<String> },
    /// The gate dropped the record without invoking the sink
    Rejected(RejectReason),
}

/// Gate state as persisted across calls.
#[derive(Debug, Clone, Default)]
pub struct GateState {
    pub last_submitted_signature: Option<String>,
    pub last_submitted_at: Option<DateTime<Utc>>,
    pub last_submit_attempt_at: Option<DateTime<Utc>>,
    pub submitted_once_in_session: bool,
}

/// Stability signature: a 32-hex-char SHA-256 prefix over the
/// slow-changing identity subset of a record. Volatile fields (timestamp,
/// battery, counters) are deliberately excluded.
pub fn signature(record: &DeviceRecord) -> String {
    let screen = record
        .screen
        .as_ref()
        .map(|s| serde_json::to_string(s).unwrap_or_default())
        .unwrap_or_default();

    let input = format!(
        "{}|{}|{}|{}|{}|{}",
        record.device_name.as_deref().unwrap_or(""),
        record.os_name.as_deref().unwrap_or(""),
        record.browser_name.as_deref().unwrap_or(""),
        screen,
        record.platform.as_deref().unwrap_or(""),
        record.user_agent.as_deref().unwrap_or(""),
    );

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();

    // First 16 bytes (32 hex chars)
    hex::encode(&digest[..16])
}

/// The pure gate decision, applied in rule order. The in-flight rule is
/// enforced by the caller's guard, not here.
fn decide(
    state: &GateState,
    signature: &str,
    force: bool,
    now: DateTime<Utc>,
    config: &GateConfig,
) -> std::result::Result<(), RejectReason> {
    if !force && state.submitted_once_in_session {
        return Err(RejectReason::AlreadySubmitted);
    }

    if let Some(attempted_at) = state.last_submit_attempt_at {
        if now - attempted_at < Duration::seconds(config.min_interval_secs as i64) {
            return Err(RejectReason::Throttled);
        }
    }

    if let (Some(last_signature), Some(submitted_at)) =
        (&state.last_submitted_signature, state.last_submitted_at)
    {
        if last_signature == signature
            && now - submitted_at < Duration::seconds(config.duplicate_window_secs as i64)
        {
            return Err(RejectReason::Duplicate);
        }
    }

    Ok(())
}

/// Session-wide submission gate.
pub struct SubmissionGate {
    db: Arc<Database>,
    config: GateConfig,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SubmissionGate {
    pub fn new(db: Arc<Database>, config: GateConfig) -> Self {
        Self {
            db,
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Submit a record through the gate.
    ///
    /// Returns `Rejected` without touching the sink when a rule fires;
    /// sink failures propagate to the caller after the transport's own
    /// fallback handling.
    pub async fn submit(
        &self,
        record: &DeviceRecord,
        force: bool,
        sink: &dyn RecordSink,
    ) -> Result<SubmitOutcome> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Ok(SubmitOutcome::Rejected(RejectReason::InFlight));
        }
        let _guard = InFlightGuard(&self.in_flight);

        let now = Utc::now();
        let signature = signature(record);
        let state = self.load_state()?;

        if let Err(reason) = decide(&state, &signature, force, now, &self.config) {
            tracing::debug!(?reason, force, "Submission rejected");
            return Ok(SubmitOutcome::Rejected(reason));
        }

        // The attempt counts against the throttle whether or not
        // delivery succeeds
        self.db
            .kv_set(Scope::Volatile, LAST_ATTEMPT_AT_KEY, &now.to_rfc3339())?;

        let response = sink.deliver(record).await?;

        self.db
            .kv_set(Scope::Durable, LAST_SIGNATURE_KEY, &signature)?;
        self.db
            .kv_set(Scope::Durable, LAST_SUBMITTED_AT_KEY, &now.to_rfc3339())?;
        self.db
            .kv_set(Scope::Volatile, SUBMITTED_ONCE_KEY, "true")?;

        tracing::info!(id = ?response.id, "Device record submitted");
        Ok(SubmitOutcome::Delivered { id: response.id })
    }

    fn load_state(&self) -> Result<GateState> {
        let parse_time = |raw: Option<String>| {
            raw.and_then(|s| s.parse::<DateTime<Utc>>().ok())
        };

        Ok(GateState {
            last_submitted_signature: self.db.kv_get(Scope::Durable, LAST_SIGNATURE_KEY)?,
            last_submitted_at: parse_time(self.db.kv_get(Scope::Durable, LAST_SUBMITTED_AT_KEY)?),
            last_submit_attempt_at: parse_time(
                self.db.kv_get(Scope::Volatile, LAST_ATTEMPT_AT_KEY)?,
            ),
            submitted_once_in_session: self
                .db
                .kv_get(Scope::Volatile, SUBMITTED_ONCE_KEY)?
                .as_deref()
                == Some("true"),
        })
    }
}
