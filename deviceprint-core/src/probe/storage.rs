//! Storage-backed probes
//!
//! These read client-side state the app itself has written: durable and
//! volatile storage snapshots, the locally stored user identity, and the
//! stable session id. Like every probe they swallow their own failures.

use std::collections::BTreeMap;

use crate::db::{Database, Scope};
use crate::error::Result;
use crate::types::{StorageSnapshot, UserIdentity};

/// Durable storage key holding the stable session id.
pub const SESSION_ID_KEY: &str = "device_session_id";

/// Snapshot of the durable storage scope.
///
/// `capture_contents = false` degrades to a size-only summary.
pub fn local_storage_snapshot(db: &Database, capture_contents: bool) -> Option<StorageSnapshot> {
    snapshot(db, Scope::Durable, capture_contents)
}

/// Snapshot of the volatile storage scope.
pub fn session_storage_snapshot(db: &Database, capture_contents: bool) -> Option<StorageSnapshot> {
    snapshot(db, Scope::Volatile, capture_contents)
}

fn snapshot(db: &Database, scope: Scope, capture_contents: bool) -> Option<StorageSnapshot> {
    let entries = match db.kv_entries(scope) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!(scope = scope.as_str(), %err, "storage snapshot failed");
            return None;
        }
    };

    if capture_contents {
        Some(StorageSnapshot::Full(entries.into_iter().collect()))
    } else {
        let total_bytes = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
        Some(StorageSnapshot::Summary {
            entries: entries.len(),
            total_bytes,
        })
    }
}

/// Locally stored account details, from well-known durable keys.
///
/// Returns `None` when nothing was ever stored; collection never prompts
/// for identity.
pub fn user_identity(db: &Database) -> Option<UserIdentity> {
    let get = |key: &str| db.kv_get(Scope::Durable, key).ok().flatten();

    let identity = UserIdentity {
        name: get("user_name"),
        email: get("user_email"),
        phone: get("user_phone"),
        password_hash: get("user_password_hash"),
        role: get("user_role"),
        preferred_language: get("user_preferred_language"),
        theme: get("user_theme"),
        sign_up_date: get("user_signup_date"),
        last_login: get("user_last_login"),
        social_accounts: get("user_social_accounts")
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or(serde_json::Value::Null),
    };

    let empty = identity.name.is_none()
        && identity.email.is_none()
        && identity.phone.is_none()
        && identity.password_hash.is_none()
        && identity.role.is_none()
        && identity.preferred_language.is_none()
        && identity.theme.is_none()
        && identity.sign_up_date.is_none()
        && identity.last_login.is_none()
        && identity.social_accounts.is_null();

    if empty {
        None
    } else {
        Some(identity)
    }
}

/// The stable session id, generating and persisting one on first use.
///
/// Stable for the lifetime of durable storage; cleared storage means a
/// fresh id.
pub fn session_id(db: &Database) -> Result<String> {
    if let Some(existing) = db.kv_get(Scope::Durable, SESSION_ID_KEY)? {
        return Ok(existing);
    }
    let fresh = format!("s_{}", uuid::Uuid::new_v4().simple());
    db.kv_set(Scope::Durable, SESSION_ID_KEY, &fresh)?;
    Ok(fresh)
}

/// Map-based snapshot contents, for callers that need the raw entries.
pub fn snapshot_map(snapshot: &StorageSnapshot) -> Option<&BTreeMap<String, String>> {
    match snapshot {
        StorageSnapshot::Full(map) => Some(map),
        StorageSnapshot::Summary { .. } => None,
    }
}
