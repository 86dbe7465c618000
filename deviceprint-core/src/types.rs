//! Core domain types for deviceprint
//!
//! The central type is [`DeviceRecord`]: the merged snapshot of every
//! device, browser and session attribute one collection pass could read.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **DeviceRecord** | The merged snapshot produced by one collection pass |
//! | **Probe** | A single-capability read with its own failure containment |
//! | **Signature** | Hash over the stable identity subset of a record |
//! | **Session** | A client-local execution lifetime with a stable session id |
//!
//! ### Null vs absent
//!
//! Every capability field that could not be read — whether the API is
//! unsupported, the user denied it, or the probe errored — is serialized as
//! an explicit `null` (or an `{available: false}` shape). Consumers must
//! treat denial and absence identically, so no capability field carries
//! `skip_serializing_if`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================
// Environment
// ============================================

/// Physical screen geometry of the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenInfo {
    pub width: u32,
    pub height: u32,
    pub avail_width: u32,
    pub avail_height: u32,
    pub color_depth: Option<u32>,
    pub pixel_ratio: f64,
}

/// Page context the collection pass ran in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub url: Option<String>,
    pub title: Option<String>,
    pub referrer: Option<String>,
}

// ============================================
// Capabilities
// ============================================

/// Network connection quality as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Effective connection type ("4g", "3g", ...)
    pub effective_type: Option<String>,
    /// Estimated downlink bandwidth in Mbps
    pub downlink: Option<f64>,
    /// Estimated round-trip time in ms
    pub rtt: Option<u32>,
    /// Whether the user requested reduced data usage
    pub save_data: bool,
}

/// Battery state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryInfo {
    pub charging: bool,
    /// Charge level in [0.0, 1.0]
    pub level: f64,
    /// Seconds until full, if charging
    pub charging_time: Option<f64>,
    /// Seconds until empty, if discharging
    pub discharging_time: Option<f64>,
}

/// A geolocation fix. Only ever populated when geolocation consent is granted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
    pub accuracy: f64,
}

/// Outcome of a microphone/camera access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAccess {
    pub microphone: bool,
    pub camera: bool,
}

/// Outcome of a Bluetooth or USB device chooser.
///
/// Defaults to `{available: false}`: the chooser is never opened during
/// passive collection, only through an explicit consent request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralAccess {
    pub available: bool,
    pub device: Option<String>,
}

/// Display-mode flags describing how the app is installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PwaInfo {
    pub is_standalone: bool,
    pub is_fullscreen: bool,
    pub is_minimal_ui: bool,
}

/// Model and architecture hints from the high-entropy user-agent API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UaHints {
    pub model: Option<String>,
    pub architecture: Option<String>,
    pub ua_full_version: Option<String>,
    pub platform: Option<String>,
    pub mobile: bool,
}

/// IP-based coarse geolocation, from an external lookup keyed by public IP.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpGeolocation {
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

// ============================================
// Identity-adjacent
// ============================================

/// Locally stored account details. Read from well-known durable storage
/// keys only; never prompted for during collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<String>,
    pub preferred_language: Option<String>,
    pub theme: Option<String>,
    pub sign_up_date: Option<String>,
    pub last_login: Option<String>,
    /// Linked social accounts, stored as opaque JSON
    pub social_accounts: serde_json::Value,
}

// ============================================
// Storage snapshots
// ============================================

/// Snapshot of a key/value storage area.
///
/// Either the full contents, or a size-only summary when content capture
/// is suppressed by configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StorageSnapshot {
    /// Size-only summary
    Summary {
        entries: usize,
        #[serde(rename = "totalBytes")]
        total_bytes: usize,
    },
    /// Full key → value capture
    Full(BTreeMap<String, String>),
}

// ============================================
// Session telemetry
// ============================================

/// Last error observed in the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionError {
    pub message: Option<String>,
    pub source: Option<String>,
    pub lineno: Option<u32>,
    pub colno: Option<u32>,
    pub stack: Option<String>,
    /// Epoch ms when the error was observed
    pub at: i64,
}

/// Interaction counters for one session.
///
/// Owned by the collection orchestrator and persisted explicitly; this is
/// the typed replacement for the ad-hoc global tracker the page used to
/// carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTelemetry {
    /// Stable per-profile session id; regenerated only when durable
    /// storage is cleared
    pub session_id: String,
    /// Epoch ms when the session was first seen
    pub entered_at: i64,
    pub click_count: u64,
    /// Maximum scroll offset reached, in px
    pub scroll_depth: u64,
    pub form_submits: u64,
    pub last_error: Option<SessionError>,
}

// ============================================
// DeviceRecord
// ============================================

/// The unit of collection and submission.
///
/// Immutable once submitted; a fresh collection pass produces a new record
/// rather than editing an old one. Server-assigned fields (`id`,
/// `clientIp`, `createdAt`, ...) never appear here — they exist only on
/// [`StoredDevice`] values read back from the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// When this collection pass started
    pub timestamp: DateTime<Utc>,

    // Identity
    pub device_name: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub platform: Option<String>,
    pub user_agent: Option<String>,
    pub cpu_architecture: Option<String>,

    // Environment
    pub screen: Option<ScreenInfo>,
    pub timezone: Option<String>,
    pub languages: Vec<String>,
    pub cookies_enabled: bool,
    pub do_not_track: Option<String>,
    pub hardware_concurrency: Option<u32>,
    pub device_memory_gb: Option<f64>,
    pub max_touch_points: u32,
    pub page: Option<PageInfo>,

    // Capabilities
    pub connection: Option<ConnectionInfo>,
    pub battery: Option<BatteryInfo>,
    pub geolocation: Option<GeoPosition>,
    pub media_access: Option<MediaAccess>,
    pub clipboard_content: Option<String>,
    pub bluetooth_access: PeripheralAccess,
    pub usb_access: PeripheralAccess,
    pub push_notification_granted: bool,
    pub push_notification_token: Option<serde_json::Value>,
    pub pwa_info: PwaInfo,
    /// High-entropy UA hints, when the host exposes them
    pub ua_hints: Option<UaHints>,

    // Network enrichment (best-effort; the IP lookup tolerates a null IP)
    pub public_ip: Option<String>,
    pub ip_geolocation: Option<IpGeolocation>,

    // Identity-adjacent and storage
    pub user_identity: Option<UserIdentity>,
    pub local_storage_data: Option<StorageSnapshot>,
    pub session_storage_data: Option<StorageSnapshot>,

    // Session telemetry
    pub session: SessionTelemetry,
}

impl DeviceRecord {
    /// An empty record for the given collection timestamp.
    ///
    /// Everything defaults to the "unavailable" shape; probes fill in
    /// disjoint fields from here.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            device_name: None,
            os_name: None,
            os_version: None,
            browser_name: None,
            browser_version: None,
            platform: None,
            user_agent: None,
            cpu_architecture: None,
            screen: None,
            timezone: None,
            languages: Vec::new(),
            cookies_enabled: false,
            do_not_track: None,
            hardware_concurrency: None,
            device_memory_gb: None,
            max_touch_points: 0,
            page: None,
            connection: None,
            battery: None,
            geolocation: None,
            media_access: None,
            clipboard_content: None,
            bluetooth_access: PeripheralAccess::default(),
            usb_access: PeripheralAccess::default(),
            push_notification_granted: false,
            push_notification_token: None,
            pwa_info: PwaInfo::default(),
            ua_hints: None,
            public_ip: None,
            ip_geolocation: None,
            user_identity: None,
            local_storage_data: None,
            session_storage_data: None,
            session: SessionTelemetry::default(),
        }
    }
}

// ============================================
// API shapes
// ============================================

/// A record as stored by the backend: the server-assigned `id` plus every
/// stored field, kept as raw JSON since the backend tolerates and stores
/// arbitrary additional fields.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredDevice {
    pub id: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl StoredDevice {
    /// The stored device name, if any.
    pub fn device_name(&self) -> Option<&str> {
        self.fields.get("deviceName").and_then(|v| v.as_str())
    }

    /// The server-assigned creation timestamp, if present and parseable.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.fields
            .get("createdAt")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }
}

/// Response from `POST /api/devices/save`.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default)]
    pub id: Option<String>,
}
