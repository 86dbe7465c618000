//! Collection orchestrator
//!
//! Produces one [`DeviceRecord`] per pass from all capability probes,
//! bounded by a hard deadline.
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌────────────────┐
//! │ ConsentStore │ ──► │   Collector   │ ──► │ SubmissionGate │
//! └──────────────┘     │ (probes race  │     └────────────────┘
//!        ▲             │  a deadline)  │
//! ┌──────┴───────┐     └───────────────┘
//! │  DeviceHost  │
//! └──────────────┘
//! ```
//!
//! All suspending probes run concurrently on one task; none may block
//! another, and each writes a disjoint field of the record. The only
//! failure the orchestrator handles itself is the global deadline: probes
//! that have not settled by then are abandoned and a minimal fallback
//! record of synchronously available fields is returned, so a caller is
//! never blocked indefinitely.

mod telemetry;

pub use telemetry::SessionTracker;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::CollectionConfig;
use crate::consent::{Capability, ConsentStore};
use crate::db::Database;
use crate::error::Result;
use crate::host::DeviceHost;
use crate::probe::{capability, identity, storage};
use crate::types::{DeviceRecord, SessionError};

/// Orchestrates capability probes into full device records.
pub struct Collector {
    host: Arc<dyn DeviceHost>,
    consent: Arc<ConsentStore>,
    db: Arc<Database>,
    config: CollectionConfig,
    tracker: Mutex<SessionTracker>,
}

impl Collector {
    pub fn new(
        host: Arc<dyn DeviceHost>,
        consent: Arc<ConsentStore>,
        db: Arc<Database>,
        config: CollectionConfig,
    ) -> Result<Self> {
        let tracker = SessionTracker::restore(db.clone())?;
        Ok(Self {
            host,
            consent,
            db,
            config,
            tracker: Mutex::new(tracker),
        })
    }

    /// Run one collection pass.
    ///
    /// Returns within the configured deadline: either the full record, or
    /// the minimal fallback when outstanding probes are abandoned.
    pub async fn collect(&self) -> DeviceRecord {
        let timestamp = Utc::now();
        let deadline = Duration::from_secs(self.config.deadline_secs);

        match tokio::time::timeout(deadline, self.collect_full(timestamp)).await {
            Ok(record) => record,
            Err(_) => {
                tracing::warn!(
                    deadline_secs = self.config.deadline_secs,
                    "Collection deadline elapsed, returning fallback record"
                );
                self.fallback_record(timestamp)
            }
        }
    }

    /// The full pass: every suspending probe runs concurrently, then the
    /// synchronous fields are merged in.
    async fn collect_full(&self, timestamp: DateTime<Utc>) -> DeviceRecord {
        let host = self.host.as_ref();
        let consent = self.consent.as_ref();

        let (battery, hints, geolocation, media_access, clipboard_content, push, public_ip) = tokio::join!(
            capability::battery(host),
            capability::ua_hints(host),
            capability::geolocation(host, consent),
            capability::media_access(host, consent),
            capability::clipboard(host, consent),
            capability::push_status(host),
            capability::public_ip(host),
        );
        // Dependent probe: fed by public_ip, tolerates None
        let ip_geolocation = capability::ip_geolocation(host, public_ip.as_deref()).await;
        let (push_notification_granted, push_notification_token) = push;

        let mut record = self.fallback_record(timestamp);

        let ua = record.user_agent.clone().unwrap_or_default();
        record.os_version = record
            .os_name
            .as_deref()
            .and_then(|os| identity::os_version(&ua, os));
        record.browser_version = record
            .browser_name
            .as_deref()
            .and_then(|browser| identity::browser_version(&ua, browser));
        record.device_name = identity::device_model(&ua, hints.as_ref());
        record.cpu_architecture = identity::cpu_architecture(&ua, hints.as_ref());
        record.ua_hints = hints;

        record.timezone = host.timezone();
        record.languages = host.languages();
        record.cookies_enabled = host.cookies_enabled();
        record.do_not_track = host.do_not_track();
        record.hardware_concurrency = host.hardware_concurrency();
        record.device_memory_gb = host.device_memory_gb();
        record.max_touch_points = host.max_touch_points();
        record.page = host.page();
        record.connection = host.connection();
        record.pwa_info = host.display_modes();

        record.battery = battery;
        record.geolocation = geolocation;
        record.media_access = media_access;
        record.clipboard_content = clipboard_content;
        record.push_notification_granted = push_notification_granted;
        record.push_notification_token = push_notification_token;
        record.public_ip = public_ip;
        record.ip_geolocation = ip_geolocation;

        // Chooser outcomes are replayed from the consent store, never
        // re-requested here
        record.bluetooth_access = consent.peripheral(Capability::Bluetooth);
        record.usb_access = consent.peripheral(Capability::Usb);

        let capture = self.config.capture_storage_contents;
        record.user_identity = storage::user_identity(&self.db);
        record.local_storage_data = storage::local_storage_snapshot(&self.db, capture);
        record.session_storage_data = storage::session_storage_snapshot(&self.db, capture);

        record
    }

    /// The minimal record: timestamp plus every synchronously available
    /// identity field. This is what a deadline expiry degrades to.
    fn fallback_record(&self, timestamp: DateTime<Utc>) -> DeviceRecord {
        let mut record = DeviceRecord::empty(timestamp);

        record.user_agent = self.host.user_agent();
        record.platform = self.host.platform();
        record.screen = self.host.screen();

        let ua = record.user_agent.clone().unwrap_or_default();
        record.os_name = identity::os_name(&ua).map(str::to_string);
        record.browser_name = identity::browser_name(&ua).map(str::to_string);

        record.session = self.tracker.lock().unwrap().snapshot();
        record
    }

    // --- interaction events, forwarded to the session tracker ---

    pub fn record_click(&self) {
        self.tracker.lock().unwrap().record_click();
    }

    pub fn record_scroll(&self, offset_px: u64) {
        self.tracker.lock().unwrap().record_scroll(offset_px);
    }

    pub fn record_form_submit(&self) {
        self.tracker.lock().unwrap().record_form_submit();
    }

    pub fn record_error(&self, error: SessionError) {
        self.tracker.lock().unwrap().record_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::ConsentDecision;
    use crate::probe::ProbeResult;
    use crate::types::{BatteryInfo, GeoPosition, ScreenInfo, UaHints};
    use async_trait::async_trait;

    const PIXEL_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 7 Build/UQ1A.240205.002) \
                            AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.6261.64 \
                            Mobile Safari/537.36";

    struct PixelHost {
        hang: bool,
    }

    fn pixel_screen() -> ScreenInfo {
        ScreenInfo {
            width: 1080,
            height: 2400,
            avail_width: 1080,
            avail_height: 2280,
            color_depth: Some(24),
            pixel_ratio: 2.625,
        }
    }

    #[async_trait]
    impl DeviceHost for PixelHost {
        fn user_agent(&self) -> Option<String> {
            Some(PIXEL_UA.to_string())
        }

        fn platform(&self) -> Option<String> {
            Some("Linux armv8l".to_string())
        }

        fn screen(&self) -> Option<ScreenInfo> {
            Some(pixel_screen())
        }

        fn languages(&self) -> Vec<String> {
            vec!["en-US".to_string()]
        }

        async fn battery(&self) -> ProbeResult<BatteryInfo> {
            if self.hang {
                std::future::pending().await
            } else {
                Ok(BatteryInfo {
                    charging: false,
                    level: 0.62,
                    charging_time: None,
                    discharging_time: Some(9120.0),
                })
            }
        }

        async fn ua_hints(&self) -> ProbeResult<UaHints> {
            if self.hang {
                std::future::pending().await
            } else {
                Ok(UaHints {
                    model: None,
                    architecture: Some("arm".to_string()),
                    ua_full_version: Some("122.0.6261.64".to_string()),
                    platform: Some("Android".to_string()),
                    mobile: true,
                })
            }
        }

        async fn geolocation_fix(&self) -> ProbeResult<GeoPosition> {
            if self.hang {
                std::future::pending().await
            } else {
                Ok(GeoPosition {
                    lat: 37.0,
                    lon: -122.0,
                    accuracy: 10.0,
                })
            }
        }
    }

    fn collector(hang: bool) -> Collector {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.migrate().unwrap();
        let consent = Arc::new(ConsentStore::new(db.clone()));
        Collector::new(
            Arc::new(PixelHost { hang }),
            consent,
            db,
            CollectionConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_full_pass_merges_disjoint_fields() {
        let collector = collector(false);
        let record = collector.collect().await;

        assert_eq!(record.device_name.as_deref(), Some("Pixel 7"));
        assert_eq!(record.os_name.as_deref(), Some("Android"));
        assert_eq!(record.os_version.as_deref(), Some("14"));
        assert_eq!(record.browser_name.as_deref(), Some("Chrome"));
        assert_eq!(record.platform.as_deref(), Some("Linux armv8l"));
        assert_eq!(record.screen, Some(pixel_screen()));
        assert_eq!(record.battery.as_ref().unwrap().level, 0.62);
        // Hints land in the record and win over UA heuristics
        let hints = record.ua_hints.as_ref().unwrap();
        assert_eq!(hints.ua_full_version.as_deref(), Some("122.0.6261.64"));
        assert_eq!(hints.platform.as_deref(), Some("Android"));
        assert!(hints.mobile);
        assert_eq!(record.cpu_architecture.as_deref(), Some("arm"));
        // No geolocation consent yet: denied and absent look the same
        assert_eq!(record.geolocation, None);
        assert!(!record.bluetooth_access.available);
        assert!(record.session.session_id.starts_with("s_"));
    }

    #[tokio::test]
    async fn test_geolocation_follows_consent() {
        let collector = collector(false);
        collector
            .consent
            .set_decision(Capability::Geolocation, ConsentDecision::Granted)
            .unwrap();

        let record = collector.collect().await;
        let fix = record.geolocation.unwrap();
        assert_eq!((fix.lat, fix.lon, fix.accuracy), (37.0, -122.0, 10.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_produces_fallback_record() {
        let collector = collector(true);
        let started = tokio::time::Instant::now();

        let record = collector.collect().await;

        // Paused-time test: the deadline fires at exactly the configured
        // ten seconds without real waiting
        assert_eq!(started.elapsed(), Duration::from_secs(10));

        // Synchronously available fields survive the fallback
        assert_eq!(record.os_name.as_deref(), Some("Android"));
        assert_eq!(record.browser_name.as_deref(), Some("Chrome"));
        assert_eq!(record.screen, Some(pixel_screen()));
        assert_eq!(record.platform.as_deref(), Some("Linux armv8l"));
        assert_eq!(record.user_agent.as_deref(), Some(PIXEL_UA));
        // Abandoned probes produce nothing
        assert_eq!(record.battery, None);
        assert_eq!(record.geolocation, None);
        assert_eq!(record.ua_hints, None);
    }

    #[tokio::test]
    async fn test_interaction_events_land_in_record() {
        let collector = collector(false);
        collector.record_click();
        collector.record_scroll(480);
        collector.record_form_submit();

        let record = collector.collect().await;
        assert_eq!(record.session.click_count, 1);
        assert_eq!(record.session.scroll_depth, 480);
        assert_eq!(record.session.form_submits, 1);
    }
}
