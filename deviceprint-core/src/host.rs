//! The seam between probes and ambient device state
//!
//! Everything a collection pass can read about the device comes through
//! [`DeviceHost`]. Embedders implement it over their platform bindings;
//! tests implement it over fixed values.
//!
//! Synchronously available facts (user agent, screen geometry, display
//! modes, ...) are plain accessors. Anything that suspends — permission
//! prompts, geolocation fixes, battery queries, network lookups — is an
//! async method returning a [`ProbeResult`].
//!
//! Every method has a default body returning the "unsupported" shape, so
//! a host only wires up the capabilities its platform actually has; an
//! unwired capability is indistinguishable from an unsupported one, which
//! is exactly the record contract.

use async_trait::async_trait;

use crate::probe::{ProbeError, ProbeResult};
use crate::types::{
    BatteryInfo, ConnectionInfo, GeoPosition, IpGeolocation, MediaAccess, PageInfo, PwaInfo,
    ScreenInfo, UaHints,
};

/// Read access to ambient device, browser and network state.
#[allow(unused_variables)]
#[async_trait]
pub trait DeviceHost: Send + Sync {
    // --- synchronously available facts ---

    fn user_agent(&self) -> Option<String> {
        None
    }

    fn platform(&self) -> Option<String> {
        None
    }

    fn screen(&self) -> Option<ScreenInfo> {
        None
    }

    fn languages(&self) -> Vec<String> {
        Vec::new()
    }

    fn timezone(&self) -> Option<String> {
        None
    }

    fn cookies_enabled(&self) -> bool {
        false
    }

    fn do_not_track(&self) -> Option<String> {
        None
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        None
    }

    fn device_memory_gb(&self) -> Option<f64> {
        None
    }

    fn max_touch_points(&self) -> u32 {
        0
    }

    fn page(&self) -> Option<PageInfo> {
        None
    }

    fn connection(&self) -> Option<ConnectionInfo> {
        None
    }

    fn display_modes(&self) -> PwaInfo {
        PwaInfo::default()
    }

    // --- suspending queries ---

    async fn battery(&self) -> ProbeResult<BatteryInfo> {
        Err(ProbeError::Unsupported)
    }

    /// High-entropy user-agent hints (model, architecture, full version).
    async fn ua_hints(&self) -> ProbeResult<UaHints> {
        Err(ProbeError::Unsupported)
    }

    /// One geolocation fix. Only called when geolocation consent is granted.
    async fn geolocation_fix(&self) -> ProbeResult<GeoPosition> {
        Err(ProbeError::Unsupported)
    }

    /// Microphone/camera access outcome. May prompt; only called through
    /// an explicit consent request or when camera consent is granted.
    async fn media_access(&self) -> ProbeResult<MediaAccess> {
        Err(ProbeError::Unsupported)
    }

    /// Clipboard text. Only called when clipboard consent is granted.
    async fn clipboard_text(&self) -> ProbeResult<String> {
        Err(ProbeError::Unsupported)
    }

    /// Bluetooth device chooser. Never called during passive collection.
    async fn bluetooth_device(&self) -> ProbeResult<Option<String>> {
        Err(ProbeError::Unsupported)
    }

    /// USB device chooser. Never called during passive collection.
    async fn usb_device(&self) -> ProbeResult<Option<String>> {
        Err(ProbeError::Unsupported)
    }

    /// Current push notification permission. Must not prompt.
    async fn push_permission(&self) -> ProbeResult<bool> {
        Err(ProbeError::Unsupported)
    }

    /// Push subscription token; only queried when permission is granted.
    async fn push_token(&self) -> ProbeResult<serde_json::Value> {
        Err(ProbeError::Unsupported)
    }

    /// Public IP as seen from outside, via an external echo service.
    async fn public_ip(&self) -> ProbeResult<String> {
        Err(ProbeError::Unsupported)
    }

    /// Coarse geolocation for an IP, via an external lookup service.
    async fn ip_geolocation(&self, ip: &str) -> ProbeResult<IpGeolocation> {
        Err(ProbeError::Unsupported)
    }
}
