//! Consent-gated and best-effort capability probes
//!
//! Each function here is one probe: it consults the consent store where
//! the capability is gated, queries the host, and collapses any failure
//! to the record boundary shape. The Bluetooth/USB choosers are absent on
//! purpose — passive collection replays their cached outcome from the
//! consent store instead (see [`crate::consent::ConsentStore::peripheral`]).

use crate::consent::{Capability, ConsentDecision, ConsentStore};
use crate::host::DeviceHost;
use crate::probe::settle;
use crate::types::{BatteryInfo, GeoPosition, IpGeolocation, MediaAccess, UaHints};

/// Battery state; ungated, best-effort.
pub async fn battery(host: &dyn DeviceHost) -> Option<BatteryInfo> {
    settle("battery", host.battery().await)
}

/// High-entropy UA hints; ungated, may be blocked by the platform.
pub async fn ua_hints(host: &dyn DeviceHost) -> Option<UaHints> {
    settle("ua_hints", host.ua_hints().await)
}

/// A geolocation fix, only when consent is granted.
pub async fn geolocation(host: &dyn DeviceHost, consent: &ConsentStore) -> Option<GeoPosition> {
    if consent.decision(Capability::Geolocation) != ConsentDecision::Granted {
        return None;
    }
    settle("geolocation", host.geolocation_fix().await)
}

/// Microphone/camera availability, only when camera consent is granted.
pub async fn media_access(host: &dyn DeviceHost, consent: &ConsentStore) -> Option<MediaAccess> {
    if consent.decision(Capability::Camera) != ConsentDecision::Granted {
        return None;
    }
    settle("media_access", host.media_access().await)
}

/// Clipboard text, only when clipboard consent is granted.
pub async fn clipboard(host: &dyn DeviceHost, consent: &ConsentStore) -> Option<String> {
    if consent.decision(Capability::Clipboard) != ConsentDecision::Granted {
        return None;
    }
    settle("clipboard", host.clipboard_text().await)
}

/// Push permission state and, when granted, the subscription token.
/// Reads the current state; never prompts.
pub async fn push_status(host: &dyn DeviceHost) -> (bool, Option<serde_json::Value>) {
    let granted = settle("push_permission", host.push_permission().await).unwrap_or(false);
    if !granted {
        return (false, None);
    }
    let token = settle("push_token", host.push_token().await);
    (true, token)
}

/// Public IP via the external echo service; ungated, best-effort.
pub async fn public_ip(host: &dyn DeviceHost) -> Option<String> {
    settle("public_ip", host.public_ip().await)
}

/// IP-based coarse geolocation. Depends on the public-IP probe and
/// tolerates it having produced nothing.
pub async fn ip_geolocation(host: &dyn DeviceHost, ip: Option<&str>) -> Option<IpGeolocation> {
    let ip = ip?;
    settle("ip_geolocation", host.ip_geolocation(ip).await)
}
