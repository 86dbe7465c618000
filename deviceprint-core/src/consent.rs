//! Typed consent store
//!
//! Replaces ad-hoc string keys scattered across the page with one typed
//! mapping of capability → decision, persisted in the durable scope.
//!
//! Requesting a permission is the only place the gated probes (media,
//! clipboard, geolocation, Bluetooth, USB) may run interactively. For the
//! Bluetooth/USB choosers the outcome is cached, and passive collection
//! replays the cached [`PeripheralAccess`] instead of re-opening the
//! chooser. Every decision change is broadcast so the pipeline can run a
//! forced re-collection.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::db::{Database, Scope};
use crate::error::Result;
use crate::host::DeviceHost;
use crate::types::PeripheralAccess;

/// A consent-gated capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Camera,
    Clipboard,
    Geolocation,
    Bluetooth,
    Usb,
}

impl Capability {
    /// All gated capabilities, in display order.
    pub fn all() -> [Capability; 5] {
        [
            Capability::Camera,
            Capability::Clipboard,
            Capability::Geolocation,
            Capability::Bluetooth,
            Capability::Usb,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Camera => "camera",
            Capability::Clipboard => "clipboard",
            Capability::Geolocation => "geolocation",
            Capability::Bluetooth => "bluetooth",
            Capability::Usb => "usb",
        }
    }

    /// Durable storage key holding the decision.
    fn storage_key(&self) -> &'static str {
        match self {
            Capability::Camera => "consent_camera",
            Capability::Clipboard => "consent_clipboard",
            Capability::Geolocation => "consent_geolocation",
            Capability::Bluetooth => "consent_bluetooth",
            Capability::Usb => "consent_usb",
        }
    }

    /// Durable storage key caching the chooser outcome, if this
    /// capability has one.
    fn outcome_key(&self) -> Option<&'static str> {
        match self {
            Capability::Bluetooth => Some("bluetooth_access"),
            Capability::Usb => Some("usb_access"),
            _ => None,
        }
    }
}

/// The user's decision for one capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsentDecision {
    Granted,
    Denied,
    #[default]
    Unknown,
}

impl ConsentDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentDecision::Granted => "granted",
            ConsentDecision::Denied => "denied",
            ConsentDecision::Unknown => "unknown",
        }
    }

    /// Parse a stored decision. Accepts the legacy "true"/"false" values
    /// an older collector wrote for geolocation.
    pub fn parse(s: &str) -> Self {
        match s {
            "granted" | "true" => ConsentDecision::Granted,
            "denied" | "false" => ConsentDecision::Denied,
            _ => ConsentDecision::Unknown,
        }
    }
}

/// Broadcast payload for a decision change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentChange {
    pub capability: Capability,
    pub decision: ConsentDecision,
}

/// Durable per-capability consent state with change notification.
pub struct ConsentStore {
    db: Arc<Database>,
    events: broadcast::Sender<ConsentChange>,
}

impl ConsentStore {
    pub fn new(db: Arc<Database>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self { db, events }
    }

    /// Current decision for a capability. Store errors read as Unknown.
    pub fn decision(&self, capability: Capability) -> ConsentDecision {
        match self.db.kv_get(Scope::Durable, capability.storage_key()) {
            Ok(Some(value)) => ConsentDecision::parse(&value),
            Ok(None) => ConsentDecision::Unknown,
            Err(err) => {
                tracing::debug!(capability = capability.as_str(), %err, "consent read failed");
                ConsentDecision::Unknown
            }
        }
    }

    /// Persist a decision and notify subscribers.
    pub fn set_decision(&self, capability: Capability, decision: ConsentDecision) -> Result<()> {
        self.db
            .kv_set(Scope::Durable, capability.storage_key(), decision.as_str())?;
        tracing::info!(
            capability = capability.as_str(),
            decision = decision.as_str(),
            "Consent decision updated"
        );
        // No receivers is fine; the pipeline may not be watching yet
        let _ = self.events.send(ConsentChange {
            capability,
            decision,
        });
        Ok(())
    }

    /// Subscribe to decision changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsentChange> {
        self.events.subscribe()
    }

    /// Cached chooser outcome for Bluetooth/USB; `{available: false}`
    /// when nothing was ever granted.
    pub fn peripheral(&self, capability: Capability) -> PeripheralAccess {
        let Some(key) = capability.outcome_key() else {
            return PeripheralAccess::default();
        };
        match self.db.kv_get(Scope::Durable, key) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_default(),
            _ => PeripheralAccess::default(),
        }
    }

    /// Run the gated probe for a capability, persist the outcome as the
    /// new decision, and notify subscribers.
    ///
    /// This is the only entry point that may open a permission prompt or
    /// device chooser; passive collection never does.
    pub async fn request_permission(
        &self,
        capability: Capability,
        host: &dyn DeviceHost,
    ) -> Result<ConsentDecision> {
        let decision = match capability {
            Capability::Camera => match host.media_access().await {
                Ok(media) if media.camera => ConsentDecision::Granted,
                _ => ConsentDecision::Denied,
            },
            Capability::Clipboard => match host.clipboard_text().await {
                Ok(_) => ConsentDecision::Granted,
                Err(_) => ConsentDecision::Denied,
            },
            Capability::Geolocation => match host.geolocation_fix().await {
                Ok(_) => ConsentDecision::Granted,
                Err(_) => ConsentDecision::Denied,
            },
            Capability::Bluetooth => {
                let access = match host.bluetooth_device().await {
                    Ok(device) => PeripheralAccess {
                        available: true,
                        device,
                    },
                    Err(_) => PeripheralAccess::default(),
                };
                self.cache_peripheral(capability, &access)?;
                if access.available {
                    ConsentDecision::Granted
                } else {
                    ConsentDecision::Denied
                }
            }
            Capability::Usb => {
                let access = match host.usb_device().await {
                    Ok(device) => PeripheralAccess {
                        available: true,
                        device,
                    },
                    Err(_) => PeripheralAccess::default(),
                };
                self.cache_peripheral(capability, &access)?;
                if access.available {
                    ConsentDecision::Granted
                } else {
                    ConsentDecision::Denied
                }
            }
        };

        self.set_decision(capability, decision)?;
        Ok(decision)
    }

    fn cache_peripheral(&self, capability: Capability, access: &PeripheralAccess) -> Result<()> {
        if let Some(key) = capability.outcome_key() {
            self.db
                .kv_set(Scope::Durable, key, &serde_json::to_string(access)?)?;
        }
        Ok(())
    }
}
