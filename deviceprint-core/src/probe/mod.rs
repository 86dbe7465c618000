//! Capability probes
//!
//! A probe reads exactly one device capability and contains its own
//! failures: internally it works with [`ProbeResult`], and at the record
//! boundary every failure collapses to `None` (or an `{available: false}`
//! shape). No probe may panic or propagate an error past its boundary.
//!
//! Probes are independent and order-insensitive, with one exception: the
//! IP-geolocation probe consumes the public-IP probe's output and must
//! tolerate it being `None`.
//!
//! Probes that open a permission chooser (Bluetooth, USB) never run
//! during passive collection; they are only triggered through
//! [`crate::consent::ConsentStore::request_permission`].

pub mod capability;
pub mod identity;
pub mod storage;

use thiserror::Error;

/// Why a single probe produced no value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The capability does not exist on this host
    #[error("capability unsupported")]
    Unsupported,

    /// The user or platform denied access
    #[error("capability denied")]
    Denied,

    /// The capability exists but the read failed
    #[error("probe failed: {0}")]
    Failed(String),
}

/// Result of one capability read, before collapsing at the record boundary.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Collapse a probe result to the record boundary shape.
///
/// Failures are logged at debug level and become `None`; consumers cannot
/// distinguish denial from absence, by contract.
pub fn settle<T>(probe: &'static str, result: ProbeResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(probe, %err, "probe settled without a value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_collapses_failures() {
        assert_eq!(settle("ok", Ok(1)), Some(1));
        assert_eq!(settle::<u32>("unsupported", Err(ProbeError::Unsupported)), None);
        assert_eq!(settle::<u32>("denied", Err(ProbeError::Denied)), None);
        assert_eq!(
            settle::<u32>("failed", Err(ProbeError::Failed("boom".into()))),
            None
        );
    }
}
