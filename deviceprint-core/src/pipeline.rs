//! Collection pipeline
//!
//! Wires collector, gate and sink into the two entry points callers use:
//! a single gated pass ([`Pipeline::run_once`]) and the consent watcher
//! ([`Pipeline::watch_consent`]) that forces a re-collection whenever a
//! decision changes, so granted capabilities show up in the backend
//! without waiting for the next scheduled pass.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use crate::collect::Collector;
use crate::consent::ConsentStore;
use crate::error::Result;
use crate::gate::{SubmissionGate, SubmitOutcome};
use crate::transport::RecordSink;
use crate::types::DeviceRecord;

/// Collector, gate and sink as one unit.
pub struct Pipeline {
    collector: Collector,
    gate: SubmissionGate,
    sink: Arc<dyn RecordSink>,
    consent: Arc<ConsentStore>,
}

impl Pipeline {
    pub fn new(
        collector: Collector,
        gate: SubmissionGate,
        sink: Arc<dyn RecordSink>,
        consent: Arc<ConsentStore>,
    ) -> Self {
        Self {
            collector,
            gate,
            sink,
            consent,
        }
    }

    /// Run one collection pass and submit the record through the gate.
    ///
    /// Returns the record together with the gate's verdict, so callers
    /// can inspect what was collected even when submission was rejected.
    pub async fn run_once(&self, force: bool) -> Result<(DeviceRecord, SubmitOutcome)> {
        let record = self.collector.collect().await;
        let outcome = self.gate.submit(&record, force, self.sink.as_ref()).await?;
        Ok((record, outcome))
    }

    /// Watch consent changes and force a re-collection for each one.
    ///
    /// Runs until the consent store is dropped. A lagged receiver logs
    /// and keeps receiving; a missed intermediate change is harmless
    /// since the next pass reads the current decisions anyway.
    pub async fn watch_consent(&self) {
        let mut rx = self.consent.subscribe();
        loop {
            match rx.recv().await {
                Ok(change) => {
                    tracing::info!(
                        capability = change.capability.as_str(),
                        decision = change.decision.as_str(),
                        "Consent changed, forcing re-collection"
                    );
                    match self.run_once(true).await {
                        Ok((_, outcome)) => {
                            tracing::debug!(?outcome, "forced pass finished");
                        }
                        Err(err) => {
                            tracing::warn!(%err, "forced pass failed");
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "consent watcher lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn consent(&self) -> &ConsentStore {
        &self.consent
    }
}
