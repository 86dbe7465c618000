//! # deviceprint-core
//!
//! Core library for deviceprint - a consent-aware device fingerprint
//! collector.
//!
//! This library provides:
//! - Domain types for device records, probes and session telemetry
//! - Capability probes behind the [`DeviceHost`] seam
//! - A deadline-bounded collection orchestrator
//! - A submission gate with signature-based duplicate suppression
//! - HTTP transport with a degrading local fallback store
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! One collection pass flows through three stages:
//! - **Probe:** each capability is read independently, consent-gated
//!   where required, with per-probe failure containment
//! - **Collect:** the orchestrator merges probe results into one
//!   [`DeviceRecord`], bounded by a hard deadline
//! - **Submit:** the gate decides whether the record is worth sending
//!   and hands it to the transport, which falls back to the local store
//!   when the backend is unreachable
//!
//! ## Example
//!
//! ```rust,no_run
//! use deviceprint_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open the local store
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use collect::Collector;
pub use config::Config;
pub use consent::{Capability, ConsentChange, ConsentDecision, ConsentStore};
pub use db::{Database, Scope};
pub use error::{Error, Result};
pub use gate::{RejectReason, SubmissionGate, SubmitOutcome};
pub use host::DeviceHost;
pub use pipeline::Pipeline;
pub use transport::{DeviceApiClient, FallbackSink, RecordSink};
pub use types::*;

// Public modules
pub mod collect;
pub mod config;
pub mod consent;
pub mod db;
pub mod error;
pub mod gate;
pub mod host;
pub mod logging;
pub mod pipeline;
pub mod probe;
pub mod transport;
pub mod types;
