//! Local SQLite store
//!
//! Two concerns live here:
//! - the durable/volatile key-value scopes that back client-side state
//!   (consent flags, session id, interaction counters, gate state), and
//! - a degraded local device store the transport adapter falls back to
//!   when the backend is unreachable, mirroring the external endpoints
//!   (add / list / count / search / delete).

pub mod schema;
pub mod store;

pub use store::{Database, LocalDevice, Scope};
