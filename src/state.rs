//! Application state records and snapshot decoding.
//!
//! This module provides the data types that the store, channel, and client
//! modules all depend on, plus the pure payload-validation function used to
//! turn raw push payloads into typed snapshots. No I/O occurs here.

use serde::{Deserialize, Serialize};

/// One managed application as reported by the backend.
///
/// The backend owns the schema. Only the identity and status fields are
/// named here; every other field the backend sends is captured verbatim in
/// [`details`](ApplicationState::details) and round-trips through
/// serialization untouched. The store never interprets any of these fields,
/// it only replaces whole collections of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationState {
    /// Backend-assigned application identifier.
    pub id: String,
    /// Current lifecycle status string (e.g., `"running"`, `"stopped"`).
    pub status: String,
    /// All remaining backend-defined fields, preserved as-is.
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Full, authoritative collection of application states at one instant.
///
/// Each snapshot fully supersedes the prior one; there are no identity or
/// merge semantics across snapshots.
pub type StateSnapshot = Vec<ApplicationState>;

/// Validate a raw push payload into a typed [`StateSnapshot`].
///
/// # Arguments
///
/// * `payload` - The JSON payload carried by a push event.
///
/// # Errors
///
/// Returns the underlying `serde_json` error if the payload is not an array
/// of application state records. Callers treat this as a no-op condition,
/// not a fault.
pub(crate) fn decode_snapshot(payload: serde_json::Value) -> Result<StateSnapshot, serde_json::Error> {
    serde_json::from_value(payload)
}
