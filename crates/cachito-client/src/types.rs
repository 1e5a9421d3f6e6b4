// crates/cachito-client/src/types.rs
// ============================================================================
// Module: API Types
// Description: Request payloads and response envelopes for the Cachito API.
// Purpose: Keep wire shapes in one place with typed state accessors.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Request payloads are strongly typed; response bodies stay as raw JSON
//! because the test suites compare them field by field against fixtures.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Request Payload
// ============================================================================

/// Body of `POST /requests`.
///
/// # Invariants
/// - Optional fields are omitted from the JSON body when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    /// Source repository URL.
    pub repo: String,
    /// Git commit to resolve.
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Package managers to run; omitted to let the service detect them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkg_managers: Option<Vec<String>>,
    /// Request flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<String>>,
    /// Per package-manager package selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Value>,
}

// ============================================================================
// SECTION: Request State
// ============================================================================

/// Lifecycle state reported by the service for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    /// Request is still being processed.
    InProgress,
    /// Request finished successfully.
    Complete,
    /// Request failed.
    Failed,
    /// Request artifacts were purged.
    Stale,
    /// Unrecognized state label.
    Other(String),
}

impl RequestState {
    /// Parses a state label from the API.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label {
            "in_progress" => Self::InProgress,
            "complete" => Self::Complete,
            "failed" => Self::Failed,
            "stale" => Self::Stale,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the API label for this state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Stale => "stale",
            Self::Other(label) => label,
        }
    }

    /// Returns true when the service will not change the state any more.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Stale)
    }
}

// ============================================================================
// SECTION: Response Envelope
// ============================================================================

/// Decoded API response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    /// Request identifier the response belongs to.
    pub id: u64,
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub data: Value,
}

impl ApiResponse {
    /// Returns the request state, if the body carries one.
    #[must_use]
    pub fn state(&self) -> Option<RequestState> {
        self.data.get("state").and_then(Value::as_str).map(RequestState::parse)
    }

    /// Returns the human-readable reason for the current state.
    #[must_use]
    pub fn state_reason(&self) -> Option<&str> {
        self.data.get("state_reason").and_then(Value::as_str)
    }
}
