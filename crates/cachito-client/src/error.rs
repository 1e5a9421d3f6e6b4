// crates/cachito-client/src/error.rs
// ============================================================================
// Module: Client Errors
// Description: Error taxonomy for Cachito API interactions.
// Purpose: Distinguish transport, status, decode, and polling failures.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every fallible client operation returns [`ClientError`]. Messages carry the
//! request URL or request id so test failures point at the failing exchange.

use std::time::Duration;

use thiserror::Error;

use crate::archive::ArchiveError;

/// Errors raised by [`crate::CachitoClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Client configuration was rejected.
    #[error("invalid client config: {0}")]
    Config(String),
    /// A URL could not be built from the API base.
    #[error("invalid url: {0}")]
    Url(String),
    /// The HTTP exchange failed before a response was received.
    #[error("http failure: {0}")]
    Http(String),
    /// The service answered with a non-success status.
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        /// HTTP method of the failing request.
        method: &'static str,
        /// Requested URL.
        url: String,
        /// Returned status code.
        status: u16,
        /// Response body text, truncated for readability.
        body: String,
    },
    /// The response body could not be decoded.
    #[error("decode failure: {0}")]
    Decode(String),
    /// The request did not reach a terminal state in time.
    #[error(
        "request {request_id} did not finish within {}s (last state: {last_state})",
        .elapsed.as_secs()
    )]
    Timeout {
        /// Identifier of the polled request.
        request_id: u64,
        /// Time spent polling.
        elapsed: Duration,
        /// Last state reported by the service.
        last_state: String,
    },
    /// Local filesystem failure while storing a download.
    #[error("io failure: {0}")]
    Io(String),
    /// Downloaded bundle could not be extracted.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}
