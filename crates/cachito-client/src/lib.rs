// crates/cachito-client/src/lib.rs
// ============================================================================
// Module: Cachito Client Library
// Description: Typed HTTP client for the Cachito request API.
// Purpose: Submit requests, poll for completion, and fetch request artifacts.
// Dependencies: reqwest, serde, tar, flate2, tokio, tracing
// ============================================================================

//! ## Overview
//! This crate wraps the Cachito REST API used by the package system tests:
//! request submission, completion polling, bundle download and extraction,
//! content-manifest retrieval, and SBOM retrieval.
//! Invariants:
//! - Non-success HTTP statuses surface as [`ClientError::Status`].
//! - Polling is bounded by [`ClientConfig::completion_timeout`].
//! - Bundle extraction rejects special entries and paths escaping the destination.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod archive;
pub mod auth;
pub mod client;
pub mod error;
pub mod types;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use archive::ArchiveError;
pub use archive::ArchiveLimits;
pub use archive::extract_tar_gz;
pub use auth::AuthConfig;
pub use auth::AuthType;
pub use client::CachitoClient;
pub use client::ClientConfig;
pub use client::TranscriptEntry;
pub use error::ClientError;
pub use types::ApiResponse;
pub use types::RequestPayload;
pub use types::RequestState;
