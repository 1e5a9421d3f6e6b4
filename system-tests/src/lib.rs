// system-tests/src/lib.rs
// ============================================================================
// Module: Cachito Package System Tests Library
// Description: Fixtures, checks, and scenario orchestration for package tests.
// Purpose: Drive a Cachito deployment through the package scenario matrix.
// Dependencies: cachito-client, serde_yaml, jsonschema, tracing
// ============================================================================

//! ## Overview
//! This crate hosts the shared configuration, fixture loading, response checks,
//! and scenario pipeline used by the package system tests in
//! `system-tests/tests`. Each scenario submits a request built from YAML
//! fixture data, waits for it to finish, and verifies the response, the source
//! bundle, the content manifest, and the SBOM.
//! Invariants:
//! - Service responses and fixture documents are treated as untrusted input.
//! - The first failing check aborts the scenario with a descriptive error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod artifacts;
pub mod checks;
pub mod config;
pub mod content_manifest;
pub mod fixtures;
pub mod logging;
pub mod scenario;
