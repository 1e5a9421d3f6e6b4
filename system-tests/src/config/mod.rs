// system-tests/src/config/mod.rs
// ============================================================================
// Module: System Test Configuration
// Description: Centralized configuration for the package system tests.
// Purpose: Provide typed access to service settings, credentials, and paths.
// Dependencies: cachito-client, serde, toml
// ============================================================================

//! ## Overview
//! System-test configuration is read from an optional TOML file plus
//! environment variables and mapped into a small typed structure that also
//! produces the service client configuration.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod env;

// ============================================================================
// SECTION: Tests
// ============================================================================


// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use env::ConfigError;
pub use env::SystemTestConfig;
pub use env::SystemTestEnv;
pub use env::read_env_strict;
