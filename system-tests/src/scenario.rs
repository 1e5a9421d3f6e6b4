// system-tests/src/scenario.rs
// ============================================================================
// Module: Package Scenario
// Description: End-to-end pipeline for one package scenario.
// Purpose: Submit a fixture request and run every check against its output.
// Dependencies: cachito-client, tracing
// ============================================================================

//! ## Overview
//! A scenario loads its fixture, submits the request, waits for a terminal
//! state, and then runs the checks in order: completion, response elements,
//! bundle files, content manifest, SBOM. The first failure aborts the run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use cachito_client::CachitoClient;
use cachito_client::ClientError;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::checks::CHECK_COMPLETED;
use crate::checks::CHECK_CONTENT_MANIFEST;
use crate::checks::CHECK_EXPECTED_FILES;
use crate::checks::CHECK_RESPONSE_ELEMENTS;
use crate::checks::CHECK_SBOM;
use crate::checks::CheckFailure;
use crate::checks::assert_content_manifest;
use crate::checks::assert_elements_from_response;
use crate::checks::assert_expected_files;
use crate::checks::assert_properly_completed_response;
use crate::checks::assert_sbom;
use crate::config::ConfigError;
use crate::config::SystemTestConfig;
use crate::content_manifest::parse_image_contents;
use crate::fixtures::FixtureError;
use crate::fixtures::ScenarioId;
use crate::fixtures::build_payload;
use crate::fixtures::load_scenario;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of a scenario whose checks all passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioOutcome {
    /// Scenario label, `file/name`.
    pub scenario: String,
    /// Identifier assigned by the service.
    pub request_id: u64,
    /// Checks that passed, in execution order.
    pub checks_passed: Vec<&'static str>,
}

/// Scenario failures.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Configuration could not produce a client.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Fixture data could not be loaded.
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    /// A service call failed outside of a check.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// A check rejected the service output.
    #[error(transparent)]
    Check(#[from] CheckFailure),
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Runs a package scenario with a client built from `config`.
///
/// # Errors
///
/// Returns [`ScenarioError`] for configuration problems and for the first
/// failing step.
pub async fn run_package_scenario(
    config: &SystemTestConfig,
    id: ScenarioId,
    workdir: &Path,
) -> Result<ScenarioOutcome, ScenarioError> {
    let client = CachitoClient::new(config.client_config()?)?;
    run_scenario_with_client(&client, &config.fixtures_dir, id, workdir).await
}

/// Runs a package scenario with an existing client.
///
/// Lets callers inspect the client transcript after the run.
///
/// # Errors
///
/// Returns [`ScenarioError`] for the first failing step.
pub async fn run_scenario_with_client(
    client: &CachitoClient,
    fixtures_dir: &Path,
    id: ScenarioId,
    workdir: &Path,
) -> Result<ScenarioOutcome, ScenarioError> {
    let data = load_scenario(fixtures_dir, id)?;
    let payload = build_payload(id, &data);
    let mut passed = Vec::new();

    let initial = client.create_new_request(&payload).await?;
    info!(scenario = %id, request_id = initial.id, "scenario request submitted");
    let completed = client.wait_for_complete_request(&initial).await?;
    let request_id = completed.id;

    let result = async {
        assert_properly_completed_response(&completed)?;
        passed.push(CHECK_COMPLETED);
        assert_elements_from_response(&completed.data, &data.response_expectations)?;
        passed.push(CHECK_RESPONSE_ELEMENTS);

        let source_path = client.download_and_extract_archive(request_id, workdir).await?;
        assert_expected_files(&source_path, &data.expected_files, client, workdir).await?;
        passed.push(CHECK_EXPECTED_FILES);

        let image_contents = parse_image_contents(data.content_manifest.as_deref());
        assert_content_manifest(client, request_id, &image_contents).await?;
        passed.push(CHECK_CONTENT_MANIFEST);

        assert_sbom(client, request_id, data.sbom.as_deref()).await?;
        passed.push(CHECK_SBOM);
        Ok::<(), ScenarioError>(())
    }
    .await;

    match result {
        Ok(()) => {
            info!(scenario = %id, request_id, checks = passed.len(), "scenario passed");
            Ok(ScenarioOutcome {
                scenario: id.to_string(),
                request_id,
                checks_passed: passed,
            })
        }
        Err(err) => {
            warn!(scenario = %id, request_id, error = %err, "scenario failed");
            Err(err)
        }
    }
}
