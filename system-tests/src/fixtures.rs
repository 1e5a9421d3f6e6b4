// system-tests/src/fixtures.rs
// ============================================================================
// Module: Scenario Fixtures
// Description: YAML fixture loading and the package scenario matrix.
// Purpose: Turn fixture data into request payloads and expectations.
// Dependencies: cachito-client, serde, serde_yaml
// ============================================================================

//! ## Overview
//! Each fixture file (for example `gomod_packages.yaml`) maps scenario names
//! to the repository to submit and the expectations to verify. The package
//! matrix [`PACKAGE_SCENARIOS`] names every `(file, scenario)` pair exercised
//! by the live suite.
//! Invariants:
//! - `pkg_managers` defaults to an empty list in the payload.
//! - The `implicit_gomod` scenario omits `pkg_managers` entirely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use cachito_client::RequestPayload;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::content_manifest::ContentManifestEntry;

// ============================================================================
// SECTION: Fixture Types
// ============================================================================

/// Expectations and request inputs for one scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioData {
    /// Repository URL to submit.
    pub repo: String,
    /// Commit to submit.
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Package managers to request.
    #[serde(default)]
    pub pkg_managers: Option<Vec<String>>,
    /// Request flags.
    #[serde(default)]
    pub flags: Option<Vec<String>>,
    /// Per package-manager package selection.
    #[serde(default)]
    pub packages: Option<Value>,
    /// Fields expected in the completed request record.
    #[serde(default)]
    pub response_expectations: Map<String, Value>,
    /// Bundle-relative path to reference URL.
    #[serde(default)]
    pub expected_files: BTreeMap<String, String>,
    /// Expected content manifest entries.
    #[serde(default)]
    pub content_manifest: Option<Vec<ContentManifestEntry>>,
    /// Expected SBOM components.
    #[serde(default)]
    pub sbom: Option<Vec<Value>>,
}

/// Fixture loading failures.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// Fixture file could not be read.
    #[error("failed to read fixture {path}: {message}")]
    Io {
        /// Fixture path.
        path: String,
        /// Failure detail.
        message: String,
    },
    /// Fixture file is not valid scenario YAML.
    #[error("failed to parse fixture {path}: {message}")]
    Parse {
        /// Fixture path.
        path: String,
        /// Failure detail.
        message: String,
    },
    /// Scenario name is absent from the fixture file.
    #[error("scenario {name} not found in {file}")]
    MissingScenario {
        /// Fixture file name.
        file: String,
        /// Scenario name.
        name: String,
    },
}

/// Loads every scenario from a fixture file.
///
/// # Errors
///
/// Returns [`FixtureError`] when the file is unreadable or malformed.
pub fn load_test_data(
    fixtures_dir: &Path,
    file_name: &str,
) -> Result<BTreeMap<String, ScenarioData>, FixtureError> {
    let path = fixtures_dir.join(file_name);
    let raw = fs::read_to_string(&path).map_err(|err| FixtureError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    serde_yaml::from_str(&raw).map_err(|err| FixtureError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Loads a single scenario.
///
/// # Errors
///
/// Returns [`FixtureError`] when the file fails to load or lacks the scenario.
pub fn load_scenario(fixtures_dir: &Path, id: ScenarioId) -> Result<ScenarioData, FixtureError> {
    let file = id.fixture_file();
    let mut scenarios = load_test_data(fixtures_dir, &file)?;
    scenarios.remove(id.env_name).ok_or_else(|| FixtureError::MissingScenario {
        file,
        name: id.env_name.to_string(),
    })
}

// ============================================================================
// SECTION: Scenario Matrix
// ============================================================================

/// Scenario whose payload leaves package manager detection to the service.
const IMPLICIT_GOMOD: &str = "implicit_gomod";

/// Identifies a scenario by fixture file stem and scenario name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScenarioId {
    /// Fixture file stem, e.g. `pip_packages`.
    pub env_package: &'static str,
    /// Scenario key inside the fixture file.
    pub env_name: &'static str,
}

impl ScenarioId {
    /// Creates a scenario id.
    #[must_use]
    pub const fn new(env_package: &'static str, env_name: &'static str) -> Self {
        Self {
            env_package,
            env_name,
        }
    }

    /// Returns the fixture file name.
    #[must_use]
    pub fn fixture_file(self) -> String {
        format!("{}.yaml", self.env_package)
    }

    /// Returns a filesystem-safe label for artifacts.
    #[must_use]
    pub fn slug(self) -> String {
        format!("{}__{}", self.env_package, self.env_name)
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.env_package, self.env_name)
    }
}

/// Package scenarios exercised by the live suite.
pub const PACKAGE_SCENARIOS: [ScenarioId; 36] = [
    ScenarioId::new("pip_packages", "without_deps"),
    ScenarioId::new("pip_packages", "with_deps"),
    ScenarioId::new("pip_packages", "multiple"),
    ScenarioId::new("pip_packages", "git_submodule"),
    ScenarioId::new("go_generate_packages", "go_generate"),
    ScenarioId::new("go_generate_packages", "go_generate_generated"),
    ScenarioId::new("go_generate_packages", "go_generate_imported"),
    ScenarioId::new("go_generate_packages", "go_generate_imported_generated"),
    ScenarioId::new("gomod_packages", "without_deps"),
    ScenarioId::new("gomod_packages", "without_deps_vendor_check"),
    ScenarioId::new("gomod_packages", "with_deps"),
    ScenarioId::new("gomod_packages", "vendored_with_flag"),
    ScenarioId::new("gomod_packages", IMPLICIT_GOMOD),
    ScenarioId::new("gomod_packages", "missing_gomod"),
    ScenarioId::new("gomod_packages", "force_tidy_without_deps"),
    ScenarioId::new("gomod_packages", "force_tidy_vendored"),
    ScenarioId::new("gomod_packages", "symlink_loop"),
    ScenarioId::new("gomod_packages", "without_pkg_manager"),
    ScenarioId::new("gomod_packages", "with_local_replacements_in_parent_dir"),
    ScenarioId::new("gomod_vendor_check", "correct_vendor"),
    ScenarioId::new("gomod_vendor_check", "no_vendor"),
    ScenarioId::new("npm_packages", "without_deps_v1_lockfile"),
    ScenarioId::new("npm_packages", "without_deps_v3_lockfile"),
    ScenarioId::new("npm_packages", "with_deps_v1_lockfile"),
    ScenarioId::new("npm_packages", "with_deps_v3_lockfile"),
    ScenarioId::new("npm_packages", "git_submodule"),
    ScenarioId::new("npm_packages", "workspaces"),
    ScenarioId::new("npm_packages", "multiple-dep-versions"),
    ScenarioId::new("yarn_packages", "without_deps"),
    ScenarioId::new("yarn_packages", "with_deps"),
    ScenarioId::new("yarn_packages", "git_submodule"),
    ScenarioId::new("yarn_packages", "workspaces"),
    ScenarioId::new("rubygems_packages", "without_deps"),
    ScenarioId::new("rubygems_packages", "with_deps"),
    ScenarioId::new("rubygems_packages", "multiple"),
    ScenarioId::new("git_submodule_packages", "git_submodule_no_master_branch"),
];

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Builds the request payload for a scenario.
#[must_use]
pub fn build_payload(id: ScenarioId, data: &ScenarioData) -> RequestPayload {
    let pkg_managers = if id.env_name == IMPLICIT_GOMOD {
        None
    } else {
        Some(data.pkg_managers.clone().unwrap_or_default())
    };
    RequestPayload {
        repo: data.repo.clone(),
        git_ref: data.git_ref.clone(),
        pkg_managers,
        flags: data.flags.clone(),
        packages: data.packages.clone(),
    }
}

#[cfg(test)]
#[path = "fixtures_tests.rs"]
mod fixtures_tests;
