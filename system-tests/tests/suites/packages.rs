// system-tests/tests/suites/packages.rs
// ============================================================================
// Module: Package Scenario Tests
// Description: One live test per package scenario.
// Purpose: Verify request results, bundles, manifests, and SBOMs per scenario.
// Dependencies: system-tests, cachito-client, tempfile
// ============================================================================

//! ## Overview
//! Each test loads its scenario from the configured fixture directory,
//! submits it to the configured service, and runs the full check pipeline.
//! Run with `cargo test -p system-tests --features system-tests --test packages`.

use std::error::Error;

use cachito_client::CachitoClient;
use system_tests::artifacts::TestReporter;
use system_tests::config::SystemTestConfig;
use system_tests::fixtures::PACKAGE_SCENARIOS;
use system_tests::fixtures::ScenarioId;
use system_tests::logging::init_tracing;
use system_tests::scenario::run_scenario_with_client;

/// Runs one scenario and records its artifacts.
async fn run_live_scenario(id: ScenarioId) -> Result<(), Box<dyn Error>> {
    init_tracing();
    let config = SystemTestConfig::load()?;
    let mut reporter = TestReporter::new(&id.slug(), &config)?;
    let client = CachitoClient::new(config.client_config()?)?;
    let workdir = tempfile::tempdir()?;

    let result = run_scenario_with_client(&client, &config.fixtures_dir, id, workdir.path()).await;
    reporter.artifacts().write_json("http_transcript.json", &client.transcript())?;
    let artifacts = vec![
        "summary.json".to_string(),
        "summary.md".to_string(),
        "http_transcript.json".to_string(),
    ];
    match result {
        Ok(outcome) => {
            reporter.record_outcome(&outcome);
            reporter.finish("pass", vec![format!("{id} completed")], artifacts)?;
            Ok(())
        }
        Err(err) => {
            reporter.record_failure(&err);
            reporter.finish("fail", vec![err.to_string()], artifacts)?;
            Err(err.into())
        }
    }
}

macro_rules! package_scenarios {
    ($($test:ident => ($package:literal, $name:literal)),+ $(,)?) => {
        /// Scenarios with a generated test, in declaration order.
        const GENERATED: &[ScenarioId] = &[$(ScenarioId::new($package, $name)),+];

        $(
            #[tokio::test(flavor = "multi_thread")]
            async fn $test() -> Result<(), Box<dyn Error>> {
                run_live_scenario(ScenarioId::new($package, $name)).await
            }
        )+
    };
}

package_scenarios! {
    pip_without_deps => ("pip_packages", "without_deps"),
    pip_with_deps => ("pip_packages", "with_deps"),
    pip_multiple => ("pip_packages", "multiple"),
    pip_git_submodule => ("pip_packages", "git_submodule"),
    go_generate => ("go_generate_packages", "go_generate"),
    go_generate_generated => ("go_generate_packages", "go_generate_generated"),
    go_generate_imported => ("go_generate_packages", "go_generate_imported"),
    go_generate_imported_generated => ("go_generate_packages", "go_generate_imported_generated"),
    gomod_without_deps => ("gomod_packages", "without_deps"),
    gomod_without_deps_vendor_check => ("gomod_packages", "without_deps_vendor_check"),
    gomod_with_deps => ("gomod_packages", "with_deps"),
    gomod_vendored_with_flag => ("gomod_packages", "vendored_with_flag"),
    gomod_implicit_gomod => ("gomod_packages", "implicit_gomod"),
    gomod_missing_gomod => ("gomod_packages", "missing_gomod"),
    gomod_force_tidy_without_deps => ("gomod_packages", "force_tidy_without_deps"),
    gomod_force_tidy_vendored => ("gomod_packages", "force_tidy_vendored"),
    gomod_symlink_loop => ("gomod_packages", "symlink_loop"),
    gomod_without_pkg_manager => ("gomod_packages", "without_pkg_manager"),
    gomod_with_local_replacements_in_parent_dir =>
        ("gomod_packages", "with_local_replacements_in_parent_dir"),
    gomod_vendor_check_correct_vendor => ("gomod_vendor_check", "correct_vendor"),
    gomod_vendor_check_no_vendor => ("gomod_vendor_check", "no_vendor"),
    npm_without_deps_v1_lockfile => ("npm_packages", "without_deps_v1_lockfile"),
    npm_without_deps_v3_lockfile => ("npm_packages", "without_deps_v3_lockfile"),
    npm_with_deps_v1_lockfile => ("npm_packages", "with_deps_v1_lockfile"),
    npm_with_deps_v3_lockfile => ("npm_packages", "with_deps_v3_lockfile"),
    npm_git_submodule => ("npm_packages", "git_submodule"),
    npm_workspaces => ("npm_packages", "workspaces"),
    npm_multiple_dep_versions => ("npm_packages", "multiple-dep-versions"),
    yarn_without_deps => ("yarn_packages", "without_deps"),
    yarn_with_deps => ("yarn_packages", "with_deps"),
    yarn_git_submodule => ("yarn_packages", "git_submodule"),
    yarn_workspaces => ("yarn_packages", "workspaces"),
    rubygems_without_deps => ("rubygems_packages", "without_deps"),
    rubygems_with_deps => ("rubygems_packages", "with_deps"),
    rubygems_multiple => ("rubygems_packages", "multiple"),
    git_submodule_no_master_branch => ("git_submodule_packages", "git_submodule_no_master_branch"),
}

#[test]
fn generated_tests_cover_package_matrix() {
    assert_eq!(GENERATED, PACKAGE_SCENARIOS.as_slice());
}
