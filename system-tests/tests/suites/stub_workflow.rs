// system-tests/tests/suites/stub_workflow.rs
// ============================================================================
// Module: Stub Workflow Tests
// Description: Run package scenarios end to end against the service stub.
// Purpose: Prove each check passes on matching output and fails on drift.
// Dependencies: system-tests, cachito-client, helpers
// ============================================================================

//! ## Overview
//! Each test renders the stub fixtures, runs one scenario through the same
//! pipeline the live suite uses, and inspects the outcome or the failing
//! check.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::time::Duration;

use cachito_client::CachitoClient;
use cachito_client::ClientConfig;
use helpers::fixtures::render_fixture_dir;
use helpers::service_stub::DEP_LIST_PATH;
use helpers::service_stub::ServiceStubHandle;
use helpers::service_stub::spawn_service_stub;
use system_tests::artifacts::TestReporter;
use system_tests::checks::CHECK_COMPLETED;
use system_tests::checks::CHECK_CONTENT_MANIFEST;
use system_tests::checks::CHECK_EXPECTED_FILES;
use system_tests::checks::CHECK_RESPONSE_ELEMENTS;
use system_tests::checks::CHECK_SBOM;
use system_tests::config::SystemTestConfig;
use system_tests::fixtures::ScenarioId;
use system_tests::logging::init_tracing;
use system_tests::scenario::ScenarioError;
use system_tests::scenario::ScenarioOutcome;
use system_tests::scenario::run_package_scenario;
use system_tests::scenario::run_scenario_with_client;
use tempfile::TempDir;

use crate::helpers;

/// Fixture file stem of the stub scenarios.
const STUB_PACKAGES: &str = "stub_packages";

/// Client config tuned for the stub's fast state transitions.
fn stub_client_config(api_url: &str) -> ClientConfig {
    let mut config = ClientConfig::new(api_url);
    config.poll_interval = Duration::from_millis(20);
    config.completion_timeout = Duration::from_secs(10);
    config.request_timeout = Duration::from_secs(10);
    config
}

/// Stub, rendered fixtures, and scratch directory for one test.
struct StubRun {
    client: CachitoClient,
    fixtures: TempDir,
    workdir: TempDir,
    stub: ServiceStubHandle,
}

impl StubRun {
    fn start() -> Self {
        init_tracing();
        let stub = spawn_service_stub().expect("service stub");
        let fixtures = render_fixture_dir(stub.base_url()).expect("rendered fixtures");
        let client = CachitoClient::new(stub_client_config(&stub.api_url())).expect("client");
        Self {
            client,
            fixtures,
            workdir: tempfile::tempdir().expect("workdir"),
            stub,
        }
    }

    async fn run(&self, env_name: &'static str) -> Result<ScenarioOutcome, ScenarioError> {
        run_scenario_with_client(
            &self.client,
            self.fixtures.path(),
            ScenarioId::new(STUB_PACKAGES, env_name),
            self.workdir.path(),
        )
        .await
    }
}

/// Extracts the failed check name from a scenario error.
fn failed_check(err: &ScenarioError) -> &'static str {
    match err {
        ScenarioError::Check(failure) => failure.check,
        other => panic!("expected a check failure, got: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn gomod_scenario_passes_every_check() {
    let run = StubRun::start();
    let outcome = run.run("gomod_app").await.expect("scenario passes");

    assert_eq!(outcome.scenario, "stub_packages/gomod_app");
    assert_eq!(
        outcome.checks_passed,
        vec![
            CHECK_COMPLETED,
            CHECK_RESPONSE_ELEMENTS,
            CHECK_EXPECTED_FILES,
            CHECK_CONTENT_MANIFEST,
            CHECK_SBOM
        ]
    );
    let bundle = run.workdir.path().join(format!("download_{}", outcome.request_id));
    assert!(bundle.join("app/go.mod").is_file());
    assert!(bundle.join(DEP_LIST_PATH).is_file());
    assert!(run.workdir.path().join(format!("download_{}.tar.gz", outcome.request_id)).is_file());

    let submitted = run.stub.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0]["pkg_managers"], serde_json::json!(["gomod"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn implicit_gomod_lets_the_service_detect_package_managers() {
    let run = StubRun::start();
    let outcome = run.run("implicit_gomod").await.expect("scenario passes");

    assert_eq!(outcome.checks_passed.len(), 5);
    let submitted = run.stub.submitted();
    assert!(submitted[0].get("pkg_managers").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn undeclared_bundle_paths_fail_expected_files() {
    let run = StubRun::start();
    let err = run.run("undeclared_deps").await.unwrap_err();

    assert_eq!(failed_check(&err), CHECK_EXPECTED_FILES);
    assert!(err.to_string().contains(DEP_LIST_PATH), "unexpected error: {err}");
    assert_eq!(run.stub.submitted()[0]["flags"], serde_json::json!(["gomod-vendor-check"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_sbom_components_fail_sbom_check() {
    let run = StubRun::start();
    let err = run.run("partial_sbom").await.unwrap_err();

    assert_eq!(failed_check(&err), CHECK_SBOM);
    assert!(err.to_string().contains("components mismatch"));
}

#[tokio::test(flavor = "multi_thread")]
async fn differing_reference_file_fails_expected_files() {
    let run = StubRun::start();
    let err = run.run("stale_dep_list").await.unwrap_err();

    assert_eq!(failed_check(&err), CHECK_EXPECTED_FILES);
    assert!(err.to_string().contains("/files/stale-list"), "unexpected error: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn absent_expected_path_fails_expected_files() {
    let run = StubRun::start();
    let err = run.run("missing_vendor_dir").await.unwrap_err();

    assert_eq!(failed_check(&err), CHECK_EXPECTED_FILES);
    assert!(err.to_string().contains("`vendor/modules.txt` is missing"), "unexpected error: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn image_contents_drift_fails_content_manifest() {
    let run = StubRun::start();
    let err = run.run("manifest_drift").await.unwrap_err();

    assert_eq!(failed_check(&err), CHECK_CONTENT_MANIFEST);
    assert!(err.to_string().contains("image_contents mismatch"), "unexpected error: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn manifest_without_schema_url_fails_content_manifest() {
    let run = StubRun::start();
    let err = run.run("manifest_without_schema").await.unwrap_err();

    assert_eq!(failed_check(&err), CHECK_CONTENT_MANIFEST);
    assert!(err.to_string().contains("no $schema URL"), "unexpected error: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn schema_violation_fails_content_manifest() {
    let run = StubRun::start();
    let err = run.run("manifest_schema_violation").await.unwrap_err();

    assert_eq!(failed_check(&err), CHECK_CONTENT_MANIFEST);
    assert!(
        err.to_string().contains("strict_content_manifest.json"),
        "unexpected error: {err}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn non_cyclonedx_document_fails_sbom_check() {
    let run = StubRun::start();
    let err = run.run("spdx_sbom").await.unwrap_err();

    assert_eq!(failed_check(&err), CHECK_SBOM);
    assert!(err.to_string().contains("unexpected bomFormat `SPDX`"), "unexpected error: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_request_stops_at_completion_check() {
    let run = StubRun::start();
    let err = run.run("failing_repo").await.unwrap_err();

    assert_eq!(failed_check(&err), CHECK_COMPLETED);
    assert!(err.to_string().contains("Failed to download the gomod dependencies"));
    let downloads = std::fs::read_dir(run.workdir.path()).unwrap().count();
    assert_eq!(downloads, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_scenario_is_a_fixture_error() {
    let run = StubRun::start();
    let err = run.run("not_in_fixtures").await.unwrap_err();

    assert!(matches!(err, ScenarioError::Fixture(_)));
    assert!(run.stub.submitted().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_run_writes_summary_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let stub = spawn_service_stub()?;
    let fixtures = render_fixture_dir(stub.base_url())?;
    let run_root = tempfile::tempdir()?;
    let workdir = tempfile::tempdir()?;
    let config = SystemTestConfig {
        api_url: Some(stub.api_url()),
        timeout: Some(Duration::from_secs(10)),
        poll_interval: Some(Duration::from_millis(20)),
        fixtures_dir: fixtures.path().to_path_buf(),
        run_root: Some(run_root.path().to_path_buf()),
        ..SystemTestConfig::default()
    };
    let id = ScenarioId::new(STUB_PACKAGES, "gomod_app");
    let mut reporter = TestReporter::new(&id.slug(), &config)?;

    let outcome = run_package_scenario(&config, id, workdir.path()).await?;
    reporter.record_outcome(&outcome);
    reporter.finish(
        "pass",
        Vec::new(),
        vec!["summary.json".to_string(), "summary.md".to_string()],
    )?;

    let root = run_root.path().join("stub_packages__gomod_app");
    let summary = std::fs::read_to_string(root.join("summary.json"))?;
    assert!(summary.contains("\"status\":\"pass\""));
    assert!(summary.contains(&format!("\"request_id\":{}", outcome.request_id)));
    assert!(summary.contains("\"scenario\":\"stub_packages/gomod_app\""));
    assert!(summary.contains("\"sbom\"]"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn transcript_records_every_exchange() {
    let run = StubRun::start();
    run.run("gomod_app").await.expect("scenario passes");

    let transcript = run.client.transcript();
    let methods: Vec<&str> = transcript.iter().map(|entry| entry.method.as_str()).collect();
    assert_eq!(methods.first(), Some(&"POST"));
    assert!(transcript.iter().all(|entry| entry.status.is_some_and(|status| status < 300)));
    let urls: Vec<&str> = transcript.iter().map(|entry| entry.url.as_str()).collect();
    for fragment in ["/download", "/content-manifest", "/sbom?requests=", "/files/app.tar.gz"] {
        assert!(urls.iter().any(|url| url.contains(fragment)), "no call to {fragment}");
    }
    assert!(urls.iter().any(|url| url.ends_with("/schemas/content_manifest.json")));
}
