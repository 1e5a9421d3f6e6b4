// system-tests/src/checks.rs
// ============================================================================
// Module: Scenario Checks
// Description: Assertions over request records, bundles, manifests, and SBOMs.
// Purpose: Compare service output with fixture expectations.
// Dependencies: cachito-client, serde_json, serde_jcs, tokio
// ============================================================================

//! ## Overview
//! Every check returns `Result<(), CheckFailure>` so a scenario can stop at
//! the first mismatch and report which check failed with an expected/actual
//! rendering.
//! Invariants:
//! - Packages, dependencies, image contents, and SBOM components compare
//!   order-insensitively.
//! - The bundle holds exactly the expected paths; `.git` directories are
//!   ignored only when comparing against reference archives.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use cachito_client::ApiResponse;
use cachito_client::ArchiveLimits;
use cachito_client::CachitoClient;
use cachito_client::RequestState;
use cachito_client::extract_tar_gz;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::content_manifest::ImageContent;
use crate::content_manifest::validate_against_schema;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Check name for the completed response assertion.
pub const CHECK_COMPLETED: &str = "properly_completed_response";
/// Check name for the response elements assertion.
pub const CHECK_RESPONSE_ELEMENTS: &str = "elements_from_response";
/// Check name for the bundle contents assertion.
pub const CHECK_EXPECTED_FILES: &str = "expected_files";
/// Check name for the content manifest assertion.
pub const CHECK_CONTENT_MANIFEST: &str = "content_manifest";
/// Check name for the SBOM assertion.
pub const CHECK_SBOM: &str = "sbom";

/// State reason reported for successful requests.
const COMPLETED_REASON: &str = "Completed successfully";
/// Response keys compared as unordered collections.
const UNORDERED_RESPONSE_KEYS: [&str; 2] = ["packages", "dependencies"];
/// Directory excluded from reference tree comparisons.
const GIT_DIR: &str = ".git";

// ============================================================================
// SECTION: Failure
// ============================================================================

/// A failed check with a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{check} failed: {message}")]
pub struct CheckFailure {
    /// Name of the failed check.
    pub check: &'static str,
    /// Mismatch description.
    pub message: String,
}

impl CheckFailure {
    /// Creates a failure for the named check.
    pub fn new(check: &'static str, message: impl Into<String>) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }

    /// Creates a failure rendering expected and actual values.
    fn mismatch(check: &'static str, what: &str, expected: &Value, actual: &Value) -> Self {
        Self::new(
            check,
            format!("{what} mismatch\nexpected:\n{}\nactual:\n{}", pretty(expected), pretty(actual)),
        )
    }
}

/// Pretty-prints JSON for failure messages.
fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// ============================================================================
// SECTION: Response Checks
// ============================================================================

/// Checks that a request finished successfully.
///
/// # Errors
///
/// Returns [`CheckFailure`] unless the status is 200, the state is `complete`,
/// and the state reason is `Completed successfully`.
pub fn assert_properly_completed_response(response: &ApiResponse) -> Result<(), CheckFailure> {
    if response.status != 200 {
        return Err(CheckFailure::new(
            CHECK_COMPLETED,
            format!("request {} returned HTTP {}", response.id, response.status),
        ));
    }
    let state = response.state();
    if state != Some(RequestState::Complete) {
        return Err(CheckFailure::new(
            CHECK_COMPLETED,
            format!(
                "request {} ended in state {} ({})",
                response.id,
                state.as_ref().map_or("<missing>", RequestState::as_str),
                response.state_reason().unwrap_or("no reason given")
            ),
        ));
    }
    match response.state_reason() {
        Some(COMPLETED_REASON) => Ok(()),
        other => Err(CheckFailure::new(
            CHECK_COMPLETED,
            format!(
                "request {} has state reason `{}`",
                response.id,
                other.unwrap_or("<missing>")
            ),
        )),
    }
}

/// Checks that every expected key matches the response record.
///
/// # Errors
///
/// Returns [`CheckFailure`] for the first missing or mismatched key.
pub fn assert_elements_from_response(
    actual: &Value,
    expected: &Map<String, Value>,
) -> Result<(), CheckFailure> {
    for (key, expected_value) in expected {
        let Some(actual_value) = actual.get(key) else {
            return Err(CheckFailure::new(
                CHECK_RESPONSE_ELEMENTS,
                format!("response has no `{key}` field"),
            ));
        };
        let (expected_cmp, actual_cmp) = if UNORDERED_RESPONSE_KEYS.contains(&key.as_str()) {
            (sorted_by_identity(expected_value), sorted_by_identity(actual_value))
        } else {
            (expected_value.clone(), actual_value.clone())
        };
        if expected_cmp != actual_cmp {
            return Err(CheckFailure::mismatch(
                CHECK_RESPONSE_ELEMENTS,
                &format!("`{key}`"),
                &expected_cmp,
                &actual_cmp,
            ));
        }
    }
    Ok(())
}

/// Sorts a package list by `(name, version, type)`; non-arrays pass through.
///
/// Entries sharing that identity are ordered by their canonical encoding so
/// the result does not depend on input order.
fn sorted_by_identity(value: &Value) -> Value {
    let Value::Array(items) = value else {
        return value.clone();
    };
    let mut items = items.clone();
    items.sort_by_cached_key(|item| {
        let identity = ["name", "version", "type"]
            .map(|field| item.get(field).and_then(Value::as_str).unwrap_or_default().to_string());
        (identity, serde_jcs::to_string(item).unwrap_or_default())
    });
    Value::Array(items)
}

// ============================================================================
// SECTION: Bundle Checks
// ============================================================================

/// Filesystem entry collected while walking a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TreeEntry {
    /// Regular file at the given absolute path.
    File(PathBuf),
    /// Symlink with its target.
    Symlink(PathBuf),
}

/// Checks the extracted bundle against expected paths and reference URLs.
///
/// Keys naming a bundle file are compared byte for byte with the URL
/// content. Keys naming a bundle directory reference a `tar.gz` archive whose
/// tree must match the bundle directory.
///
/// # Errors
///
/// Returns [`CheckFailure`] for unexpected or missing paths, download
/// failures, and content mismatches.
pub async fn assert_expected_files(
    source_path: &Path,
    expected_files: &BTreeMap<String, String>,
    client: &CachitoClient,
    workdir: &Path,
) -> Result<(), CheckFailure> {
    if !source_path.is_dir() {
        return Err(CheckFailure::new(
            CHECK_EXPECTED_FILES,
            format!("bundle directory {} does not exist", source_path.display()),
        ));
    }
    let bundle = collect_tree(source_path, false).map_err(|err| io_failure(source_path, &err))?;
    let keys: Vec<String> = expected_files.keys().map(|key| normalize_key(key)).collect();
    for path in bundle.keys() {
        if !keys.iter().any(|key| is_covered(path, key)) {
            return Err(CheckFailure::new(
                CHECK_EXPECTED_FILES,
                format!("bundle contains unexpected path `{path}`"),
            ));
        }
    }

    for (index, (raw_key, url)) in expected_files.iter().enumerate() {
        let key = normalize_key(raw_key);
        let target = source_path.join(&key);
        let metadata = fs::symlink_metadata(&target).map_err(|_| {
            CheckFailure::new(CHECK_EXPECTED_FILES, format!("expected path `{key}` is missing"))
        })?;
        let reference = client.fetch_url(url).await.map_err(|err| {
            CheckFailure::new(CHECK_EXPECTED_FILES, format!("fetch {url} for `{key}`: {err}"))
        })?;
        if metadata.is_dir() {
            let reference_root = unpack_reference(&reference, workdir, index).await?;
            compare_trees(&reference_root, &target, &key)?;
        } else {
            let actual = fs::read(&target).map_err(|err| io_failure(&target, &err))?;
            if actual != reference {
                return Err(CheckFailure::new(
                    CHECK_EXPECTED_FILES,
                    format!("`{key}` differs from {url}"),
                ));
            }
        }
        debug!(path = %key, "expected path verified");
    }
    Ok(())
}

/// Strips leading `./` and trailing `/` from an expected-files key.
fn normalize_key(key: &str) -> String {
    key.trim_start_matches("./").trim_end_matches('/').to_string()
}

/// Returns true when `path` equals `key` or lies beneath it.
fn is_covered(path: &str, key: &str) -> bool {
    path == key
        || path.strip_prefix(key).is_some_and(|rest| rest.starts_with('/'))
        || key.is_empty()
}

/// Writes and extracts a reference archive, returning the tree root.
async fn unpack_reference(
    bytes: &[u8],
    workdir: &Path,
    index: usize,
) -> Result<PathBuf, CheckFailure> {
    let archive = workdir.join(format!("reference_{index}.tar.gz"));
    let dest = workdir.join(format!("reference_{index}"));
    tokio::fs::write(&archive, bytes).await.map_err(|err| io_failure(&archive, &err))?;
    let (archive_path, dest_path) = (archive.clone(), dest.clone());
    tokio::task::spawn_blocking(move || {
        extract_tar_gz(&archive_path, &dest_path, ArchiveLimits::default())
    })
    .await
    .map_err(|err| CheckFailure::new(CHECK_EXPECTED_FILES, format!("extraction task: {err}")))?
    .map_err(|err| {
        CheckFailure::new(CHECK_EXPECTED_FILES, format!("reference archive {}: {err}", archive.display()))
    })?;
    strip_wrapper_dir(&dest).map_err(|err| io_failure(&dest, &err))
}

/// Descends into a lone top-level directory, as produced by forge archives.
pub(crate) fn strip_wrapper_dir(root: &Path) -> io::Result<PathBuf> {
    let entries = fs::read_dir(root)?.collect::<Result<Vec<_>, _>>()?;
    if let [only] = entries.as_slice()
        && only.file_type()?.is_dir()
    {
        return Ok(only.path());
    }
    Ok(root.to_path_buf())
}

/// Compares two trees by file set and content, ignoring `.git` directories.
pub(crate) fn compare_trees(expected: &Path, actual: &Path, key: &str) -> Result<(), CheckFailure> {
    let expected_tree = collect_tree(expected, true).map_err(|err| io_failure(expected, &err))?;
    let actual_tree = collect_tree(actual, true).map_err(|err| io_failure(actual, &err))?;

    let missing: Vec<&str> = expected_tree
        .keys()
        .filter(|path| !actual_tree.contains_key(*path))
        .map(String::as_str)
        .collect();
    let extra: Vec<&str> = actual_tree
        .keys()
        .filter(|path| !expected_tree.contains_key(*path))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() || !extra.is_empty() {
        return Err(CheckFailure::new(
            CHECK_EXPECTED_FILES,
            format!(
                "`{key}` file set differs; missing: [{}]; unexpected: [{}]",
                missing.join(", "),
                extra.join(", ")
            ),
        ));
    }
    for (path, expected_entry) in &expected_tree {
        let Some(actual_entry) = actual_tree.get(path) else {
            continue;
        };
        let same = match (expected_entry, actual_entry) {
            (TreeEntry::File(left), TreeEntry::File(right)) => {
                fs::read(left).map_err(|err| io_failure(left, &err))?
                    == fs::read(right).map_err(|err| io_failure(right, &err))?
            }
            (TreeEntry::Symlink(left), TreeEntry::Symlink(right)) => left == right,
            _ => false,
        };
        if !same {
            return Err(CheckFailure::new(
                CHECK_EXPECTED_FILES,
                format!("`{key}/{path}` differs from the reference archive"),
            ));
        }
    }
    Ok(())
}

/// Collects regular files and symlinks below `root` keyed by relative path.
///
/// Symlinks are never followed, so link loops are safe to walk.
fn collect_tree(root: &Path, skip_git: bool) -> io::Result<BTreeMap<String, TreeEntry>> {
    let mut entries = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                if !(skip_git && entry.file_name() == GIT_DIR) {
                    pending.push(path);
                }
                continue;
            }
            let relative = path
                .strip_prefix(root)
                .map_err(|err| io::Error::other(err.to_string()))?
                .components()
                .map(|part| part.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<String>>()
                .join("/");
            let tree_entry = if file_type.is_symlink() {
                TreeEntry::Symlink(fs::read_link(&path)?)
            } else {
                TreeEntry::File(path)
            };
            entries.insert(relative, tree_entry);
        }
    }
    Ok(entries)
}

/// Wraps an I/O error for the bundle check.
fn io_failure(path: &Path, err: &io::Error) -> CheckFailure {
    CheckFailure::new(CHECK_EXPECTED_FILES, format!("{}: {err}", path.display()))
}

// ============================================================================
// SECTION: Manifest and SBOM Checks
// ============================================================================

/// Checks the request's content manifest against expected image contents.
///
/// The manifest must also validate against the schema named by its
/// `$schema` field.
///
/// # Errors
///
/// Returns [`CheckFailure`] on fetch failures, content mismatches, or schema
/// violations.
pub async fn assert_content_manifest(
    client: &CachitoClient,
    request_id: u64,
    expected: &[ImageContent],
) -> Result<(), CheckFailure> {
    let response = client
        .fetch_content_manifest(request_id)
        .await
        .map_err(|err| CheckFailure::new(CHECK_CONTENT_MANIFEST, err.to_string()))?;
    if response.status != 200 {
        return Err(CheckFailure::new(
            CHECK_CONTENT_MANIFEST,
            format!("content manifest returned HTTP {}", response.status),
        ));
    }
    let raw_contents = response.data.get("image_contents").cloned().unwrap_or(Value::Null);
    let actual: Vec<ImageContent> = serde_json::from_value(raw_contents.clone()).map_err(|err| {
        CheckFailure::new(CHECK_CONTENT_MANIFEST, format!("malformed image_contents: {err}"))
    })?;
    let actual = normalize_contents(&actual);
    let expected = normalize_contents(expected);
    if actual != expected {
        return Err(CheckFailure::mismatch(
            CHECK_CONTENT_MANIFEST,
            "image_contents",
            &serde_json::to_value(&expected).unwrap_or(Value::Null),
            &serde_json::to_value(&actual).unwrap_or(raw_contents),
        ));
    }

    let Some(schema_url) = response.data.get("$schema").and_then(Value::as_str) else {
        return Err(CheckFailure::new(CHECK_CONTENT_MANIFEST, "manifest has no $schema URL"));
    };
    let schema_bytes = client
        .fetch_url(schema_url)
        .await
        .map_err(|err| CheckFailure::new(CHECK_CONTENT_MANIFEST, err.to_string()))?;
    let schema: Value = serde_json::from_slice(&schema_bytes).map_err(|err| {
        CheckFailure::new(CHECK_CONTENT_MANIFEST, format!("schema {schema_url} is not JSON: {err}"))
    })?;
    validate_against_schema(&response.data, &schema).map_err(|errors| {
        CheckFailure::new(
            CHECK_CONTENT_MANIFEST,
            format!("manifest violates {schema_url}: {}", errors.join("; ")),
        )
    })
}

/// Sorts image contents and their nested lists.
fn normalize_contents(contents: &[ImageContent]) -> Vec<ImageContent> {
    let mut normalized: Vec<ImageContent> = contents.iter().map(ImageContent::normalized).collect();
    normalized.sort();
    normalized
}

/// Checks the request's SBOM components.
///
/// Absent expectations mean the SBOM must list no components.
///
/// # Errors
///
/// Returns [`CheckFailure`] on fetch failures, a non-CycloneDX document, or a
/// component mismatch.
pub async fn assert_sbom(
    client: &CachitoClient,
    request_id: u64,
    expected: Option<&[Value]>,
) -> Result<(), CheckFailure> {
    let response = client
        .fetch_sbom(&[request_id])
        .await
        .map_err(|err| CheckFailure::new(CHECK_SBOM, err.to_string()))?;
    if response.status != 200 {
        return Err(CheckFailure::new(
            CHECK_SBOM,
            format!("sbom returned HTTP {}", response.status),
        ));
    }
    let format = response.data.get("bomFormat").and_then(Value::as_str);
    if format != Some("CycloneDX") {
        return Err(CheckFailure::new(
            CHECK_SBOM,
            format!("unexpected bomFormat `{}`", format.unwrap_or("<missing>")),
        ));
    }
    let actual = response
        .data
        .get("components")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let actual = Value::Array(sorted_canonically(actual));
    let expected = Value::Array(sorted_canonically(expected.unwrap_or_default().to_vec()));
    if actual != expected {
        return Err(CheckFailure::mismatch(CHECK_SBOM, "components", &expected, &actual));
    }
    Ok(())
}

/// Sorts JSON values by their canonical (JCS) encoding.
fn sorted_canonically(mut values: Vec<Value>) -> Vec<Value> {
    values.sort_by_cached_key(|value| serde_jcs::to_string(value).unwrap_or_default());
    values
}

#[cfg(test)]
#[path = "checks_tests.rs"]
mod checks_tests;
