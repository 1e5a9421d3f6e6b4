// system-tests/src/content_manifest.rs
// ============================================================================
// Module: Content Manifest
// Description: Expected image contents and JSON schema validation.
// Purpose: Shape fixture purls into the service's content manifest layout.
// Dependencies: jsonschema, serde, serde_json
// ============================================================================

//! ## Overview
//! Fixtures list content manifest expectations as flat purl lists. The
//! service reports them as `image_contents` entries with nested `{purl}`
//! objects. [`parse_image_contents`] converts the former into the latter, and
//! [`validate_against_schema`] checks a manifest against the schema document
//! it names in `$schema`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Content manifest expectation as written in fixture YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentManifestEntry {
    /// Package purl.
    pub purl: String,
    /// Purls of the package's dependencies.
    #[serde(default)]
    pub dep_purls: Vec<String>,
    /// Purls of the package's sources.
    #[serde(default)]
    pub source_purls: Vec<String>,
}

/// Single purl reference inside an image content entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurlRef {
    /// Package URL.
    pub purl: String,
}

/// One `image_contents` element of a content manifest.
///
/// Unknown fields are rejected so extra service output cannot slip past a
/// comparison.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageContent {
    /// Package purl.
    pub purl: String,
    /// Dependency purls.
    pub dependencies: Vec<PurlRef>,
    /// Source purls.
    pub sources: Vec<PurlRef>,
}

impl ImageContent {
    /// Returns a copy with nested lists sorted for order-insensitive comparison.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut dependencies = self.dependencies.clone();
        dependencies.sort();
        let mut sources = self.sources.clone();
        sources.sort();
        Self {
            purl: self.purl.clone(),
            dependencies,
            sources,
        }
    }
}

// ============================================================================
// SECTION: Conversion
// ============================================================================

/// Converts fixture expectations into `image_contents` entries.
///
/// Absent expectations yield an empty list.
#[must_use]
pub fn parse_image_contents(entries: Option<&[ContentManifestEntry]>) -> Vec<ImageContent> {
    entries
        .unwrap_or_default()
        .iter()
        .map(|entry| ImageContent {
            purl: entry.purl.clone(),
            dependencies: purl_refs(&entry.dep_purls),
            sources: purl_refs(&entry.source_purls),
        })
        .collect()
}

/// Wraps each purl in a [`PurlRef`].
fn purl_refs(purls: &[String]) -> Vec<PurlRef> {
    purls
        .iter()
        .map(|purl| PurlRef {
            purl: purl.clone(),
        })
        .collect()
}

// ============================================================================
// SECTION: Schema Validation
// ============================================================================

/// Validates a document against a JSON schema.
///
/// # Errors
///
/// Returns every violation, one message per entry, or a single message when
/// the schema itself does not compile.
pub fn validate_against_schema(document: &Value, schema: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::options()
        .build(schema)
        .map_err(|err| vec![format!("invalid schema: {err}")])?;
    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|err| err.to_string())
        .collect();
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
