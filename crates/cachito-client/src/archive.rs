// crates/cachito-client/src/archive.rs
// ============================================================================
// Module: Bundle Archives
// Description: Extraction of gzip-compressed tar bundles.
// Purpose: Unpack request bundles and reference tarballs without escaping the destination.
// Dependencies: flate2, tar
// ============================================================================

//! ## Overview
//! Request bundles are `tar.gz` archives holding `app/` and `deps/` trees.
//! Symlinks are legitimate bundle content (including dangling links and
//! loops), so they are unpacked as links rather than followed.
//! Invariants:
//! - Entries with absolute paths or `..` components are rejected.
//! - Device nodes, FIFOs, and other special entries are rejected.
//! - Total unpacked bytes never exceed [`ArchiveLimits::max_total_bytes`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Component;
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;
use tar::EntryType;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default cap on unpacked bundle bytes (4 GiB).
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Extraction limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    /// Maximum sum of entry sizes.
    pub max_total_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Bundle extraction failures.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Archive could not be read or written to disk.
    #[error("archive io failure: {0}")]
    Io(String),
    /// Archive content violates extraction rules.
    #[error("invalid archive entry: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Extracts a `tar.gz` archive into `dest_dir`, creating it when missing.
///
/// # Errors
///
/// Returns [`ArchiveError`] when the archive is unreadable, holds an entry that
/// would land outside `dest_dir`, holds a special entry, or exceeds `limits`.
pub fn extract_tar_gz(
    archive_path: &Path,
    dest_dir: &Path,
    limits: ArchiveLimits,
) -> Result<(), ArchiveError> {
    let file = fs::File::open(archive_path).map_err(|err| {
        ArchiveError::Io(format!("open {}: {err}", archive_path.display()))
    })?;
    fs::create_dir_all(dest_dir)
        .map_err(|err| ArchiveError::Io(format!("create {}: {err}", dest_dir.display())))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(false);
    let mut total_bytes = 0u64;
    for entry in archive.entries().map_err(|err| ArchiveError::Io(err.to_string()))? {
        let mut entry = entry.map_err(|err| ArchiveError::Io(err.to_string()))?;
        let entry_type = entry.header().entry_type();
        match entry_type {
            EntryType::Regular
            | EntryType::Continuous
            | EntryType::Directory
            | EntryType::Symlink
            | EntryType::Link => {}
            // git archive writes the commit id into a global pax header.
            EntryType::XGlobalHeader => continue,
            other => {
                return Err(ArchiveError::Invalid(format!(
                    "special entries are not allowed (type byte {})",
                    other.as_byte()
                )));
            }
        }
        let path = entry.path().map_err(|err| ArchiveError::Invalid(err.to_string()))?;
        validate_relative_path(&path)?;
        let label = path.display().to_string();
        total_bytes = total_bytes
            .checked_add(entry.size())
            .ok_or_else(|| ArchiveError::Invalid("archive size overflow".to_string()))?;
        if total_bytes > limits.max_total_bytes {
            return Err(ArchiveError::Invalid(format!(
                "archive exceeds size limit of {} bytes",
                limits.max_total_bytes
            )));
        }
        let unpacked = entry
            .unpack_in(dest_dir)
            .map_err(|err| ArchiveError::Io(format!("unpack {label}: {err}")))?;
        if !unpacked {
            return Err(ArchiveError::Invalid(format!("entry escapes destination: {label}")));
        }
    }
    Ok(())
}

/// Rejects absolute paths and parent-directory traversal.
fn validate_relative_path(path: &Path) -> Result<(), ArchiveError> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::Invalid(format!(
                    "entry path must be relative without '..': {}",
                    path.display()
                )));
            }
        }
    }
    Ok(())
}
