//! Artifact cache check.
//!
//! A task is skipped only when its manifest entry exists and the artifact on
//! disk still hashes to the recorded digest. Modification times are never
//! consulted, so an artifact that was edited, truncated or replaced is always
//! rebuilt. Every I/O failure here counts as a miss; a cache check never
//! aborts a run.

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::manifest::BuildManifest;
use crate::util::hash::hash_file;

/// Why an artifact was or was not considered fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
  /// Recorded digest matches the artifact on disk.
  Fresh,
  /// Rebuild requested regardless of state.
  Forced,
  /// No manifest entry for the cache key.
  NotRecorded,
  /// The artifact could not be opened or read.
  Unreadable { reason: String },
  /// The artifact's digest differs from the recorded one.
  Mismatch { recorded: String, actual: String },
}

impl CacheStatus {
  pub fn is_fresh(&self) -> bool {
    matches!(self, CacheStatus::Fresh)
  }
}

impl fmt::Display for CacheStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CacheStatus::Fresh => write!(f, "up to date"),
      CacheStatus::Forced => write!(f, "rebuild forced"),
      CacheStatus::NotRecorded => write!(f, "never built"),
      CacheStatus::Unreadable { reason } => write!(f, "artifact unreadable ({})", reason),
      CacheStatus::Mismatch { .. } => write!(f, "artifact changed since last build"),
    }
  }
}

/// Classify the artifact at `artifact_path` against the manifest.
pub fn check(cache_key: &str, artifact_path: &Path, manifest: &BuildManifest, force: bool) -> CacheStatus {
  if force {
    return CacheStatus::Forced;
  }

  let Some(entry) = manifest.get(cache_key) else {
    return CacheStatus::NotRecorded;
  };

  let actual = match hash_file(artifact_path) {
    Ok(hash) => hash,
    Err(e) => {
      debug!(task = %cache_key, error = %e, "artifact unreadable, treating as stale");
      return CacheStatus::Unreadable { reason: e.to_string() };
    }
  };

  if actual == entry.sha256 {
    CacheStatus::Fresh
  } else {
    debug!(task = %cache_key, recorded = %entry.sha256, actual = %actual, "artifact digest changed");
    CacheStatus::Mismatch {
      recorded: entry.sha256.0.clone(),
      actual: actual.0,
    }
  }
}

/// Whether the task keyed by `cache_key` can be skipped.
pub fn is_fresh(cache_key: &str, artifact_path: &Path, manifest: &BuildManifest, force: bool) -> bool {
  check(cache_key, artifact_path, manifest, force).is_fresh()
}
