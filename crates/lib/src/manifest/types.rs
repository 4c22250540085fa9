use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::util::hash::ContentHash;

/// Metadata recorded for one built artifact.
///
/// Entries are replaced wholesale when a task is rebuilt, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
  /// SHA-256 of the artifact bytes (64 lowercase hex chars).
  pub sha256: ContentHash,
  /// Playbook path the task came from, as given on the command line.
  pub source: String,
  /// Module the artifact runs.
  pub module: String,
  /// ISO-8601 build timestamp.
  pub built_at: String,
}

impl ManifestEntry {
  /// Create an entry stamped with the current UTC time.
  pub fn new(sha256: ContentHash, source: &str, module: &str) -> Self {
    Self {
      sha256,
      source: source.to_string(),
      module: module.to_string(),
      built_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
  }
}

/// Mapping from cache key to manifest entry.
///
/// Backed by a `BTreeMap` so the serialized document has a stable key order
/// and an unchanged manifest round-trips byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildManifest {
  entries: BTreeMap<String, ManifestEntry>,
}

impl BuildManifest {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, cache_key: &str) -> Option<&ManifestEntry> {
    self.entries.get(cache_key)
  }

  /// Insert or overwrite the entry for `cache_key`, returning the previous one.
  pub fn insert(&mut self, cache_key: String, entry: ManifestEntry) -> Option<ManifestEntry> {
    self.entries.insert(cache_key, entry)
  }

  /// Remove an entry. Only explicit pruning calls this.
  pub fn remove(&mut self, cache_key: &str) -> Option<ManifestEntry> {
    self.entries.remove(cache_key)
  }

  pub fn contains_key(&self, cache_key: &str) -> bool {
    self.entries.contains_key(cache_key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &ManifestEntry)> {
    self.entries.iter()
  }

  pub fn keys(&self) -> impl Iterator<Item = &String> {
    self.entries.keys()
  }
}

impl FromIterator<(String, ManifestEntry)> for BuildManifest {
  fn from_iter<I: IntoIterator<Item = (String, ManifestEntry)>>(iter: I) -> Self {
    Self {
      entries: iter.into_iter().collect(),
    }
  }
}
