//! Read-only status and explicit pruning of an output directory.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{BuildConfig, PipelineError, artifact_path, plan};
use crate::identity::{identify, is_well_formed_key};
use crate::manifest::{BuildManifest, ManifestStore};
use crate::out_lock::{LockMode, OutDirLock};
use crate::playbook::Playbook;
use crate::unit::unit_dir;

/// Freshness of one playbook task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRow {
  pub position: usize,
  pub name: String,
  pub module: String,
  pub cache_key: String,
  pub fresh: bool,
  /// Human-readable cache decision.
  pub detail: String,
  pub built_at: Option<String>,
}

/// Report the cache state of every task without building anything.
pub fn status(config: &BuildConfig, playbook: &Playbook) -> Result<Vec<StatusRow>, PipelineError> {
  // A missing output directory simply means nothing was built yet.
  let (_lock, manifest) = if config.out_dir.is_dir() {
    let lock = OutDirLock::acquire(&config.out_dir, LockMode::Shared, &config.lock_holder("status"))?;
    (Some(lock), ManifestStore::in_dir(&config.out_dir).load())
  } else {
    (None, BuildManifest::new())
  };

  let rows = plan(playbook, &config.out_dir, &config.target, &manifest, false)
    .into_iter()
    .map(|task| StatusRow {
      position: task.position,
      built_at: manifest.get(&task.identity.cache_key).map(|e| e.built_at.clone()),
      fresh: task.status.is_fresh(),
      detail: task.status.to_string(),
      name: task.task.name,
      module: task.task.module,
      cache_key: task.identity.cache_key,
    })
    .collect();

  Ok(rows)
}

/// Result of a prune.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
  /// Cache keys removed (or that would be, on a dry run).
  pub removed: Vec<String>,
  /// Entries left in the manifest.
  pub kept: usize,
  pub dry_run: bool,
}

/// Drop manifest entries and artifacts of the configured target that the
/// playbook no longer produces.
///
/// Entries recorded for other targets are left alone. Nothing is pruned
/// unless this is called; a build never removes entries.
pub fn prune(config: &BuildConfig, playbook: &Playbook, dry_run: bool) -> Result<PruneReport, PipelineError> {
  let out_dir = &config.out_dir;
  if !out_dir.is_dir() {
    return Ok(PruneReport {
      dry_run,
      ..Default::default()
    });
  }

  let _lock = OutDirLock::acquire(out_dir, LockMode::Exclusive, &config.lock_holder("prune"))?;
  let store = ManifestStore::in_dir(out_dir);
  let mut manifest = store.load();

  let live: BTreeSet<String> = playbook
    .tasks
    .iter()
    .enumerate()
    .map(|(position, task)| identify(position, &task.module, &task.name, &config.target).cache_key)
    .collect();
  let suffix = format!("-{}-{}", config.target.os, config.target.arch);

  let mut removed = Vec::new();
  for key in manifest.keys() {
    if !key.ends_with(&suffix) || live.contains(key) {
      continue;
    }
    // Keys come from a file on disk; anything that could name a path outside
    // the output directory is left for the user to inspect.
    if !is_well_formed_key(key) {
      warn!(task = ?key, "ignoring malformed manifest key");
      continue;
    }
    removed.push(key.clone());
  }

  if !dry_run {
    for key in &removed {
      remove_if_present(&artifact_path(out_dir, key))?;
      if let Some(task_id) = key.strip_suffix(&suffix) {
        remove_if_present(&unit_dir(out_dir, task_id))?;
      }
      manifest.remove(key);
      info!(task = %key, "pruned");
    }
    if !removed.is_empty() {
      store.save(&manifest)?;
    }
  }

  Ok(PruneReport {
    kept: manifest.len(),
    removed,
    dry_run,
  })
}

fn remove_if_present(path: &Path) -> Result<(), PipelineError> {
  let result = match std::fs::symlink_metadata(path) {
    Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
    Ok(_) => std::fs::remove_file(path),
    Err(e) => Err(e),
  };

  match result {
    Ok(()) => {
      debug!(path = %path.display(), "removed");
      Ok(())
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(source) => Err(PipelineError::Remove {
      path: PathBuf::from(path),
      source,
    }),
  }
}
