use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::manifest::ManifestError;
use crate::out_lock::{LockHolder, OutDirLockError};
use crate::platform::BuildTarget;
use crate::playbook::PlaybookError;
use crate::unit::RuntimeDep;
use crate::util::hash::ContentHash;

/// How tasks are turned into artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildStrategy {
  /// One generated unit and one executable per task.
  #[default]
  PerTask,
}

/// Configuration for one build run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
  /// Playbook file; also recorded as each entry's `source`.
  pub playbook_path: PathBuf,

  /// Directory holding artifacts, units and the manifest.
  pub out_dir: PathBuf,

  pub target: BuildTarget,

  /// Rebuild every task regardless of manifest state.
  pub force: bool,

  /// Maximum number of concurrent toolchain invocations.
  /// `1` builds strictly one task at a time.
  pub jobs: usize,

  /// Upper bound on one task's toolchain invocation.
  pub task_timeout: Option<Duration>,

  /// Keep generated units after a successful build.
  pub keep_sources: bool,

  pub strategy: BuildStrategy,

  pub runtime: RuntimeDep,
}

impl BuildConfig {
  pub fn new(playbook_path: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
    Self {
      playbook_path: playbook_path.into(),
      out_dir: out_dir.into(),
      target: BuildTarget::host(),
      force: false,
      jobs: default_jobs(),
      task_timeout: None,
      keep_sources: false,
      strategy: BuildStrategy::default(),
      runtime: RuntimeDep::default(),
    }
  }

  /// Source string recorded in manifest entries.
  pub fn source(&self) -> String {
    self.playbook_path.display().to_string()
  }

  /// Lock holder record for running `command` with this configuration.
  pub fn lock_holder(&self, command: &str) -> LockHolder {
    LockHolder::current(command, &self.playbook_path, &self.target)
  }
}

fn default_jobs() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// Terminal state of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
  /// Artifact matched its recorded hash.
  Skipped,
  /// Artifact rebuilt; the manifest now records `sha256`.
  Built { sha256: ContentHash },
  /// Generation, compilation or hashing failed. The manifest entry, if any,
  /// is left as it was.
  Failed { error: String },
}

/// What happened to one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
  pub position: usize,
  pub name: String,
  pub module: String,
  pub task_id: String,
  pub cache_key: String,
  pub artifact: PathBuf,
  #[serde(flatten)]
  pub state: TaskState,
}

impl TaskOutcome {
  pub fn is_failed(&self) -> bool {
    matches!(self.state, TaskState::Failed { .. })
  }
}

/// Result of a completed run. Produced only once the manifest is persisted.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
  /// Outcomes in playbook order.
  pub outcomes: Vec<TaskOutcome>,
  pub manifest_path: PathBuf,
  pub target: String,
}

impl BuildReport {
  pub fn built(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|o| matches!(o.state, TaskState::Built { .. }))
      .count()
  }

  pub fn skipped(&self) -> usize {
    self.outcomes.iter().filter(|o| o.state == TaskState::Skipped).count()
  }

  pub fn failed(&self) -> usize {
    self.outcomes.iter().filter(|o| o.is_failed()).count()
  }

  pub fn has_failures(&self) -> bool {
    self.outcomes.iter().any(TaskOutcome::is_failed)
  }
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Playbook(#[from] PlaybookError),

  #[error("failed to create output directory {}: {source}", path.display())]
  CreateOutDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Lock(#[from] OutDirLockError),

  #[error("failed to persist build manifest: {0}")]
  Persist(#[from] ManifestError),

  #[error("failed to remove {}: {source}", path.display())]
  Remove {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}
