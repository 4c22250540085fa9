//! Build orchestration.
//!
//! A run loads the manifest once, decides per task whether its artifact is
//! still fresh, builds the rest on a bounded worker pool, and persists the
//! manifest once at the end. Per-task failures are recorded in the report and
//! never abort the run; only configuration errors before the first task and a
//! failure to persist the manifest do.
//!
//! Manifest updates are applied after all workers finish, in playbook order,
//! so the result does not depend on completion order.

mod maintenance;
mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::{self, CacheStatus};
use crate::identity::{TaskIdentity, identify};
use crate::manifest::{BuildManifest, ManifestEntry, ManifestStore};
use crate::out_lock::{LockMode, OutDirLock};
use crate::platform::BuildTarget;
use crate::playbook::{self, Playbook, Task};
use crate::toolchain::{Toolchain, ToolchainError};
use crate::unit::{self, RuntimeDep};
use crate::util::hash::hash_file;

pub use maintenance::{PruneReport, StatusRow, prune, status};
pub use types::{BuildConfig, BuildReport, BuildStrategy, PipelineError, TaskOutcome, TaskState};

/// Path of the artifact for `cache_key`.
pub fn artifact_path(out_dir: &Path, cache_key: &str) -> PathBuf {
  out_dir.join(cache_key)
}

/// A task with its identity and cache decision.
#[derive(Debug, Clone)]
pub struct PlannedTask {
  pub position: usize,
  pub task: Task,
  pub identity: TaskIdentity,
  pub artifact: PathBuf,
  pub status: CacheStatus,
}

impl PlannedTask {
  fn outcome(&self, state: TaskState) -> TaskOutcome {
    TaskOutcome {
      position: self.position,
      name: self.task.name.clone(),
      module: self.task.module.clone(),
      task_id: self.identity.task_id.clone(),
      cache_key: self.identity.cache_key.clone(),
      artifact: self.artifact.clone(),
      state,
    }
  }
}

/// Identify every task and check its artifact against `manifest`.
///
/// Reads artifacts but mutates nothing.
pub fn plan(playbook: &Playbook, out_dir: &Path, target: &BuildTarget, manifest: &BuildManifest, force: bool) -> Vec<PlannedTask> {
  playbook
    .tasks
    .iter()
    .enumerate()
    .map(|(position, task)| {
      let identity = identify(position, &task.module, &task.name, target);
      let artifact = artifact_path(out_dir, &identity.cache_key);
      let status = cache::check(&identity.cache_key, &artifact, manifest, force);
      PlannedTask {
        position,
        task: task.clone(),
        identity,
        artifact,
        status,
      }
    })
    .collect()
}

/// Record every built outcome in `manifest`, in playbook order.
///
/// Skipped and failed tasks leave their entries untouched. When two outcomes
/// share a cache key the later one wins.
pub fn apply_outcomes(mut manifest: BuildManifest, outcomes: &[TaskOutcome], source: &str) -> BuildManifest {
  let mut ordered: Vec<&TaskOutcome> = outcomes.iter().collect();
  ordered.sort_by_key(|o| o.position);

  for outcome in ordered {
    if let TaskState::Built { sha256 } = &outcome.state {
      manifest.insert(
        outcome.cache_key.clone(),
        ManifestEntry::new(sha256.clone(), source, &outcome.module),
      );
    }
  }
  manifest
}

/// Settings every worker needs, shared behind one `Arc`.
struct WorkerContext {
  out_dir: PathBuf,
  target: BuildTarget,
  runtime: RuntimeDep,
  task_timeout: Option<std::time::Duration>,
  keep_sources: bool,
}

/// Bounded set of worker slots.
///
/// At most `jobs` builds hold a slot at once, and no two of them hold the
/// same index, so a toolchain can give each slot private scratch space.
struct SlotPool {
  permits: Semaphore,
  free: Mutex<Vec<usize>>,
}

/// A held slot; its index returns to the pool before the permit is released.
struct Slot<'a> {
  pool: &'a SlotPool,
  index: usize,
  _permit: Option<SemaphorePermit<'a>>,
}

impl SlotPool {
  fn new(jobs: usize) -> Self {
    let jobs = jobs.max(1);
    Self {
      permits: Semaphore::new(jobs),
      free: Mutex::new((0..jobs).rev().collect()),
    }
  }

  async fn acquire(&self) -> Slot<'_> {
    // The semaphore is never closed, so a permit is always granted.
    let permit = self.permits.acquire().await.ok();
    // Holding a permit guarantees a free index.
    let index = self.free().pop().unwrap_or_default();
    Slot {
      pool: self,
      index,
      _permit: permit,
    }
  }

  fn free(&self) -> MutexGuard<'_, Vec<usize>> {
    self.free.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Drop for Slot<'_> {
  fn drop(&mut self) {
    self.pool.free().push(self.index);
  }
}

/// The build orchestrator.
pub struct Pipeline<T: Toolchain> {
  toolchain: Arc<T>,
  config: BuildConfig,
}

impl<T: Toolchain> Pipeline<T> {
  pub fn new(toolchain: T, config: BuildConfig) -> Self {
    Self {
      toolchain: Arc::new(toolchain),
      config,
    }
  }

  pub fn config(&self) -> &BuildConfig {
    &self.config
  }

  pub fn toolchain(&self) -> &T {
    &self.toolchain
  }

  /// Load the configured playbook and run it.
  pub async fn run_from_config(&self) -> Result<BuildReport, PipelineError> {
    let playbook = playbook::load(&self.config.playbook_path)?;
    self.run(&playbook).await
  }

  /// Build every stale task of `playbook` and persist the manifest.
  pub async fn run(&self, playbook: &Playbook) -> Result<BuildReport, PipelineError> {
    let config = &self.config;
    let out_dir = &config.out_dir;

    std::fs::create_dir_all(out_dir).map_err(|source| PipelineError::CreateOutDir {
      path: out_dir.clone(),
      source,
    })?;
    let _lock = OutDirLock::acquire(out_dir, LockMode::Exclusive, &config.lock_holder("build"))?;

    let store = ManifestStore::in_dir(out_dir);
    let manifest = store.load();

    info!(
      tasks = playbook.tasks.len(),
      target = %config.target,
      force = config.force,
      jobs = config.jobs,
      "starting build"
    );

    let planned = plan(playbook, out_dir, &config.target, &manifest, config.force);

    let mut outcomes = Vec::with_capacity(planned.len());
    let mut stale = Vec::new();
    for task in planned {
      if task.status.is_fresh() {
        info!(task = %task.identity, "skipping unchanged artifact");
        outcomes.push(task.outcome(TaskState::Skipped));
      } else {
        debug!(task = %task.identity, status = ?task.status, "artifact needs rebuild");
        stale.push(task);
      }
    }

    let built = match config.strategy {
      BuildStrategy::PerTask => self.build_stale(stale).await,
    };
    outcomes.extend(built);
    outcomes.sort_by_key(|o| o.position);

    let manifest = apply_outcomes(manifest, &outcomes, &config.source());
    store.save(&manifest)?;

    let report = BuildReport {
      outcomes,
      manifest_path: store.path().to_path_buf(),
      target: config.target.pair(),
    };

    info!(
      built = report.built(),
      skipped = report.skipped(),
      failed = report.failed(),
      "build complete"
    );

    Ok(report)
  }

  /// Build stale tasks on at most `jobs` concurrent workers.
  ///
  /// Tasks sharing a cache key would write the same artifact path, so they
  /// are grouped and built one after another by a single worker. A task's
  /// time budget starts once its worker holds a slot.
  async fn build_stale(&self, stale: Vec<PlannedTask>) -> Vec<TaskOutcome> {
    if stale.is_empty() {
      return Vec::new();
    }

    let mut groups: Vec<Vec<PlannedTask>> = Vec::new();
    let mut group_of: HashMap<String, usize> = HashMap::new();
    for task in stale {
      match group_of.get(&task.identity.cache_key) {
        Some(&idx) => {
          warn!(task = %task.identity, "cache key shared with an earlier task, building in sequence");
          groups[idx].push(task);
        }
        None => {
          group_of.insert(task.identity.cache_key.clone(), groups.len());
          groups.push(vec![task]);
        }
      }
    }

    let ctx = Arc::new(WorkerContext {
      out_dir: self.config.out_dir.clone(),
      target: self.config.target.clone(),
      runtime: self.config.runtime.clone(),
      task_timeout: self.config.task_timeout,
      keep_sources: self.config.keep_sources,
    });
    let slots = Arc::new(SlotPool::new(self.config.jobs));
    let mut join_set = JoinSet::new();
    let all: Vec<PlannedTask> = groups.iter().flatten().cloned().collect();

    for group in groups {
      let toolchain = Arc::clone(&self.toolchain);
      let ctx = Arc::clone(&ctx);
      let slots = Arc::clone(&slots);

      join_set.spawn(async move {
        let slot = slots.acquire().await;

        let mut outcomes = Vec::with_capacity(group.len());
        for task in &group {
          let state = build_task(toolchain.as_ref(), &ctx, task, slot.index).await;
          outcomes.push(task.outcome(state));
        }
        outcomes
      });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = join_set.join_next().await {
      match joined {
        Ok(group_outcomes) => outcomes.extend(group_outcomes),
        Err(e) => error!(error = %e, "build worker panicked"),
      }
    }

    // Tasks of a panicked worker still get an outcome.
    for task in all {
      if !outcomes.iter().any(|o| o.position == task.position) {
        outcomes.push(task.outcome(TaskState::Failed {
          error: "build worker panicked".to_string(),
        }));
      }
    }

    outcomes
  }
}

/// Generate, compile and hash one task in worker slot `slot`. Never fails the run.
async fn build_task<T: Toolchain>(toolchain: &T, ctx: &WorkerContext, task: &PlannedTask, slot: usize) -> TaskState {
  let key = &task.identity.cache_key;
  info!(task = %key, module = %task.task.module, slot, "building");

  let unit = match unit::generate(&task.task, &task.identity.task_id, &ctx.out_dir, &ctx.runtime) {
    Ok(unit) => unit.in_slot(slot),
    Err(e) => {
      error!(task = %key, error = %e, "failed to generate build unit");
      return TaskState::Failed { error: e.to_string() };
    }
  };

  let build = toolchain.build(&unit, &task.artifact, &ctx.target);
  let result = match ctx.task_timeout {
    Some(after) => match tokio::time::timeout(after, build).await {
      Ok(result) => result,
      Err(_) => Err(ToolchainError::TimedOut { after }),
    },
    None => build.await,
  };

  if let Err(e) = result {
    error!(task = %key, error = %e, "build failed");
    return TaskState::Failed { error: e.to_string() };
  }

  let sha256 = match hash_file(&task.artifact) {
    Ok(hash) => hash,
    Err(e) => {
      error!(task = %key, error = %e, "failed to hash built artifact");
      return TaskState::Failed { error: e.to_string() };
    }
  };

  if !ctx.keep_sources
    && let Err(e) = tokio::fs::remove_dir_all(&unit.dir).await
  {
    warn!(task = %key, dir = %unit.dir.display(), error = %e, "failed to remove build unit");
  }

  info!(task = %key, sha256 = %sha256, "built");
  TaskState::Built { sha256 }
}
