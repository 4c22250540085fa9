//! Build unit generation.
//!
//! For every task that needs building, the generator writes a minimal cargo
//! package into a fresh per-task directory:
//!
//! ```text
//! {out_dir}/.units/{task_id}/
//! ├── Cargo.toml     # depends on plumbops-modules, size-optimized release profile
//! ├── params.json    # coerced task parameters, embedded at compile time
//! └── src/main.rs    # calls the task's module with the embedded parameters
//! ```
//!
//! The module is resolved against the registry here, so an unknown module name
//! fails the task before the compiler is ever invoked.

mod templates;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::{PARAMS_FILENAME, UNIT_PACKAGE_PREFIX, UNITS_DIR_NAME};
use crate::modules::{self, coerce_params};
use crate::playbook::Task;

pub use templates::{CARGO_TOML_TEMPLATE, MAIN_RS_TEMPLATE};

/// Errors that can occur while generating a build unit.
#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("unknown module '{module}' (known: {})", known.join(", "))]
  UnknownModule { module: String, known: Vec<&'static str> },

  #[error("failed to prepare directory {}: {source}", path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write {}: {source}", path.display())]
  WriteFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to serialize parameters: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// Where generated units find the module runtime crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeDep {
  /// Local checkout of `plumbops-modules`.
  Path(PathBuf),
  /// Registry version requirement.
  Version(String),
}

impl RuntimeDep {
  /// TOML value for the `plumbops-modules` dependency line.
  fn to_toml(&self) -> String {
    match self {
      RuntimeDep::Path(path) => format!("{{ path = {} }}", toml_string(&path.to_string_lossy())),
      RuntimeDep::Version(req) => format!("{{ version = {} }}", toml_string(req)),
    }
  }
}

impl Default for RuntimeDep {
  fn default() -> Self {
    RuntimeDep::Path(PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../modules")))
  }
}

/// A generated, ready-to-compile task unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildUnit {
  /// Unit root directory.
  pub dir: PathBuf,
  /// Path to the unit's `Cargo.toml`.
  pub manifest_path: PathBuf,
  /// Package and binary name.
  pub package: String,
  /// Module the unit runs.
  pub module: String,
  /// Worker slot compiling the unit. Units compiled at the same time never
  /// share a slot.
  pub slot: usize,
}

impl BuildUnit {
  /// The same unit assigned to worker slot `slot`.
  pub fn in_slot(self, slot: usize) -> Self {
    Self { slot, ..self }
  }
}

/// Directory the unit for `task_id` is generated in.
pub fn unit_dir(out_dir: &Path, task_id: &str) -> PathBuf {
  out_dir.join(UNITS_DIR_NAME).join(task_id)
}

/// Generate the build unit for `task` under `out_dir/.units/task_id`.
///
/// Any previous content at the unit path is removed first.
pub fn generate(task: &Task, task_id: &str, out_dir: &Path, runtime: &RuntimeDep) -> Result<BuildUnit, GenerateError> {
  let module = modules::lookup(&task.module).ok_or_else(|| GenerateError::UnknownModule {
    module: task.module.clone(),
    known: modules::names(),
  })?;

  let dir = unit_dir(out_dir, task_id);
  let cleared = match fs::symlink_metadata(&dir) {
    Ok(meta) if meta.is_dir() => fs::remove_dir_all(&dir),
    Ok(_) => fs::remove_file(&dir),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  };
  cleared.map_err(|e| GenerateError::CreateDir {
    path: dir.clone(),
    source: e,
  })?;
  let src_dir = dir.join("src");
  fs::create_dir_all(&src_dir).map_err(|e| GenerateError::CreateDir {
    path: src_dir.clone(),
    source: e,
  })?;

  let package = package_name(task_id);
  let params = serde_json::to_string_pretty(&coerce_params(&task.params))?;

  let cargo_toml = CARGO_TOML_TEMPLATE
    .replace("{package}", &package)
    .replace("{runtime}", &runtime.to_toml());
  let main_rs = MAIN_RS_TEMPLATE
    .replace("{module_type}", module.type_path())
    .replace("{params_file}", PARAMS_FILENAME)
    .replace("{task_name}", &format!("{:?}", task.name));

  let manifest_path = dir.join("Cargo.toml");
  write(&dir.join(PARAMS_FILENAME), &params)?;
  write(&manifest_path, &cargo_toml)?;
  write(&src_dir.join("main.rs"), &main_rs)?;

  debug!(task = %task_id, dir = %dir.display(), module = %task.module, "generated build unit");

  Ok(BuildUnit {
    dir,
    manifest_path,
    package,
    module: task.module.clone(),
    slot: 0,
  })
}

/// Cargo package name for a task id. Task ids start with their position, and
/// package names may not start with a digit.
pub fn package_name(task_id: &str) -> String {
  format!("{}{}", UNIT_PACKAGE_PREFIX, task_id)
}

fn write(path: &Path, content: &str) -> Result<(), GenerateError> {
  fs::write(path, content).map_err(|e| GenerateError::WriteFile {
    path: path.to_path_buf(),
    source: e,
  })
}

/// Quote `s` as a TOML basic string. JSON string escapes are valid TOML.
fn toml_string(s: &str) -> String {
  serde_json::Value::String(s.to_string()).to_string()
}
