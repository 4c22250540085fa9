//! Cargo-backed toolchain.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use super::{Toolchain, ToolchainError};
use crate::consts::CARGO_ENV;
use crate::platform::BuildTarget;
use crate::unit::BuildUnit;

/// Lines of compiler stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Compiles units with `cargo build --release --target <triple>`.
///
/// Cargo holds a lock on its target directory for a whole build, so each
/// worker slot compiles into its own `slot-<n>` directory under `target_dir`.
/// Units built in the same slot reuse the compiled runtime crate.
#[derive(Debug, Clone)]
pub struct CargoToolchain {
  program: PathBuf,
  target_dir: PathBuf,
}

impl CargoToolchain {
  pub fn new(program: PathBuf, target_dir: PathBuf) -> Self {
    Self { program, target_dir }
  }

  /// Resolve the cargo executable from `PLUMBOPS_CARGO`, then `CARGO`,
  /// then `cargo` on `PATH`.
  pub fn from_env(target_dir: PathBuf) -> Self {
    let program = std::env::var_os(CARGO_ENV)
      .or_else(|| std::env::var_os("CARGO"))
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from("cargo"));
    Self::new(program, target_dir)
  }

  pub fn program(&self) -> &Path {
    &self.program
  }

  /// Cargo target directory used by worker slot `slot`.
  pub fn slot_target_dir(&self, slot: usize) -> PathBuf {
    self.target_dir.join(format!("slot-{}", slot))
  }

  /// Where cargo leaves the binary for `unit` on `triple`.
  pub fn output_path(&self, unit: &BuildUnit, triple: &str, target: &BuildTarget) -> PathBuf {
    self
      .slot_target_dir(unit.slot)
      .join(triple)
      .join("release")
      .join(format!("{}{}", unit.package, target.exe_suffix()))
  }

  async fn compile(&self, unit: &BuildUnit, bin_path: &Path, target: &BuildTarget) -> Result<(), ToolchainError> {
    let triple = target.rust_triple().ok_or_else(|| ToolchainError::UnsupportedTarget {
      target: target.pair(),
    })?;

    info!(package = %unit.package, target = %triple, slot = unit.slot, "compiling task unit");

    let mut command = Command::new(&self.program);
    command
      .arg("build")
      .arg("--release")
      .arg("--quiet")
      .arg("--manifest-path")
      .arg(&unit.manifest_path)
      .arg("--target")
      .arg(triple)
      .arg("--target-dir")
      .arg(self.slot_target_dir(unit.slot))
      .current_dir(&unit.dir)
      .stdin(Stdio::null())
      .kill_on_drop(true);

    debug!(program = %self.program.display(), manifest = %unit.manifest_path.display(), "spawning compiler");

    let output = command.output().await.map_err(|e| ToolchainError::Spawn {
      program: self.program.display().to_string(),
      source: e,
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
      debug!(stderr = %stderr, "compiler stderr");
      return Err(ToolchainError::Failed {
        code: output.status.code(),
        stderr: tail(&stderr, STDERR_TAIL_LINES),
      });
    }
    if !stderr.trim().is_empty() {
      debug!(stderr = %stderr, "compiler diagnostics");
    }

    let built = self.output_path(unit, triple, target);
    if !built.is_file() {
      return Err(ToolchainError::MissingOutput { path: built });
    }

    install(&built, bin_path).await
  }
}

impl Toolchain for CargoToolchain {
  fn build(
    &self,
    unit: &BuildUnit,
    bin_path: &Path,
    target: &BuildTarget,
  ) -> impl Future<Output = Result<(), ToolchainError>> + Send {
    self.compile(unit, bin_path, target)
  }
}

/// Copy the compiled binary next to `bin_path` and rename it into place, so
/// the artifact path never holds a partially written file.
async fn install(built: &Path, bin_path: &Path) -> Result<(), ToolchainError> {
  let mut staging = bin_path.as_os_str().to_owned();
  staging.push(".partial");
  let staging = PathBuf::from(staging);

  let install_err = |source: std::io::Error| ToolchainError::Install {
    path: bin_path.to_path_buf(),
    source,
  };

  tokio::fs::copy(built, &staging).await.map_err(install_err)?;
  if let Err(e) = tokio::fs::rename(&staging, bin_path).await {
    let _ = tokio::fs::remove_file(&staging).await;
    return Err(install_err(e));
  }
  Ok(())
}

/// Last `n` non-empty lines of `text`.
fn tail(text: &str, n: usize) -> String {
  let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
  let start = lines.len().saturating_sub(n);
  lines[start..].join("\n")
}
