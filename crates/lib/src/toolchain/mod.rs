//! Toolchain invocation.
//!
//! A [`Toolchain`] turns a generated [`BuildUnit`] into a single stripped
//! executable at a requested path for a requested target. Failures are per
//! task: the orchestrator logs them and moves on.

mod cargo;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::platform::BuildTarget;
use crate::unit::BuildUnit;

pub use cargo::CargoToolchain;

/// Errors that can occur while compiling a unit.
#[derive(Debug, Error)]
pub enum ToolchainError {
  #[error("no compiler target known for {target}")]
  UnsupportedTarget { target: String },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("compiler exited with code {code:?}: {stderr}")]
  Failed { code: Option<i32>, stderr: String },

  #[error("compiler reported success but produced no binary at {}", path.display())]
  MissingOutput { path: PathBuf },

  #[error("failed to install artifact at {}: {source}", path.display())]
  Install {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("build exceeded its time budget of {after:?}")]
  TimedOut { after: Duration },
}

/// Something that can compile a build unit into an executable.
///
/// Implementations must leave either a complete file or nothing at
/// `bin_path`; a cache check may hash it on the next run.
pub trait Toolchain: Send + Sync + 'static {
  fn build(
    &self,
    unit: &BuildUnit,
    bin_path: &Path,
    target: &BuildTarget,
  ) -> impl Future<Output = Result<(), ToolchainError>> + Send;
}
