//! Playbook loading.
//!
//! A playbook is a YAML document with a single `tasks` list. Each task names a
//! module and carries its parameters. The build pipeline only ever reads a
//! loaded [`Playbook`]; the position of a task in `tasks` is part of its
//! identity.

mod types;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub use types::*;

/// Errors that can occur while loading a playbook.
#[derive(Debug, Error)]
pub enum PlaybookError {
  #[error("failed to read playbook {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse playbook {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("task {position} in {} has an empty module name", path.display())]
  EmptyModule { path: PathBuf, position: usize },
}

/// Load and validate a playbook file.
pub fn load(path: &Path) -> Result<Playbook, PlaybookError> {
  let content = fs::read_to_string(path).map_err(|e| PlaybookError::Read {
    path: path.to_path_buf(),
    source: e,
  })?;

  let playbook = Playbook::from_yaml_str(&content).map_err(|e| PlaybookError::Parse {
    path: path.to_path_buf(),
    source: e,
  })?;

  if let Some(position) = playbook.tasks.iter().position(|t| t.module.trim().is_empty()) {
    return Err(PlaybookError::EmptyModule {
      path: path.to_path_buf(),
      position,
    });
  }

  debug!(path = %path.display(), tasks = playbook.tasks.len(), "loaded playbook");
  Ok(playbook)
}
