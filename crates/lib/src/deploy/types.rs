use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modules::ModuleResult;

/// Hosts artifacts are deployed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
  #[serde(default)]
  pub hosts: Vec<Host>,
}

/// One remote machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
  /// Hostname or address.
  pub name: String,
  pub user: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,
  /// SSH port; 22 when unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub port: Option<u16>,
  /// Private key file.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub key_path: Option<PathBuf>,
}

impl Host {
  pub fn new(name: &str, user: &str) -> Self {
    Self {
      name: name.to_string(),
      user: user.to_string(),
      password: None,
      port: None,
      key_path: None,
    }
  }

  pub fn port(&self) -> u16 {
    self.port.unwrap_or(22)
  }

  /// `user@name`
  pub fn destination(&self) -> String {
    format!("{}@{}", self.user, self.name)
  }
}

/// Captured output of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
  pub status: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl RemoteOutput {
  pub fn success(&self) -> bool {
    self.status == Some(0)
  }
}

#[derive(Debug, Error)]
pub enum DeployError {
  #[error("failed to read inventory {}: {source}", path.display())]
  ReadInventory {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse inventory {}: {source}", path.display())]
  ParseInventory {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("upload to {host}:{remote} failed: {stderr}")]
  Upload { host: String, remote: String, stderr: String },

  #[error("`{command}` on {host} exited with {status:?}: {stderr}")]
  Remote {
    host: String,
    command: String,
    status: Option<i32>,
    stderr: String,
  },

  #[error("artifact on {host} printed no result: {stdout:?}")]
  NoResult { host: String, stdout: String },
}

/// Load an inventory file (YAML, or JSON as its subset).
pub fn load_inventory(path: &Path) -> Result<Inventory, DeployError> {
  let content = std::fs::read_to_string(path).map_err(|source| DeployError::ReadInventory {
    path: path.to_path_buf(),
    source,
  })?;
  serde_yaml::from_str(&content).map_err(|source| DeployError::ParseInventory {
    path: path.to_path_buf(),
    source,
  })
}

/// Result of running one artifact on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRun {
  pub host: String,
  pub task: String,
  pub cache_key: String,
  #[serde(flatten)]
  pub outcome: RunOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
  /// The artifact ran and reported a result; `result.failed` may still be set.
  Reported { result: ModuleResult },
  /// Upload, execution or result parsing failed.
  Error { error: String },
}

impl RemoteRun {
  pub fn is_failed(&self) -> bool {
    match &self.outcome {
      RunOutcome::Reported { result } => result.failed,
      RunOutcome::Error { .. } => true,
    }
  }

  pub fn is_changed(&self) -> bool {
    matches!(&self.outcome, RunOutcome::Reported { result } if result.changed)
  }
}
