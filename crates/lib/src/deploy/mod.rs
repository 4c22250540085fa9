//! Running built artifacts on remote hosts.
//!
//! Each artifact is copied to the remote staging directory, made executable,
//! run, and removed again. The artifact prints its module result as a JSON
//! line, which is parsed into a [`RemoteRun`]. Hosts are handled one after
//! another, tasks in playbook order.

mod ssh;
mod types;

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::consts::REMOTE_STAGING_DIR;
use crate::modules::ModuleResult;
use crate::pipeline::{BuildReport, TaskState};
use crate::playbook::Playbook;

pub use ssh::{OpenSshTransport, Transport};
pub use types::{DeployError, Host, Inventory, RemoteOutput, RemoteRun, RunOutcome, load_inventory};

/// One artifact ready to ship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployItem {
  pub task: String,
  pub cache_key: String,
  pub artifact: PathBuf,
  /// User to run as via `sudo`, when the task asks for privilege.
  pub become_user: Option<String>,
}

impl DeployItem {
  /// Items for every task of `report` that has a usable artifact, in
  /// playbook order. Failed tasks are left out.
  pub fn from_report(report: &BuildReport, playbook: &Playbook) -> Vec<DeployItem> {
    report
      .outcomes
      .iter()
      .filter(|o| !matches!(o.state, TaskState::Failed { .. }))
      .map(|o| {
        let task = playbook.tasks.get(o.position);
        let become_user = task
          .filter(|t| t.become_root)
          .map(|t| t.become_user.clone().unwrap_or_else(|| "root".to_string()));
        DeployItem {
          task: o.name.clone(),
          cache_key: o.cache_key.clone(),
          artifact: o.artifact.clone(),
          become_user,
        }
      })
      .collect()
  }

  pub fn remote_path(&self) -> String {
    format!("{}/{}", REMOTE_STAGING_DIR, self.cache_key)
  }

  fn run_command(&self) -> String {
    let path = shell_quote(&self.remote_path());
    match &self.become_user {
      Some(user) => format!("sudo -n -u {} {}", shell_quote(user), path),
      None => path,
    }
  }
}

/// Run every item on every host of `inventory`.
pub async fn deploy<T: Transport>(inventory: &Inventory, items: &[DeployItem], transport: &T) -> Vec<RemoteRun> {
  let mut runs = Vec::with_capacity(inventory.hosts.len() * items.len());

  for host in &inventory.hosts {
    info!(host = %host.name, tasks = items.len(), "deploying");
    for item in items {
      let outcome = match run_item(transport, host, item).await {
        Ok(result) => {
          if result.failed {
            warn!(host = %host.name, task = %item.cache_key, msg = %result.msg, "task reported failure");
          }
          RunOutcome::Reported { result }
        }
        Err(e) => {
          error!(host = %host.name, task = %item.cache_key, error = %e, "remote run failed");
          RunOutcome::Error { error: e.to_string() }
        }
      };
      runs.push(RemoteRun {
        host: host.name.clone(),
        task: item.task.clone(),
        cache_key: item.cache_key.clone(),
        outcome,
      });
    }
  }

  runs
}

async fn run_item<T: Transport>(transport: &T, host: &Host, item: &DeployItem) -> Result<ModuleResult, DeployError> {
  let remote = item.remote_path();
  transport.upload(host, &item.artifact, &remote).await?;

  let chmod = format!("chmod 0755 {}", shell_quote(&remote));
  let output = transport.exec(host, &chmod).await?;
  if !output.success() {
    return Err(DeployError::Remote {
      host: host.name.clone(),
      command: chmod,
      status: output.status,
      stderr: output.stderr.trim().to_string(),
    });
  }

  let output = transport.exec(host, &item.run_command()).await?;

  let cleanup = format!("rm -f {}", shell_quote(&remote));
  if let Err(e) = transport.exec(host, &cleanup).await {
    warn!(host = %host.name, remote = %remote, error = %e, "failed to remove staged artifact");
  }

  match parse_result(&output.stdout) {
    Some(result) => Ok(result),
    None if output.success() => Err(DeployError::NoResult {
      host: host.name.clone(),
      stdout: output.stdout,
    }),
    None => Err(DeployError::Remote {
      host: host.name.clone(),
      command: item.run_command(),
      status: output.status,
      stderr: output.stderr.trim().to_string(),
    }),
  }
}

/// The last stdout line that parses as a module result.
fn parse_result(stdout: &str) -> Option<ModuleResult> {
  stdout
    .lines()
    .rev()
    .find_map(|line| serde_json::from_str(line.trim()).ok())
}

/// Single-quote `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
  format!("'{}'", s.replace('\'', r"'\''"))
}
