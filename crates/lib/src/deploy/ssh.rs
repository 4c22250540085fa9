//! Remote transport over the system OpenSSH client.

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::types::{DeployError, Host, RemoteOutput};

/// Copies files to and runs commands on a remote host.
pub trait Transport: Send + Sync {
  fn upload(&self, host: &Host, local: &Path, remote: &str) -> impl Future<Output = Result<(), DeployError>> + Send;

  /// Run `command` through the remote user's shell. A non-zero exit is
  /// reported in [`RemoteOutput::status`], not as an error.
  fn exec(&self, host: &Host, command: &str) -> impl Future<Output = Result<RemoteOutput, DeployError>> + Send;
}

/// [`Transport`] driving the `ssh` and `scp` executables.
///
/// Hosts with a password go through `sshpass -e`; everything else runs in
/// batch mode so a missing key fails instead of prompting.
#[derive(Debug, Clone)]
pub struct OpenSshTransport {
  ssh: PathBuf,
  scp: PathBuf,
  sshpass: PathBuf,
  connect_timeout: Duration,
}

impl Default for OpenSshTransport {
  fn default() -> Self {
    Self {
      ssh: PathBuf::from("ssh"),
      scp: PathBuf::from("scp"),
      sshpass: PathBuf::from("sshpass"),
      connect_timeout: Duration::from_secs(10),
    }
  }
}

impl OpenSshTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_programs(mut self, ssh: impl Into<PathBuf>, scp: impl Into<PathBuf>) -> Self {
    self.ssh = ssh.into();
    self.scp = scp.into();
    self
  }

  /// Give up connecting to a host after `timeout` (rounded down to whole
  /// seconds, at least one).
  pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
    self.connect_timeout = timeout;
    self
  }

  /// Options shared by `ssh` and `scp`. `port_flag` is `-p` for ssh and
  /// `-P` for scp.
  fn common_args(&self, host: &Host, port_flag: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
      port_flag.into(),
      host.port().to_string().into(),
      "-o".into(),
      format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)).into(),
      "-o".into(),
      "StrictHostKeyChecking=accept-new".into(),
    ];
    if host.password.is_none() {
      args.push("-o".into());
      args.push("BatchMode=yes".into());
    }
    if let Some(key) = &host.key_path {
      args.push("-i".into());
      args.push(key.as_os_str().to_owned());
    }
    args
  }

  fn ssh_args(&self, host: &Host, command: &str) -> Vec<OsString> {
    let mut args = self.common_args(host, "-p");
    args.push(host.destination().into());
    args.push("--".into());
    args.push(command.into());
    args
  }

  fn scp_args(&self, host: &Host, local: &Path, remote: &str) -> Vec<OsString> {
    let mut args = self.common_args(host, "-P");
    args.push("-q".into());
    args.push(local.as_os_str().to_owned());
    args.push(format!("{}:{}", host.destination(), remote).into());
    args
  }

  fn command(&self, program: &Path, host: &Host, args: Vec<OsString>) -> Command {
    let mut command = match &host.password {
      Some(password) => {
        let mut command = Command::new(&self.sshpass);
        command.arg("-e").arg(program).env("SSHPASS", password);
        command
      }
      None => Command::new(program),
    };
    command.args(args).stdin(std::process::Stdio::null()).kill_on_drop(true);
    command
  }

  async fn output(&self, mut command: Command, program: &Path) -> Result<RemoteOutput, DeployError> {
    let output = command.output().await.map_err(|source| DeployError::Spawn {
      program: program.display().to_string(),
      source,
    })?;
    Ok(RemoteOutput {
      status: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
  }
}

impl Transport for OpenSshTransport {
  async fn upload(&self, host: &Host, local: &Path, remote: &str) -> Result<(), DeployError> {
    debug!(host = %host.name, local = %local.display(), remote = %remote, "uploading");
    let args = self.scp_args(host, local, remote);
    let output = self.output(self.command(&self.scp, host, args), &self.scp).await?;
    if output.success() {
      Ok(())
    } else {
      Err(DeployError::Upload {
        host: host.name.clone(),
        remote: remote.to_string(),
        stderr: output.stderr.trim().to_string(),
      })
    }
  }

  async fn exec(&self, host: &Host, command: &str) -> Result<RemoteOutput, DeployError> {
    debug!(host = %host.name, command = %command, "running remote command");
    let args = self.ssh_args(host, command);
    self.output(self.command(&self.ssh, host, args), &self.ssh).await
  }
}
