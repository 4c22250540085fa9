//! `shell` module: run a command through the platform shell.
//!
//! Parameters:
//! - `cmd`: the command line (required)
//! - `chdir`: working directory (optional)
//!
//! A successful command always reports `changed`; its stdout is the message.
//! A non-zero exit fails the task with stderr as the message.

use std::process::Command;

use crate::{Module, ModuleResult, Params};

const NAME: &str = "shell";

pub struct ShellModule;

impl Module for ShellModule {
  fn name(&self) -> &'static str {
    NAME
  }

  fn type_path(&self) -> &'static str {
    "plumbops_modules::shell::ShellModule"
  }

  fn run(&self, params: &Params) -> ModuleResult {
    let cmd = match params.get("cmd").map(|c| c.trim()) {
      Some(c) if !c.is_empty() => c,
      _ => return ModuleResult::fail(NAME, "Missing 'cmd' parameter for shell module"),
    };

    let (shell, args) = platform_shell();
    let mut command = Command::new(shell);
    command.args(args).arg(cmd);
    if let Some(dir) = params.get("chdir").filter(|d| !d.is_empty()) {
      command.current_dir(dir);
    }

    let output = match command.output() {
      Ok(output) => output,
      Err(e) => return ModuleResult::fail(NAME, format!("Failed to spawn {}: {}", shell, e)),
    };

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return ModuleResult::fail(NAME, format!("Command failed: {}", stderr.trim_end()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    ModuleResult::ok(NAME, true, format!("Command output: {}", stdout.trim_end()))
  }
}

/// Shell binary and the flag that introduces a command string.
#[cfg(unix)]
fn platform_shell() -> (&'static str, &'static [&'static str]) {
  ("/bin/sh", &["-c"])
}

#[cfg(windows)]
fn platform_shell() -> (&'static str, &'static [&'static str]) {
  ("cmd.exe", &["/C"])
}
