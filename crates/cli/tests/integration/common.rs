//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// The two-task playbook used across tests.
pub const TWO_TASKS: &str = r#"
tasks:
  - name: a
    module: file
    params:
      path: /tmp/x
      state: touch
  - name: b
    module: shell
    params:
      cmd: echo hi
"#;

pub const KEY_A: &str = "0-file-a-linux-amd64";
pub const KEY_B: &str = "1-shell-b-linux-amd64";

/// Stand-in for cargo: writes a unique file where cargo would leave the
/// release binary and appends one line per invocation to `$FAKE_CARGO_LOG`.
/// Fails for units whose manifest mentions `$FAKE_CARGO_FAIL`.
const FAKE_CARGO: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    --manifest-path) manifest="$2"; shift ;;
    --target) triple="$2"; shift ;;
    --target-dir) target_dir="$2"; shift ;;
  esac
  shift
done
pkg=$(sed -n 's/^name = "\(.*\)"$/\1/p' "$manifest" | head -n 1)
echo "$pkg" >> "$FAKE_CARGO_LOG"
if [ -n "$FAKE_CARGO_FAIL" ] && [ "$pkg" = "$FAKE_CARGO_FAIL" ]; then
  echo "error: could not compile \`$pkg\`" >&2
  exit 101
fi
mkdir -p "$target_dir/$triple/release"
printf 'fake %s %s\n' "$pkg" "$(wc -l < "$FAKE_CARGO_LOG")" > "$target_dir/$triple/release/$pkg"
"#;

/// Isolated test environment.
///
/// Each test gets its own directory holding the playbook, the output
/// directory and the fake compiler.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn with_playbook(content: &str) -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("playbook.yaml"), content).unwrap();
    let env = Self { temp };
    env.install_fake_cargo();
    env
  }

  pub fn two_tasks() -> Self {
    Self::with_playbook(TWO_TASKS)
  }

  fn install_fake_cargo(&self) {
    use std::os::unix::fs::PermissionsExt;

    let path = self.fake_cargo();
    std::fs::write(&path, FAKE_CARGO).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  pub fn fake_cargo(&self) -> PathBuf {
    self.path().join("fake-cargo")
  }

  pub fn write_playbook(&self, content: &str) {
    std::fs::write(self.path().join("playbook.yaml"), content).unwrap();
  }

  pub fn out_dir(&self) -> PathBuf {
    self.path().join("dist")
  }

  pub fn artifact(&self, key: &str) -> PathBuf {
    self.out_dir().join(key)
  }

  pub fn manifest_path(&self) -> PathBuf {
    self.out_dir().join("build-manifest.json")
  }

  pub fn manifest(&self) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(self.manifest_path()).unwrap()).unwrap()
  }

  /// Packages the fake compiler was asked to build, sorted. Parallel jobs
  /// make invocation order nondeterministic.
  pub fn compiled(&self) -> Vec<String> {
    let mut packages: Vec<String> = std::fs::read_to_string(self.path().join("cargo.log"))
      .map(|log| log.lines().map(str::to_string).collect())
      .unwrap_or_default();
    packages.sort();
    packages
  }

  fn configure(&self, mut cmd: Command) -> Command {
    cmd
      .current_dir(self.path())
      .env("PLUMBOPS_CARGO", self.fake_cargo())
      .env("FAKE_CARGO_LOG", self.path().join("cargo.log"))
      .env_remove("FAKE_CARGO_FAIL")
      .env_remove("RUST_LOG");
    cmd
  }

  pub fn plumbops(&self, subcommand: &str) -> Command {
    let mut cmd = self.configure(cargo_bin_cmd!("plumbops"));
    cmd.arg(subcommand).args(["--target", "linux/amd64"]);
    cmd
  }

  pub fn build(&self) -> Command {
    let mut cmd = self.configure(cargo_bin_cmd!("plumbops-build"));
    cmd.args(["--target", "linux/amd64"]);
    cmd
  }
}
