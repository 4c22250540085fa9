//! plumbops-modules: the task modules a built artifact runs.
//!
//! Every task artifact links this crate and calls [`entrypoint`] with one
//! module and the parameter payload embedded at build time. The crate is kept
//! free of heavy dependencies so per-task builds stay small.

pub mod file;
pub mod shell;

use std::collections::BTreeMap;
use std::process::ExitCode;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flat parameter mapping handed to a module.
pub type Params = BTreeMap<String, String>;

/// Outcome of running a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleResult {
  pub module: String,
  pub changed: bool,
  pub failed: bool,
  pub msg: String,
}

impl ModuleResult {
  pub fn ok(module: &str, changed: bool, msg: impl Into<String>) -> Self {
    Self {
      module: module.to_string(),
      changed,
      failed: false,
      msg: msg.into(),
    }
  }

  pub fn fail(module: &str, msg: impl Into<String>) -> Self {
    Self {
      module: module.to_string(),
      changed: false,
      failed: true,
      msg: msg.into(),
    }
  }
}

/// A capability a task can invoke.
pub trait Module: Send + Sync {
  /// Name used in playbooks (`module: file`).
  fn name(&self) -> &'static str;

  /// Fully qualified Rust path of the implementing type, referenced by
  /// generated build units.
  fn type_path(&self) -> &'static str;

  fn run(&self, params: &Params) -> ModuleResult;
}

static REGISTRY: &[&dyn Module] = &[&file::FileModule, &shell::ShellModule];

/// Look up a module by name.
pub fn lookup(name: &str) -> Option<&'static dyn Module> {
  REGISTRY.iter().copied().find(|m| m.name() == name)
}

/// Names of all registered modules.
pub fn names() -> Vec<&'static str> {
  REGISTRY.iter().map(|m| m.name()).collect()
}

/// Flatten structured playbook parameters into the string mapping modules take.
///
/// Strings pass through unchanged. Numbers and booleans become their JSON text
/// (`42`, `true`). Sequences and mappings are JSON-encoded. `null` values are
/// dropped.
pub fn coerce_params(raw: &BTreeMap<String, Value>) -> Params {
  raw
    .iter()
    .filter_map(|(key, value)| {
      let flat = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => value.to_string(),
      };
      Some((key.clone(), flat))
    })
    .collect()
}

/// Interpret a coerced boolean parameter.
pub fn param_flag(params: &Params, key: &str) -> bool {
  matches!(
    params.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
    Some("true" | "yes" | "1")
  )
}

/// Main body of a generated task artifact.
///
/// Decodes the embedded payload, runs `module`, prints the result as one JSON
/// line on stdout and maps failure to a non-zero exit code.
pub fn entrypoint(module: &dyn Module, payload: &str) -> ExitCode {
  let result = match serde_json::from_str::<Params>(payload) {
    Ok(params) => module.run(&params),
    Err(e) => ModuleResult::fail(module.name(), format!("invalid parameter payload: {}", e)),
  };

  match serde_json::to_string(&result) {
    Ok(line) => println!("{}", line),
    Err(e) => eprintln!("failed to encode result: {}", e),
  }

  if result.failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
