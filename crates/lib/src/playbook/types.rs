use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Raw task parameters as written in the playbook.
pub type TaskParams = BTreeMap<String, Value>;

/// One entry of a playbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  /// Display label.
  #[serde(default)]
  pub name: String,

  /// Name of the module the task invokes.
  pub module: String,

  /// Module parameters.
  #[serde(default, deserialize_with = "null_as_empty")]
  pub params: TaskParams,

  /// Run the artifact with elevated privileges on the remote host.
  #[serde(default, rename = "become")]
  pub become_root: bool,

  /// User to become when `become` is set (default: root).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub become_user: Option<String>,
}

impl Task {
  pub fn new(name: &str, module: &str, params: TaskParams) -> Self {
    Self {
      name: name.to_string(),
      module: module.to_string(),
      params,
      become_root: false,
      become_user: None,
    }
  }
}

/// Ordered list of tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
  #[serde(default)]
  pub tasks: Vec<Task>,
}

impl Playbook {
  pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
    // An empty document is an empty playbook rather than a parse error.
    if content.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(content)
  }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<TaskParams, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<TaskParams>::deserialize(deserializer)?.unwrap_or_default())
}
