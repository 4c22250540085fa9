//! Task identity.
//!
//! A task's id is a slug of its playbook position, module and name. The cache
//! key qualifies that id with the build target, so the same task built for two
//! platforms gets two manifest entries and two artifacts.
//!
//! Any change to position, module or name yields a new key. Renaming a task is
//! therefore a cache miss even when its behavior is unchanged.

use std::fmt;

use crate::platform::BuildTarget;

/// Derived identity of one task in one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskIdentity {
  /// Filesystem-safe slug of `position-module-name`.
  pub task_id: String,
  /// `task_id-os-arch`; keys the manifest and names the artifact.
  pub cache_key: String,
}

impl fmt::Display for TaskIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.cache_key)
  }
}

/// Derive the identity of the task at `position`.
pub fn identify(position: usize, module: &str, name: &str, target: &BuildTarget) -> TaskIdentity {
  let task_id = slugify(&format!("{}-{}-{}", position, module, name));
  let cache_key = format!("{}-{}-{}", task_id, target.os, target.arch);
  TaskIdentity { task_id, cache_key }
}

/// Lowercase `s` and collapse every run of characters outside `[a-z0-9_]`
/// into a single `-`, trimming separators at both ends.
pub fn slugify(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut prev_sep = false;

  for c in s.chars().flat_map(char::to_lowercase) {
    if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
      out.push(c);
      prev_sep = false;
    } else if !prev_sep {
      out.push('-');
      prev_sep = true;
    }
  }

  out.trim_matches('-').to_string()
}

/// Whether `key` could have been produced by [`identify`].
///
/// Keys read back from a manifest are untrusted; only keys in the slug
/// charset are ever joined onto the output directory.
pub fn is_well_formed_key(key: &str) -> bool {
  !key.is_empty()
    && !key.starts_with('-')
    && key
      .bytes()
      .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}
