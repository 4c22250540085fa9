//! Build target platforms.
//!
//! A [`BuildTarget`] is the `(os, arch)` pair every task artifact of one run is
//! built for. It is kept as the strings the user supplied so an unsupported
//! pair still yields a cache key; resolving it to a compiler target triple
//! happens in [`BuildTarget::rust_triple`] and fails per task, not per run.

pub mod arch;
pub mod os;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use arch::{Arch, host_arch_name};
use os::{Os, host_os_name};

/// Error parsing an `os/arch` target string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetParseError {
  #[error("target OS is empty in {0:?} (expected \"os/arch\")")]
  EmptyOs(String),

  #[error("target architecture is empty in {0:?} (expected \"os/arch\")")]
  EmptyArch(String),

  #[error("invalid target component {part:?} in {input:?} (only a-z, 0-9 and _ are allowed)")]
  InvalidComponent { input: String, part: String },
}

/// Operating-system/architecture pair artifacts are built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildTarget {
  pub os: String,
  pub arch: String,
}

impl BuildTarget {
  pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
    Self {
      os: os.into(),
      arch: arch.into(),
    }
  }

  /// The platform this process runs on.
  pub fn host() -> Self {
    Self::new(host_os_name(), host_arch_name())
  }

  /// Returns the `os/arch` string (e.g., "linux/amd64")
  pub fn pair(&self) -> String {
    format!("{}/{}", self.os, self.arch)
  }

  /// Resolve to a Rust compiler target triple.
  ///
  /// Returns `None` for pairs there is no known triple for.
  pub fn rust_triple(&self) -> Option<&'static str> {
    let os = self.os.parse::<Os>().ok()?;
    let arch = self.arch.parse::<Arch>().ok()?;
    let triple = match (os, arch) {
      (Os::Linux, Arch::Amd64) => "x86_64-unknown-linux-gnu",
      (Os::Linux, Arch::Arm64) => "aarch64-unknown-linux-gnu",
      (Os::Linux, Arch::I386) => "i686-unknown-linux-gnu",
      (Os::Linux, Arch::Arm) => "armv7-unknown-linux-gnueabihf",
      (Os::Darwin, Arch::Amd64) => "x86_64-apple-darwin",
      (Os::Darwin, Arch::Arm64) => "aarch64-apple-darwin",
      (Os::Windows, Arch::Amd64) => "x86_64-pc-windows-msvc",
      (Os::Windows, Arch::Arm64) => "aarch64-pc-windows-msvc",
      (Os::Windows, Arch::I386) => "i686-pc-windows-msvc",
      (Os::FreeBsd, Arch::Amd64) => "x86_64-unknown-freebsd",
      (Os::FreeBsd, Arch::I386) => "i686-unknown-freebsd",
      _ => return None,
    };
    Some(triple)
  }

  /// Executable suffix for artifacts of this target.
  pub fn exe_suffix(&self) -> &'static str {
    self.os.parse::<Os>().map(|os| os.exe_suffix()).unwrap_or("")
  }
}

impl Default for BuildTarget {
  fn default() -> Self {
    Self::host()
  }
}

impl fmt::Display for BuildTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.pair())
  }
}

impl FromStr for BuildTarget {
  type Err = TargetParseError;

  /// Parse `os/arch`. A missing `/arch` part defaults to the host architecture.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    let (os, arch) = match s.split_once('/') {
      Some((os, arch)) => (os.trim(), arch.trim().to_string()),
      None => (s, host_arch_name()),
    };

    if os.is_empty() {
      return Err(TargetParseError::EmptyOs(s.to_string()));
    }
    if arch.is_empty() {
      return Err(TargetParseError::EmptyArch(s.to_string()));
    }

    let (os, arch) = (os.to_lowercase(), arch.to_lowercase());
    // Both parts end up in cache keys, which name files in the output directory.
    for part in [&os, &arch] {
      if !part.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_') {
        return Err(TargetParseError::InvalidComponent {
          input: s.to_string(),
          part: part.clone(),
        });
      }
    }

    Ok(Self::new(os, arch))
  }
}
