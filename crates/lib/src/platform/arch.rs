use std::fmt;
use std::str::FromStr;

/// CPU architectures a task artifact can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  Amd64,
  Arm64,
  I386,
  Arm,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::Amd64),
      "aarch64" => Some(Self::Arm64),
      "x86" => Some(Self::I386),
      "arm" => Some(Self::Arm),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Amd64 => "amd64",
      Self::Arm64 => "arm64",
      Self::I386 => "386",
      Self::Arm => "arm",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "amd64" | "x86_64" => Ok(Self::Amd64),
      "arm64" | "aarch64" => Ok(Self::Arm64),
      "386" | "i386" | "i686" => Ok(Self::I386),
      "arm" | "armv7" => Ok(Self::Arm),
      _ => Err(()),
    }
  }
}

/// Name of the host architecture, falling back to the raw std identifier.
pub fn host_arch_name() -> String {
  Arch::current()
    .map(|arch| arch.as_str().to_string())
    .unwrap_or_else(|| std::env::consts::ARCH.to_string())
}
