use std::fmt;

/// Operating system variants a build can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the conda subdir prefix for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "osx",
      Self::Windows => "win",
    }
  }

  /// Installers for Windows-class targets are executables, everything else a shell script.
  pub fn installer_extension(&self) -> &'static str {
    match self {
      Self::Windows => "exe",
      Self::Linux | Self::MacOs => "sh",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn current_returns_supported_os() {
    assert!(Os::current().is_some(), "Current OS should be supported");
  }

  #[test]
  fn windows_gets_exe_installers() {
    assert_eq!(Os::Windows.installer_extension(), "exe");
    assert_eq!(Os::Linux.installer_extension(), "sh");
    assert_eq!(Os::MacOs.installer_extension(), "sh");
  }
}
