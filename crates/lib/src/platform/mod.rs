pub mod arch;
pub mod os;
pub mod paths;

pub use arch::Arch;
pub use os::Os;
use std::fmt;

/// Target platform of a build, rendered as a conda subdir (e.g., "linux-64").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  /// Create a new platform identifier
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the conda subdir for this platform (e.g., "osx-arm64").
  pub fn subdir(&self) -> String {
    let arch = match (self.os, self.arch) {
      (_, Arch::X86_64) => "64",
      (Os::MacOs, Arch::Aarch64) => "arm64",
      (Os::Windows, Arch::Aarch64) => "arm64",
      (Os::Linux, Arch::Aarch64) => "aarch64",
    };
    format!("{}-{}", self.os, arch)
  }

  /// File extension of constructor installers built for this platform.
  pub fn installer_extension(&self) -> &'static str {
    self.os.installer_extension()
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.subdir())
  }
}

/// Returns the conda subdir for the current system (e.g., "linux-64")
///
/// Returns `None` if the current platform is not supported
pub fn conda_platform() -> Option<String> {
  Platform::current().map(|p| p.subdir())
}
