//! Platform-specific defaults for locating the Podman executable

use std::path::PathBuf;

/// Well-known install location used when the PATH lookup yields nothing
pub fn default_executable_path() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // Homebrew on Apple silicon
        PathBuf::from("/opt/homebrew/bin/podman")
    }
    #[cfg(windows)]
    {
        PathBuf::from(r"C:\Program Files\RedHat\Podman\podman.exe")
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        PathBuf::from("/usr/bin/podman")
    }
}

/// Utility that resolves a binary name against PATH
pub fn lookup_program() -> PathBuf {
    #[cfg(windows)]
    {
        PathBuf::from("where")
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/usr/bin/which")
    }
}
