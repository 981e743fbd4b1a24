//! Executable resolution - Finding the Podman binary once at startup

use std::path::PathBuf;

use tracing::{info, warn};

use super::command::CommandRunner;
use super::error::MonitorError;
use super::settings::Settings;

/// Resolves the absolute path of the runtime executable via a `which`-style lookup
#[derive(Debug, Clone)]
pub struct ExecutableLocator {
    /// Path-resolution utility
    lookup_program: PathBuf,
    /// Binary name passed as the single argument
    binary_name: String,
    /// Returned whenever the lookup yields nothing usable
    fallback: PathBuf,
}

impl ExecutableLocator {
    pub fn new(
        lookup_program: impl Into<PathBuf>,
        binary_name: impl Into<String>,
        fallback: impl Into<PathBuf>,
    ) -> Self {
        Self {
            lookup_program: lookup_program.into(),
            binary_name: binary_name.into(),
            fallback: fallback.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.lookup_program.clone(),
            settings.binary_name.clone(),
            settings.fallback_path.clone(),
        )
    }

    pub fn fallback(&self) -> &PathBuf {
        &self.fallback
    }

    /// Resolve the executable path. Never fails: any lookup problem yields the
    /// fallback, which may still be correct on this machine.
    pub fn resolve(&self, runner: &dyn CommandRunner) -> PathBuf {
        match self.lookup(runner) {
            Ok(path) => {
                info!("Using {} at {}", self.binary_name, path.display());
                path
            }
            Err(e) => {
                warn!("{}; falling back to {}", e, self.fallback.display());
                self.fallback.clone()
            }
        }
    }

    fn lookup(&self, runner: &dyn CommandRunner) -> Result<PathBuf, MonitorError> {
        let output = runner
            .run(&self.lookup_program, &[self.binary_name.as_str()])
            .map_err(|e| MonitorError::ResolveFailed {
                name: self.binary_name.clone(),
                reason: e.to_string(),
            })?;

        if !output.success() {
            return Err(MonitorError::ResolveFailed {
                name: self.binary_name.clone(),
                reason: format!(
                    "{} exited with {}",
                    self.lookup_program.display(),
                    output.exit_code
                ),
            });
        }

        // `where` lists every match, one per line; the first one wins
        output
            .text()
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| MonitorError::ResolveFailed {
                name: self.binary_name.clone(),
                reason: "lookup printed nothing".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::testing::{Reply, ScriptedRunner};

    fn locator() -> ExecutableLocator {
        ExecutableLocator::new("/usr/bin/which", "podman", "/opt/homebrew/bin/podman")
    }

    #[test]
    fn trims_lookup_output() {
        let runner = ScriptedRunner::new().reply("podman", Reply::ok("  /usr/local/bin/podman\n"));
        assert_eq!(
            locator().resolve(&runner),
            PathBuf::from("/usr/local/bin/podman")
        );
        assert_eq!(runner.calls(), vec![vec!["podman".to_string()]]);
    }

    #[test]
    fn takes_first_line_of_multiple_matches() {
        let runner = ScriptedRunner::new().reply(
            "podman",
            Reply::ok("\r\nC:\\a\\podman.exe\r\nC:\\b\\podman.exe\r\n"),
        );
        assert_eq!(locator().resolve(&runner), PathBuf::from("C:\\a\\podman.exe"));
    }

    #[test]
    fn empty_output_falls_back() {
        let runner = ScriptedRunner::new().reply("podman", Reply::ok(" \n\n"));
        assert_eq!(locator().resolve(&runner), *locator().fallback());
    }

    #[test]
    fn spawn_failure_falls_back() {
        let runner = ScriptedRunner::new().reply("podman", Reply::SpawnFailure);
        assert_eq!(
            locator().resolve(&runner),
            PathBuf::from("/opt/homebrew/bin/podman")
        );
    }

    #[test]
    fn nonzero_exit_falls_back() {
        // stderr is merged in, so a "not found" message must not become the path
        let runner = ScriptedRunner::new().reply(
            "podman",
            Reply::Output(1, "which: no podman in (/usr/bin:/bin)\n".to_string()),
        );
        assert_eq!(
            locator().resolve(&runner),
            PathBuf::from("/opt/homebrew/bin/podman")
        );
    }
}
