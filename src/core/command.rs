//! Command execution - Running the Podman CLI and capturing its output

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use super::error::MonitorError;

/// Exit status and merged stdout/stderr of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `-1` when the process was terminated by a signal
    pub exit_code: i32,
    /// stdout followed by stderr
    pub output: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Captured output as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Runs an external executable to completion.
///
/// Implementations block the calling thread; async callers move the call onto
/// the blocking pool. A nonzero exit is a normal result, only a failure to
/// launch is an error. Exactly one attempt is made.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &Path, args: &[&str]) -> Result<CommandOutput, MonitorError>;
}

/// [`CommandRunner`] backed by `std::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &Path, args: &[&str]) -> Result<CommandOutput, MonitorError> {
        trace!("Running {} {}", program.display(), args.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| MonitorError::SpawnFailed {
                program: program.to_path_buf(),
                source,
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let mut merged = output.stdout;
        merged.extend_from_slice(&output.stderr);

        debug!(
            "{} {} exited with {} ({} bytes)",
            program.display(),
            args.join(" "),
            exit_code,
            merged.len()
        );

        Ok(CommandOutput {
            exit_code,
            output: merged,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_executable_is_a_spawn_failure() {
        let err = SystemCommandRunner
            .run(Path::new("/nonexistent/podman-status-bar-test"), &["--version"])
            .unwrap_err();
        assert_eq!(err.kind(), crate::core::error::ErrorKind::SpawnFailed);
    }

    #[cfg(unix)]
    #[test]
    fn merges_stdout_and_stderr() {
        let out = SystemCommandRunner
            .run(Path::new("/bin/sh"), &["-c", "echo out; echo err 1>&2"])
            .unwrap();
        assert!(out.success());
        assert_eq!(out.text(), "out\nerr\n");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_not_an_error() {
        let out = SystemCommandRunner
            .run(Path::new("/bin/sh"), &["-c", "exit 3"])
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(out.output.is_empty());
    }
}
