//! Container enumeration - Names of the containers currently running

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use super::command::CommandRunner;

/// Arguments for the name-only listing of running containers
pub const LIST_RUNNING_ARGS: [&str; 3] = ["ps", "--format", "{{.Names}}"];

/// A non-empty, trimmed container name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ContainerName(String);

impl ContainerName {
    /// Trim `raw`; `None` when nothing is left
    pub fn new(raw: &str) -> Option<Self> {
        let name = raw.trim();
        (!name.is_empty()).then(|| Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split listing output into names, keeping order and duplicates
pub fn parse_container_names(output: &str) -> Vec<ContainerName> {
    output.lines().filter_map(ContainerName::new).collect()
}

/// List running containers. "Couldn't ask" and "no containers" both come back empty.
pub fn list_containers(runner: &dyn CommandRunner, executable: &Path) -> Vec<ContainerName> {
    let output = match runner.run(executable, &LIST_RUNNING_ARGS) {
        Ok(output) => output,
        Err(e) => {
            warn!("Error in container search: {}", e);
            return Vec::new();
        }
    };

    // stderr is merged in, so a failed listing would otherwise read as names
    if !output.success() {
        debug!(
            "Container listing exited with {}: {}",
            output.exit_code,
            output.text().trim()
        );
        return Vec::new();
    }

    match std::str::from_utf8(&output.output) {
        Ok(text) => parse_container_names(text),
        Err(e) => {
            debug!("Container listing is not valid UTF-8: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::testing::{Reply, ScriptedRunner};
    use crate::core::command::CommandOutput;
    use crate::core::error::MonitorError;

    fn names(list: &[ContainerName]) -> Vec<&str> {
        list.iter().map(ContainerName::as_str).collect()
    }

    #[test]
    fn drops_blank_lines_and_keeps_order() {
        let parsed = parse_container_names("web\n\ndb\n  \napi\n");
        assert_eq!(names(&parsed), ["web", "db", "api"]);
    }

    #[test]
    fn keeps_duplicates_and_trims() {
        let parsed = parse_container_names("  web \r\nweb\n\tdb\t");
        assert_eq!(names(&parsed), ["web", "web", "db"]);
    }

    #[test]
    fn container_name_rejects_blank() {
        assert_eq!(ContainerName::new("   \t"), None);
        assert_eq!(ContainerName::new(" x ").unwrap().to_string(), "x");
    }

    #[test]
    fn lists_through_runner() {
        let runner = ScriptedRunner::new().reply("ps", Reply::ok("web\n\ndb\n  \napi\n"));
        let listed = list_containers(&runner, Path::new("/usr/bin/podman"));
        assert_eq!(names(&listed), ["web", "db", "api"]);
        assert_eq!(
            runner.calls(),
            vec![vec![
                "ps".to_string(),
                "--format".to_string(),
                "{{.Names}}".to_string()
            ]]
        );
    }

    #[test]
    fn spawn_failure_is_empty() {
        let runner = ScriptedRunner::new().reply("ps", Reply::SpawnFailure);
        assert!(list_containers(&runner, Path::new("/usr/bin/podman")).is_empty());
    }

    #[test]
    fn failed_listing_is_empty() {
        let runner = ScriptedRunner::new().reply(
            "ps",
            Reply::Output(125, "Error: unable to connect to Podman socket\n".to_string()),
        );
        assert!(list_containers(&runner, Path::new("/usr/bin/podman")).is_empty());
    }

    struct BinaryRunner;

    impl CommandRunner for BinaryRunner {
        fn run(&self, _: &Path, _: &[&str]) -> Result<CommandOutput, MonitorError> {
            Ok(CommandOutput {
                exit_code: 0,
                output: vec![b'w', 0xff, 0xfe, b'\n'],
            })
        }
    }

    #[test]
    fn non_utf8_output_is_empty() {
        assert!(list_containers(&BinaryRunner, Path::new("/usr/bin/podman")).is_empty());
    }
}
