//! Status probing - Asking Podman whether its machine is running

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use super::command::CommandRunner;
use super::error::{ErrorKind, MonitorError};

/// Arguments for the machine info query
pub const MACHINE_INFO_ARGS: [&str; 4] = ["machine", "info", "--format", "json"];

/// State string that counts as running (compared case-insensitively)
const RUNNING_STATE: &str = "running";

/// Outcome of a single liveness query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// Whether the VM reported itself as running
    pub running: bool,
    /// Raw merged command output
    pub raw: Vec<u8>,
    /// `Host.MachineState` when the output had one
    pub machine_state: Option<String>,
    /// Why no usable answer was obtained
    pub error: Option<ErrorKind>,
}

impl ProbeResult {
    fn failed(raw: Vec<u8>, error: ErrorKind) -> Self {
        Self {
            running: false,
            raw,
            machine_state: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MachineInfo {
    #[serde(rename = "Host")]
    host: HostInfo,
}

#[derive(Debug, Deserialize)]
struct HostInfo {
    #[serde(rename = "MachineState")]
    machine_state: String,
}

/// Extract `Host.MachineState` from `machine info --format json` output
pub fn parse_machine_state(raw: &[u8]) -> Result<String, MonitorError> {
    let info: MachineInfo = serde_json::from_slice(raw)?;
    Ok(info.host.machine_state)
}

pub fn is_running_state(state: &str) -> bool {
    state.eq_ignore_ascii_case(RUNNING_STATE)
}

/// Run one probe. Total: spawn and parse failures both read as "not running".
pub fn probe(runner: &dyn CommandRunner, executable: &Path) -> ProbeResult {
    let output = match runner.run(executable, &MACHINE_INFO_ARGS) {
        Ok(output) => output,
        Err(e) => {
            warn!("Status probe failed: {}", e);
            return ProbeResult::failed(Vec::new(), e.kind());
        }
    };

    match parse_machine_state(&output.output) {
        Ok(state) => {
            let running = is_running_state(&state);
            debug!("Machine state {:?} (running: {})", state, running);
            ProbeResult {
                running,
                raw: output.output,
                machine_state: Some(state),
                error: None,
            }
        }
        Err(e) => {
            debug!(
                "No usable machine info (exit {}): {}",
                output.exit_code, e
            );
            ProbeResult::failed(output.output, e.kind())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::testing::{Reply, ScriptedRunner};

    fn probe_with(reply: Reply) -> ProbeResult {
        let runner = ScriptedRunner::new().reply("machine info", reply);
        probe(&runner, Path::new("/usr/bin/podman"))
    }

    #[test]
    fn running_in_any_case_is_running() {
        for state in ["running", "Running", "RUNNING", "rUnNiNg"] {
            let result = probe_with(Reply::machine_state(state));
            assert!(result.running, "{state} should be running");
            assert_eq!(result.machine_state.as_deref(), Some(state));
            assert_eq!(result.error, None);
        }
    }

    #[test]
    fn other_states_are_not_running() {
        for state in ["starting", "stopped", "", " running", "running!", "unknown"] {
            let result = probe_with(Reply::machine_state(state));
            assert!(!result.running, "{state:?} should not be running");
            assert_eq!(result.error, None);
        }
    }

    #[test]
    fn malformed_output_is_not_running() {
        let cases = [
            "",
            "not json",
            "{",
            "[]",
            "{}",
            r#"{"Host": {}}"#,
            r#"{"Host": null}"#,
            r#"{"Host": {"MachineState": 1}}"#,
            r#"{"host": {"machinestate": "running"}}"#,
            "Error: cannot connect to Podman socket",
        ];
        for raw in cases {
            let result = probe_with(Reply::ok(raw));
            assert!(!result.running, "{raw:?} should not be running");
            assert_eq!(result.error, Some(ErrorKind::ParseFailed));
            assert_eq!(result.raw, raw.as_bytes());
        }
    }

    #[test]
    fn extra_fields_are_ignored() {
        let raw = r#"{"Host": {"Arch": "arm64", "MachineState": "Running", "NumberOfMachines": 1}, "Version": {}}"#;
        assert!(probe_with(Reply::ok(raw)).running);
    }

    #[test]
    fn exit_code_does_not_override_the_json() {
        let raw = r#"{"Host": {"MachineState": "running"}}"#;
        assert!(probe_with(Reply::Output(125, raw.to_string())).running);
    }

    #[test]
    fn spawn_failure_is_not_running() {
        let result = probe_with(Reply::SpawnFailure);
        assert!(!result.running);
        assert_eq!(result.error, Some(ErrorKind::SpawnFailed));
        assert!(result.raw.is_empty());
    }

    #[test]
    fn issues_machine_info_json_query() {
        let runner = ScriptedRunner::new().reply("machine info", Reply::machine_state("running"));
        probe(&runner, Path::new("/usr/bin/podman"));
        assert_eq!(
            runner.calls(),
            vec![vec!["machine", "info", "--format", "json"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()]
        );
    }
}
