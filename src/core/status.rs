//! Observable VM state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running state of the Podman machine as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RuntimeState {
    /// No probe has completed yet
    #[default]
    Unknown,
    /// Machine is down, or no usable answer was obtained
    Stopped,
    /// Machine reports running but has not yet held that long enough
    StartingUp,
    /// Machine is running and ready for container queries
    Running,
}

impl RuntimeState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Stopped => "Stopped",
            Self::StartingUp => "Starting",
            Self::Running => "Running",
        }
    }

    /// Text for the status item tooltip
    pub fn tooltip(&self) -> &'static str {
        match self {
            Self::Unknown => "Podman VM: checking",
            Self::Stopped => "Podman VM: not active",
            Self::StartingUp => "Podman VM: starting",
            Self::Running => "Podman VM: active",
        }
    }
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Current state as published to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub state: RuntimeState,
    /// When `state` was entered
    pub since: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn new(state: RuntimeState) -> Self {
        Self {
            state,
            since: Utc::now(),
        }
    }
}

/// One state change, emitted only when the state actually differs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub from: RuntimeState,
    pub to: RuntimeState,
    pub at: DateTime<Utc>,
}
