//! Worker lifecycle states.

use std::fmt;

use serde::Serialize;

/// Lifecycle state of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Created, install not started
    Parsed,
    Installing,
    /// Installed and waiting to activate
    Installed,
    Activating,
    /// Handling fetches
    Activated,
    /// Failed to install or replaced; never handles fetches again
    Redundant,
}

impl WorkerState {
    /// Returns true if moving from `self` to `next` is a legal step.
    ///
    /// Any state may become redundant; otherwise states only advance in order.
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installed, Activating)
                | (Activating, Activated)
        ) || (next == Redundant && self != Redundant)
    }

    /// Returns true if the worker intercepts fetches in this state.
    pub fn handles_fetches(self) -> bool {
        self == WorkerState::Activated
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}
