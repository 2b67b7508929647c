//! Which controls a status permits.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::panel::status::Status;

/// User-triggerable actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRequest {
    CheckVersion,
    Update,
    Start,
    Stop,
    Restart,
}

impl ActionRequest {
    pub const ALL: [Self; 5] = [
        Self::CheckVersion,
        Self::Update,
        Self::Start,
        Self::Stop,
        Self::Restart,
    ];

    /// Stable identifier used in logs and JSON output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CheckVersion => "check_version",
            Self::Update => "update",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }

    /// Control caption while idle.
    #[must_use]
    pub const fn caption(self) -> &'static str {
        match self {
            Self::CheckVersion => "Check Version",
            Self::Update => "Update",
            Self::Start => "Start",
            Self::Stop => "Stop",
            Self::Restart => "Restart",
        }
    }

    /// Control caption while in flight.
    #[must_use]
    pub const fn progress_caption(self) -> &'static str {
        match self {
            Self::CheckVersion => "Checking...",
            Self::Update => "Updating...",
            Self::Start => "Starting...",
            Self::Stop => "Stopping...",
            Self::Restart => "Restarting...",
        }
    }

    /// Actions that change the installed service.
    #[must_use]
    pub const fn mutates_service(self) -> bool {
        !matches!(self, Self::CheckVersion)
    }

    /// Stable index into per-action tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::CheckVersion => 0,
            Self::Update => 1,
            Self::Start => 2,
            Self::Stop => 3,
            Self::Restart => 4,
        }
    }
}

impl fmt::Display for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the Update control is gated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityPolicy {
    /// Update only when the agent (or a version check) reports one.
    #[default]
    Strict,
    /// Update also offered whenever the service is stopped.
    Legacy,
}

/// Permitted actions for one status. Derived on demand, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionAvailability {
    pub check_version: bool,
    pub update: bool,
    pub start: bool,
    pub stop: bool,
    pub restart: bool,
}

impl ActionAvailability {
    #[must_use]
    pub const fn allows(self, action: ActionRequest) -> bool {
        match action {
            ActionRequest::CheckVersion => self.check_version,
            ActionRequest::Update => self.update,
            ActionRequest::Start => self.start,
            ActionRequest::Stop => self.stop,
            ActionRequest::Restart => self.restart,
        }
    }
}

/// Pure, total mapping from status to permitted actions.
#[must_use]
pub fn derive(status: &Status, policy: AvailabilityPolicy) -> ActionAvailability {
    if !status.available {
        return ActionAvailability::default();
    }
    let update = match policy {
        AvailabilityPolicy::Strict => status.update_available,
        AvailabilityPolicy::Legacy => status.update_available || !status.running,
    };
    ActionAvailability {
        check_version: true,
        update,
        start: !status.running,
        stop: status.running,
        restart: status.running,
    }
}
