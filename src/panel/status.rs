//! Service status snapshot and the source that fetches it.

#![allow(missing_docs)]

use serde::Serialize;

use crate::agent::rpc::{AgentClient, GetStatusReply, LegacyStatusReply, StatusCall, non_empty};
use crate::core::errors::Result;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// Text carried by the fallback status.
pub const UNAVAILABLE_TEXT: &str = "RPC service unavailable";

/// Service state as of one fetch. Immutable once built.
///
/// An unavailable status never carries version, running, or update data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub available: bool,
    pub installed_version: Option<String>,
    pub running: bool,
    pub update_available: bool,
    pub latest_version: Option<String>,
    pub status_text: Option<String>,
}

impl Status {
    /// The status shown when the agent cannot be reached or answers garbage.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            installed_version: None,
            running: false,
            update_available: false,
            latest_version: None,
            status_text: Some(UNAVAILABLE_TEXT.to_string()),
        }
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed_version.is_some()
    }

    /// Fold in the result of a version check.
    ///
    /// Any difference between installed and latest counts as an update; the
    /// agent's own `update_available` flag is never cleared here.
    #[must_use]
    pub fn with_latest_version(&self, latest: &str) -> Self {
        if !self.available {
            return self.clone();
        }
        let differs = self.installed_version.as_deref() != Some(latest);
        Self {
            latest_version: Some(latest.to_string()),
            update_available: self.update_available || differs,
            ..self.clone()
        }
    }

    fn from_get_status(reply: GetStatusReply) -> Self {
        if !reply.available {
            return Self::unavailable();
        }
        Self {
            available: true,
            installed_version: non_empty(reply.installed_version.as_deref()).map(str::to_string),
            running: reply.running_status,
            update_available: reply.update_available,
            latest_version: None,
            status_text: non_empty(reply.status_text.as_deref()).map(str::to_string),
        }
    }

    fn from_legacy(reply: LegacyStatusReply) -> Self {
        let text = non_empty(reply.service_status.as_deref())
            .unwrap_or("Not running")
            .to_string();
        Self {
            available: true,
            installed_version: non_empty(reply.current_version.as_deref()).map(str::to_string),
            running: text_says_running(&text),
            update_available: false,
            latest_version: None,
            status_text: Some(text),
        }
    }
}

/// Free-text service state: "running" counts unless negated.
fn text_says_running(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("running") && !lower.contains("not running") && !lower.contains("stopped")
}

/// Fetches [`Status`] from the agent. Never fails outward.
#[derive(Clone)]
pub struct StatusSource {
    client: AgentClient,
    call: StatusCall,
    log: ActivityLoggerHandle,
}

impl StatusSource {
    #[must_use]
    pub fn new(client: AgentClient, call: StatusCall, log: ActivityLoggerHandle) -> Self {
        Self { client, call, log }
    }

    /// Current status, or [`Status::unavailable`] on any failure. No retries.
    #[must_use]
    pub fn fetch(&self) -> Status {
        match self.try_fetch() {
            Ok(status) => status,
            Err(err) => {
                eprintln!("[UBP-STATUS] {} failed: {err}", self.call.method());
                self.log.send(ActivityEvent::StatusUnavailable {
                    method: self.call.method().name(),
                    error_code: err.code().to_string(),
                    error_message: err.to_string(),
                });
                Status::unavailable()
            }
        }
    }

    /// Fetch without the fallback, for callers that want the error itself.
    pub fn try_fetch(&self) -> Result<Status> {
        match self.call {
            StatusCall::GetStatus => self.client.get_status().map(Status::from_get_status),
            StatusCall::Status => self.client.status().map(Status::from_legacy),
        }
    }
}
