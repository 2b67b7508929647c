//! Runs one action against the agent and reduces the reply to an [`Outcome`].
//!
//! Every agent failure is converted here; nothing past this point sees a
//! transport error.

#![allow(missing_docs)]

use serde::Serialize;

use crate::agent::rpc::{AgentClient, AgentMethod, UpdateCall, non_empty};
use crate::core::errors::UbpError;
use crate::panel::gate::ActionRequest;
use crate::panel::notifier::MessageKind;

/// Result of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        message: Option<String>,
        /// Textual report (installer output, version check summary).
        output: Option<String>,
        latest_version: Option<String>,
    },
    Failure {
        message: String,
    },
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: Some(message.into()),
            output: None,
            latest_version: None,
        }
    }
}

/// Notice for a completed version check.
///
/// Versions are compared as plain strings; any difference is "new".
#[must_use]
pub fn version_check_notice(installed: Option<&str>, latest: &str) -> (&'static str, MessageKind) {
    if installed == Some(latest) {
        ("Already up to date", MessageKind::Success)
    } else {
        ("New version available!", MessageKind::Info)
    }
}

const fn failure_fallback(action: ActionRequest) -> &'static str {
    match action {
        ActionRequest::CheckVersion => "Failed to check version",
        ActionRequest::Update => "Update failed",
        ActionRequest::Start => "Failed to start service",
        ActionRequest::Stop => "Failed to stop service",
        ActionRequest::Restart => "Failed to restart service",
    }
}

const fn service_success(action: ActionRequest) -> &'static str {
    match action {
        ActionRequest::Start => "Service started",
        ActionRequest::Stop => "Service stopped",
        _ => "Service restarted",
    }
}

#[derive(Debug, Clone)]
pub struct ActionExecutor {
    client: AgentClient,
    update_call: UpdateCall,
}

impl ActionExecutor {
    #[must_use]
    pub fn new(client: AgentClient, update_call: UpdateCall) -> Self {
        Self {
            client,
            update_call,
        }
    }

    /// Agent method backing `action`.
    #[must_use]
    pub const fn method_for(&self, action: ActionRequest) -> AgentMethod {
        match action {
            ActionRequest::CheckVersion => AgentMethod::CheckVersion,
            ActionRequest::Update => self.update_call.method(),
            ActionRequest::Start => AgentMethod::StartService,
            ActionRequest::Stop => AgentMethod::StopService,
            ActionRequest::Restart => AgentMethod::RestartService,
        }
    }

    /// Issue exactly one agent call for `action`. Blocks until it answers.
    #[must_use]
    pub fn run(&self, action: ActionRequest) -> Outcome {
        let result = match action {
            ActionRequest::CheckVersion => self.check_version(),
            ActionRequest::Update => match self.update_call {
                UpdateCall::Update => self.update(),
                UpdateCall::ExecuteUpdate => self.execute_update(),
            },
            ActionRequest::Start | ActionRequest::Stop | ActionRequest::Restart => {
                self.service(action)
            }
        };
        result.unwrap_or_else(|err| {
            eprintln!("[UBP-PANEL] {} failed: {err}", self.method_for(action));
            Outcome::failure(failure_fallback(action))
        })
    }

    fn check_version(&self) -> Result<Outcome, UbpError> {
        let reply = self.client.check_version()?;
        let latest = non_empty(reply.latest_version.as_deref());
        Ok(match (reply.success, latest) {
            (true, Some(latest)) => Outcome::Success {
                message: None,
                output: Some(format!("Latest version: {latest}")),
                latest_version: Some(latest.to_string()),
            },
            _ => Outcome::failure(
                non_empty(reply.error.as_deref())
                    .unwrap_or(failure_fallback(ActionRequest::CheckVersion)),
            ),
        })
    }

    fn update(&self) -> Result<Outcome, UbpError> {
        let reply = self.client.update()?;
        let message = non_empty(reply.message.as_deref());
        Ok(if reply.success {
            Outcome::success(message.unwrap_or("Update completed successfully"))
        } else {
            Outcome::failure(message.unwrap_or(failure_fallback(ActionRequest::Update)))
        })
    }

    fn execute_update(&self) -> Result<Outcome, UbpError> {
        let reply = self.client.execute_update()?;
        let output = non_empty(reply.output.as_deref()).unwrap_or("No output");
        Ok(Outcome::Success {
            message: Some("Update complete".to_string()),
            output: Some(output.to_string()),
            latest_version: None,
        })
    }

    fn service(&self, action: ActionRequest) -> Result<Outcome, UbpError> {
        let reply = self.client.service(self.method_for(action))?;
        Ok(if reply.failed() {
            Outcome::failure(reply.failure_text().unwrap_or(failure_fallback(action)))
        } else {
            Outcome::success(service_success(action))
        })
    }
}
