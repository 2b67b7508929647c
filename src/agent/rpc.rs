//! Wire contract for the booster agent's ubus calls.
//!
//! Every call takes no parameters and answers with a JSON object. The
//! [`AgentTransport`] seam moves raw JSON; [`AgentClient`] decodes it into the
//! typed replies below. Decoding is lenient about field presence because the
//! agent scripts on different firmware builds omit fields freely.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::{Result, UbpError};

/// Remote methods exposed by the agent object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMethod {
    Status,
    CheckVersion,
    Update,
    GetStatus,
    ExecuteUpdate,
    StartService,
    StopService,
    RestartService,
}

impl AgentMethod {
    /// Every method, in wire-table order.
    pub const ALL: [Self; 8] = [
        Self::Status,
        Self::CheckVersion,
        Self::Update,
        Self::GetStatus,
        Self::ExecuteUpdate,
        Self::StartService,
        Self::StopService,
        Self::RestartService,
    ];

    /// Method name as it appears on the bus.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::CheckVersion => "check_version",
            Self::Update => "update",
            Self::GetStatus => "get_status",
            Self::ExecuteUpdate => "execute_update",
            Self::StartService => "start_service",
            Self::StopService => "stop_service",
            Self::RestartService => "restart_service",
        }
    }
}

impl fmt::Display for AgentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which status dialect the panel queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCall {
    /// Structured `get_status` reply.
    #[default]
    GetStatus,
    /// Older `status` reply with a free-text service state.
    Status,
}

impl StatusCall {
    #[must_use]
    pub const fn method(self) -> AgentMethod {
        match self {
            Self::GetStatus => AgentMethod::GetStatus,
            Self::Status => AgentMethod::Status,
        }
    }
}

/// Which call applies an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateCall {
    /// `update`: answers `success` + `message`.
    #[default]
    Update,
    /// `execute_update`: answers the installer's text log.
    ExecuteUpdate,
}

impl UpdateCall {
    #[must_use]
    pub const fn method(self) -> AgentMethod {
        match self {
            Self::Update => AgentMethod::Update,
            Self::ExecuteUpdate => AgentMethod::ExecuteUpdate,
        }
    }
}

/// Raw request/response seam to the agent.
///
/// Implementations block until the agent answers or the transport gives up.
/// An `Ok` value is whatever JSON the agent produced; application-level
/// failures (`success: false`) are still `Ok` at this layer.
pub trait AgentTransport: Send + Sync {
    fn call(&self, method: AgentMethod) -> Result<Value>;
}

// ──────────────────── replies ────────────────────

/// `get_status` reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GetStatusReply {
    #[serde(deserialize_with = "lenient_flag")]
    pub available: bool,
    pub installed_version: Option<String>,
    #[serde(deserialize_with = "lenient_flag")]
    pub running_status: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub update_available: bool,
    pub status_text: Option<String>,
}

impl Default for GetStatusReply {
    // A reply that omits `available` still came from a live agent.
    fn default() -> Self {
        Self {
            available: true,
            installed_version: None,
            running_status: false,
            update_available: false,
            status_text: None,
        }
    }
}

/// `status` reply (older panel).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LegacyStatusReply {
    pub current_version: Option<String>,
    pub service_status: Option<String>,
}

/// `check_version` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CheckVersionReply {
    #[serde(deserialize_with = "lenient_flag")]
    pub success: bool,
    pub latest_version: Option<String>,
    pub error: Option<String>,
}

/// `update` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdateReply {
    #[serde(deserialize_with = "lenient_flag")]
    pub success: bool,
    pub message: Option<String>,
}

/// `execute_update` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecuteUpdateReply {
    pub output: Option<String>,
}

/// `start_service` / `stop_service` / `restart_service` reply.
///
/// The agent defines no success field for these; only an explicit
/// `success: false` counts as a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceReply {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ServiceReply {
    #[must_use]
    pub fn failed(&self) -> bool {
        self.success == Some(false)
    }

    /// Agent-supplied failure text, preferring `message` over `error`.
    #[must_use]
    pub fn failure_text(&self) -> Option<&str> {
        non_empty(self.message.as_deref()).or_else(|| non_empty(self.error.as_deref()))
    }
}

/// Treat `Some("")` and whitespace-only strings as absent.
#[must_use]
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Accepts `true`/`false`, `0`/`1` (any non-zero number), and the string
/// spellings shell scripts tend to emit.
fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v.abs() > 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "running" => Ok(true),
            "" | "0" | "false" | "no" | "stopped" => Ok(false),
            other => Err(de::Error::custom(format!("not a flag: {other:?}"))),
        },
        other => Err(de::Error::custom(format!("not a flag: {other}"))),
    }
}

// ──────────────────── typed client ────────────────────

/// Typed view over an [`AgentTransport`].
#[derive(Clone)]
pub struct AgentClient {
    transport: Arc<dyn AgentTransport>,
}

impl fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentClient").finish_non_exhaustive()
    }
}

impl AgentClient {
    #[must_use]
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self { transport }
    }

    pub fn status(&self) -> Result<LegacyStatusReply> {
        self.call_typed(AgentMethod::Status)
    }

    pub fn get_status(&self) -> Result<GetStatusReply> {
        self.call_typed(AgentMethod::GetStatus)
    }

    pub fn check_version(&self) -> Result<CheckVersionReply> {
        self.call_typed(AgentMethod::CheckVersion)
    }

    pub fn update(&self) -> Result<UpdateReply> {
        self.call_typed(AgentMethod::Update)
    }

    pub fn execute_update(&self) -> Result<ExecuteUpdateReply> {
        self.call_typed(AgentMethod::ExecuteUpdate)
    }

    /// Start, stop, or restart; `method` must be one of the three service calls.
    pub fn service(&self, method: AgentMethod) -> Result<ServiceReply> {
        debug_assert!(matches!(
            method,
            AgentMethod::StartService | AgentMethod::StopService | AgentMethod::RestartService
        ));
        self.call_typed(method)
    }

    fn call_typed<T: DeserializeOwned>(&self, method: AgentMethod) -> Result<T> {
        let value = match self.transport.call(method)? {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };
        serde_json::from_value(value).map_err(|e| UbpError::AgentReply {
            method: method.name(),
            details: e.to_string(),
        })
    }
}
