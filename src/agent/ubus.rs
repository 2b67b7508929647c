//! ubus transport: drives `ubus call <object> <method>` and parses the JSON it prints.
//!
//! rpcd exposes the booster agent as a ubus object, so this is the same path
//! LuCI's `rpc.declare` ends up on, minus the HTTP session layer.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde_json::Value;

use crate::agent::rpc::{AgentMethod, AgentTransport};
use crate::core::config::AgentConfig;
use crate::core::errors::{Result, UbpError};

/// [`AgentTransport`] that shells out to the ubus CLI.
#[derive(Debug, Clone)]
pub struct UbusTransport {
    bin: PathBuf,
    object: String,
    timeout: Duration,
}

impl UbusTransport {
    /// Create a transport for `object` using the given ubus binary.
    #[must_use]
    pub fn new(bin: impl Into<PathBuf>, object: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            object: object.into(),
            timeout,
        }
    }

    /// Build a transport from the `[agent]` config section.
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.ubus_bin.clone(), config.object.clone(), config.timeout())
    }

    /// Object name this transport addresses.
    #[must_use]
    pub fn object(&self) -> &str {
        &self.object
    }

    fn call_args(&self, method: AgentMethod) -> Vec<String> {
        // ubus wants whole seconds; never hand it 0 (which means "no timeout").
        let secs = self.timeout.as_secs().max(1);
        vec![
            "-t".to_string(),
            secs.to_string(),
            "call".to_string(),
            self.object.clone(),
            method.name().to_string(),
        ]
    }
}

impl AgentTransport for UbusTransport {
    fn call(&self, method: AgentMethod) -> Result<Value> {
        let args = self.call_args(method);
        let output = Command::new(&self.bin)
            .args(&args)
            .output()
            .map_err(|source| UbpError::AgentTransport {
                method: method.name(),
                details: format!("failed to run {}: {source}", self.bin.display()),
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(UbpError::AgentTransport {
                method: method.name(),
                details: format!(
                    "ubus {} exited {code} ({}): {}",
                    args.join(" "),
                    describe_exit(code),
                    stderr.trim()
                ),
            });
        }

        parse_reply(method, &String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse ubus stdout. Calls that return nothing print nothing.
fn parse_reply(method: AgentMethod, stdout: &str) -> Result<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(trimmed).map_err(|e| UbpError::AgentReply {
        method: method.name(),
        details: e.to_string(),
    })
}

/// Human label for libubus status codes (`UBUS_STATUS_*`), which the CLI
/// returns as its exit code.
fn describe_exit(code: i32) -> &'static str {
    match code {
        1 => "invalid command",
        2 => "invalid argument",
        3 => "method not found",
        4 => "object not found",
        5 => "no data",
        6 => "permission denied",
        7 => "timeout",
        8 => "not supported",
        9 => "unknown error",
        10 => "connection failed",
        _ => "unexpected exit",
    }
}
