//! In-memory scripted agent for deterministic tests and offline demos.
//!
//! Each method has an optional default reply and a FIFO of one-shot replies.
//! Calls can be held open with a [`CallGate`] to observe in-flight behavior.

use std::collections::{HashMap, VecDeque};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::agent::rpc::{AgentMethod, AgentTransport};
use crate::core::errors::{Result, UbpError};

type Reply = std::result::Result<Value, String>;

#[derive(Default)]
struct Script {
    defaults: HashMap<AgentMethod, Reply>,
    queued: HashMap<AgentMethod, VecDeque<Reply>>,
    gates: HashMap<AgentMethod, Receiver<()>>,
    log: Vec<AgentMethod>,
}

/// Scripted [`AgentTransport`].
#[derive(Default)]
pub struct ScriptedAgent {
    script: Mutex<Script>,
}

/// Holds calls to one method open until released or dropped.
#[derive(Debug)]
pub struct CallGate {
    _tx: Sender<()>,
}

impl CallGate {
    /// Let every held and future call through.
    pub fn release(self) {}
}

impl ScriptedAgent {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Agent that answers `get_status` with a healthy installation and
    /// accepts every service call.
    #[must_use]
    pub fn healthy(installed: &str, running: bool, update_available: bool) -> Self {
        let agent = Self::new();
        agent.respond(
            AgentMethod::GetStatus,
            json!({
                "available": true,
                "installed_version": installed,
                "running_status": u8::from(running),
                "update_available": update_available,
            }),
        );
        for method in [
            AgentMethod::StartService,
            AgentMethod::StopService,
            AgentMethod::RestartService,
        ] {
            agent.respond(method, json!({}));
        }
        agent
    }

    /// Set the reply used whenever no one-shot reply is queued.
    pub fn respond(&self, method: AgentMethod, reply: Value) {
        self.script.lock().defaults.insert(method, Ok(reply));
    }

    /// Make `method` fail at the transport level by default.
    pub fn fail(&self, method: AgentMethod, details: &str) {
        self.script
            .lock()
            .defaults
            .insert(method, Err(details.to_string()));
    }

    /// Queue a reply consumed by the next call only.
    pub fn push_reply(&self, method: AgentMethod, reply: Value) {
        self.script
            .lock()
            .queued
            .entry(method)
            .or_default()
            .push_back(Ok(reply));
    }

    /// Queue a transport failure consumed by the next call only.
    pub fn push_failure(&self, method: AgentMethod, details: &str) {
        self.script
            .lock()
            .queued
            .entry(method)
            .or_default()
            .push_back(Err(details.to_string()));
    }

    /// Block calls to `method` until the returned gate is released.
    #[must_use]
    pub fn hold(&self, method: AgentMethod) -> CallGate {
        let (tx, rx) = bounded::<()>(0);
        self.script.lock().gates.insert(method, rx);
        CallGate { _tx: tx }
    }

    /// Number of calls made to `method` so far (including held ones).
    #[must_use]
    pub fn calls(&self, method: AgentMethod) -> usize {
        self.script.lock().log.iter().filter(|m| **m == method).count()
    }

    /// Every call in arrival order.
    #[must_use]
    pub fn call_log(&self) -> Vec<AgentMethod> {
        self.script.lock().log.clone()
    }

    /// Poll until `method` has been called at least `n` times.
    pub fn wait_for_calls(&self, method: AgentMethod, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.calls(method) >= n {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        self.calls(method) >= n
    }
}

impl AgentTransport for ScriptedAgent {
    fn call(&self, method: AgentMethod) -> Result<Value> {
        let gate = {
            let mut script = self.script.lock();
            script.log.push(method);
            script.gates.get(&method).cloned()
        };
        if let Some(rx) = gate {
            // Returns once the gate's sender is dropped.
            let _ = rx.recv();
        }

        let reply = {
            let mut script = self.script.lock();
            let queued = script.queued.get_mut(&method).and_then(VecDeque::pop_front);
            queued.or_else(|| script.defaults.get(&method).cloned())
        };

        match reply {
            Some(Ok(value)) => Ok(value),
            Some(Err(details)) => Err(UbpError::AgentTransport {
                method: method.name(),
                details,
            }),
            None => Err(UbpError::AgentTransport {
                method: method.name(),
                details: "no scripted reply".to_string(),
            }),
        }
    }
}
