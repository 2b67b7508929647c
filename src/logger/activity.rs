//! Activity logger thread: owns the [`JsonlWriter`] and drains events sent
//! from the controller, the poller, and worker threads.
//!
//! Senders use `try_send()` on a bounded crossbeam channel so logging
//! back-pressure never stalls the panel. Dropped events are counted and
//! reported on the next line that does get written.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{Result, UbpError};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

const CHANNEL_CAPACITY: usize = 256;

// ──────────────────── public event type ────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    ConfigLoaded {
        path: String,
        config_hash: String,
    },
    PanelMounted {
        object: String,
        installed_version: Option<String>,
        running: bool,
    },
    PanelUnmounted {
        uptime_secs: u64,
    },
    StatusUnavailable {
        method: &'static str,
        error_code: String,
        error_message: String,
    },
    ActionStarted {
        action: &'static str,
        method: &'static str,
    },
    ActionSucceeded {
        action: &'static str,
        method: &'static str,
        message: String,
        duration_ms: u64,
    },
    ActionFailed {
        action: &'static str,
        method: &'static str,
        message: String,
        duration_ms: u64,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Cheaply cloneable sender side of the activity log.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// A handle whose events go nowhere, for callers that run without a log.
    #[must_use]
    pub fn disabled() -> Self {
        let (tx, _rx) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue an event. Never blocks; a full channel drops the event.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit. Blocks only while the
    /// channel is full.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread.
///
/// The thread runs until [`ActivityLoggerHandle::shutdown`] is called or every
/// handle is dropped.
pub fn spawn_logger(
    config: JsonlConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(CHANNEL_CAPACITY);
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };

    let join = thread::Builder::new()
        .name("ubp-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped))
        .map_err(|e| UbpError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::LogDropped, Severity::Warning);
            warn.details = Some(format!("{d} activity events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if event == ActivityEvent::Shutdown {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
        // The panel logs a handful of events per minute; keep `tail -f` current.
        jsonl.flush();
    }

    jsonl.fsync();
}

// ──────────────────── event conversion ────────────────────

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::ConfigLoaded { path, config_hash } => {
            let mut e = LogEntry::new(EventType::ConfigLoaded, Severity::Info);
            e.details = Some(format!("path={path} config_hash={config_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::PanelMounted {
            object,
            installed_version,
            running,
        } => {
            let mut e = LogEntry::new(EventType::PanelMounted, Severity::Info);
            e.details = Some(format!("object={object}"));
            e.installed_version.clone_from(installed_version);
            e.running = Some(*running);
            e
        }
        ActivityEvent::PanelUnmounted { uptime_secs } => {
            let mut e = LogEntry::new(EventType::PanelUnmounted, Severity::Info);
            e.details = Some(format!("uptime={uptime_secs}s"));
            e
        }
        ActivityEvent::StatusUnavailable {
            method,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::StatusUnavailable, Severity::Warning);
            e.method = Some((*method).to_string());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.details = Some(error_message.clone());
            e
        }
        ActivityEvent::ActionStarted { action, method } => {
            let mut e = LogEntry::new(EventType::ActionStarted, Severity::Info);
            e.action = Some((*action).to_string());
            e.method = Some((*method).to_string());
            e
        }
        ActivityEvent::ActionSucceeded {
            action,
            method,
            message,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::ActionSucceeded, Severity::Info);
            e.action = Some((*action).to_string());
            e.method = Some((*method).to_string());
            e.message = Some(message.clone());
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::ActionFailed {
            action,
            method,
            message,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::ActionFailed, Severity::Error);
            e.action = Some((*action).to_string());
            e.method = Some((*method).to_string());
            e.message = Some(message.clone());
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::PanelUnmounted, Severity::Info),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn logger_thread_writes_and_exits_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let config = JsonlConfig {
            path: path.clone(),
            fallback_path: None,
            ..JsonlConfig::default()
        };
        let (handle, join) = spawn_logger(config).unwrap();

        handle.send(ActivityEvent::ActionStarted {
            action: "restart",
            method: "restart_service",
        });
        handle.send(ActivityEvent::ActionFailed {
            action: "restart",
            method: "restart_service",
            message: "Failed to restart service".into(),
            duration_ms: 12,
        });
        handle.shutdown();
        join.join().unwrap();

        let lines: Vec<serde_json::Value> = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["event"], "action_failed");
        assert_eq!(lines[1]["severity"], "error");
        assert_eq!(lines[1]["ok"], false);
        assert_eq!(lines[1]["message"], "Failed to restart service");
    }

    #[test]
    fn disabled_handle_swallows_events() {
        let handle = ActivityLoggerHandle::disabled();
        handle.send(ActivityEvent::PanelUnmounted { uptime_secs: 1 });
        handle.shutdown();
        assert_eq!(handle.dropped_events(), 0);
    }

    #[test]
    fn status_unavailable_maps_to_warning() {
        let entry = event_to_log_entry(&ActivityEvent::StatusUnavailable {
            method: "get_status",
            error_code: "UBP-2001".into(),
            error_message: "timeout".into(),
        });
        assert_eq!(entry.event, EventType::StatusUnavailable);
        assert_eq!(entry.severity, Severity::Warning);
        assert_eq!(entry.error_code.as_deref(), Some("UBP-2001"));
    }
}
