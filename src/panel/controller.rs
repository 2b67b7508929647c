//! View controller: owns the model, the message channel, the poll handle and
//! the notice timers, and executes the commands `update()` returns.
//!
//! All model mutation happens on the thread that owns the controller. Agent
//! calls run on short-lived worker threads that post their results back over
//! a bounded crossbeam channel.

#![allow(missing_docs)]

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::agent::rpc::AgentClient;
use crate::core::config::Config;
use crate::core::errors::Result;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::panel::executor::{ActionExecutor, Outcome};
use crate::panel::gate::ActionRequest;
use crate::panel::model::{ControlState, PanelCmd, PanelModel, PanelMsg};
use crate::panel::poll::{PollHandle, PollScheduler};
use crate::panel::status::{Status, StatusSource};
use crate::panel::update::update;
use crate::panel::view::{self, PanelView};

const CHANNEL_CAPACITY: usize = 64;

pub struct ViewController {
    model: PanelModel,
    source: StatusSource,
    executor: ActionExecutor,
    tx: Sender<PanelMsg>,
    rx: Receiver<PanelMsg>,
    poll: Option<PollHandle>,
    poll_interval: Duration,
    timers: Vec<(Instant, PanelMsg)>,
    log: ActivityLoggerHandle,
    object: String,
    mounted_at: Option<Instant>,
}

impl ViewController {
    #[must_use]
    pub fn new(client: AgentClient, config: &Config, log: ActivityLoggerHandle) -> Self {
        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        Self {
            model: PanelModel::from_config(&config.panel),
            source: StatusSource::new(client.clone(), config.agent.status_call, log.clone()),
            executor: ActionExecutor::new(client, config.agent.update_call),
            tx,
            rx,
            poll: None,
            poll_interval: config.panel.poll_interval(),
            timers: Vec::new(),
            log,
            object: config.agent.object.clone(),
            mounted_at: None,
        }
    }

    #[must_use]
    pub fn model(&self) -> &PanelModel {
        &self.model
    }

    #[must_use]
    pub fn view(&self) -> PanelView {
        view::project(&self.model, Instant::now())
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poll.as_ref().is_some_and(PollHandle::is_active)
    }

    /// Fetch status, render-ready, then start polling. Idempotent while mounted.
    ///
    /// The initial fetch completes before the poll schedule exists, so it
    /// always precedes the first tick.
    pub fn mount(&mut self) -> Result<()> {
        if self.model.mounted {
            return Ok(());
        }
        let status = self.mount_fetch();
        self.log.send(ActivityEvent::PanelMounted {
            object: self.object.clone(),
            installed_version: status.installed_version,
            running: status.running,
        });
        self.mounted_at = Some(Instant::now());

        let source = self.source.clone();
        let tx = self.tx.clone();
        let handle = PollScheduler::start(
            move || {
                // A full channel means the view is not being pumped; skip the tick.
                let _ = tx.try_send(PanelMsg::StatusFetched(source.fetch()));
            },
            self.poll_interval,
        )?;
        self.poll = Some(handle);
        Ok(())
    }

    /// Click a control. Returns whether the click started an action.
    pub fn click(&mut self, action: ActionRequest) -> bool {
        let was_idle = self.model.control(action) == ControlState::Idle;
        self.dispatch(PanelMsg::Click(action));
        was_idle && self.model.control(action) == ControlState::InFlight
    }

    /// Re-fetch status without touching any control.
    pub fn refresh(&mut self) {
        self.dispatch(PanelMsg::Refresh);
    }

    /// Stop polling and ignore everything that arrives afterwards.
    pub fn unmount(&mut self) {
        if !self.model.mounted {
            return;
        }
        self.dispatch(PanelMsg::Unmount);
        self.timers.clear();
        let uptime_secs = self.mounted_at.take().map_or(0, |t| t.elapsed().as_secs());
        self.log.send(ActivityEvent::PanelUnmounted { uptime_secs });
    }

    /// Apply every message and due timer available right now.
    pub fn pump(&mut self) -> usize {
        let mut handled = self.fire_due_timers();
        while let Ok(msg) = self.rx.try_recv() {
            self.dispatch(msg);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for something to happen, then pump.
    ///
    /// Returns the number of messages and timers handled.
    pub fn step(&mut self, timeout: Duration) -> usize {
        let now = Instant::now();
        let wait = self
            .timers
            .iter()
            .map(|(due, _)| due.saturating_duration_since(now))
            .min()
            .map_or(timeout, |until_timer| until_timer.min(timeout));

        let mut handled = 0;
        match self.rx.recv_timeout(wait) {
            Ok(msg) => {
                self.dispatch(msg);
                handled += 1;
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
        }
        handled + self.pump()
    }

    /// Step until `done` holds or `timeout` elapses. Returns whether `done` held.
    pub fn run_until<F>(&mut self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut(&PanelModel) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if done(&self.model) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.step((deadline - now).min(Duration::from_millis(50)));
        }
    }

    /// Step until no action or command-issued fetch is outstanding.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        self.run_until(timeout, |m| m.in_flight().next().is_none() && m.pending_fetches == 0)
    }

    // ──────────────────── internals ────────────────────

    fn dispatch(&mut self, msg: PanelMsg) {
        if let PanelMsg::ActionFinished {
            action,
            outcome,
            elapsed,
        } = &msg
            && self.model.mounted
        {
            self.log_outcome(*action, outcome, *elapsed);
        }
        let cmd = update(&mut self.model, msg);
        for cmd in cmd.flatten() {
            self.execute(cmd);
        }
    }

    fn execute(&mut self, cmd: PanelCmd) {
        match cmd {
            PanelCmd::None | PanelCmd::Batch(_) => {}
            PanelCmd::FetchStatus => self.spawn_fetch(),
            PanelCmd::RunAction(action) => self.spawn_action(action),
            PanelCmd::ScheduleNoticeExpiry { generation, after } => {
                self.timers
                    .push((Instant::now() + after, PanelMsg::NoticeExpired(generation)));
            }
            PanelCmd::Remount => {
                self.model.reset_for_remount();
                self.mount_fetch();
            }
            PanelCmd::StopPolling => {
                if let Some(mut handle) = self.poll.take() {
                    handle.stop();
                }
            }
        }
    }

    fn mount_fetch(&mut self) -> Status {
        let status = self.source.fetch();
        self.dispatch(PanelMsg::Mounted(status.clone()));
        status
    }

    fn spawn_fetch(&mut self) {
        let source = self.source.clone();
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name("ubp-fetch".to_string())
            .spawn(move || {
                let _ = tx.send(PanelMsg::RefreshFetched(source.fetch()));
            });
        if let Err(e) = spawned {
            eprintln!("[UBP-PANEL] failed to spawn fetch worker, fetching inline: {e}");
            let status: Status = self.source.fetch();
            self.dispatch(PanelMsg::RefreshFetched(status));
        }
    }

    fn spawn_action(&mut self, action: ActionRequest) {
        self.log.send(ActivityEvent::ActionStarted {
            action: action.label(),
            method: self.executor.method_for(action).name(),
        });
        let executor = self.executor.clone();
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("ubp-{}", action.label()))
            .spawn(move || {
                let started = Instant::now();
                let outcome = executor.run(action);
                let _ = tx.send(PanelMsg::ActionFinished {
                    action,
                    outcome,
                    elapsed: started.elapsed(),
                });
            });
        if let Err(e) = spawned {
            eprintln!("[UBP-PANEL] failed to spawn {action} worker, running inline: {e}");
            let started = Instant::now();
            let outcome = self.executor.run(action);
            self.dispatch(PanelMsg::ActionFinished {
                action,
                outcome,
                elapsed: started.elapsed(),
            });
        }
    }

    fn fire_due_timers(&mut self) -> usize {
        let now = Instant::now();
        let (due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.timers).into_iter().partition(|(at, _)| *at <= now);
        self.timers = pending;
        let fired = due.len();
        for (_, msg) in due {
            self.dispatch(msg);
        }
        fired
    }

    fn log_outcome(&self, action: ActionRequest, outcome: &Outcome, elapsed: Duration) {
        let method = self.executor.method_for(action).name();
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let event = match outcome {
            Outcome::Success {
                message,
                latest_version,
                ..
            } => ActivityEvent::ActionSucceeded {
                action: action.label(),
                method,
                message: message
                    .clone()
                    .or_else(|| latest_version.as_ref().map(|v| format!("latest={v}")))
                    .unwrap_or_default(),
                duration_ms,
            },
            Outcome::Failure { message } => ActivityEvent::ActionFailed {
                action: action.label(),
                method,
                message: message.clone(),
                duration_ms,
            },
        };
        self.log.send(event);
    }
}

impl Drop for ViewController {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::agent::mock::ScriptedAgent;
    use crate::agent::rpc::AgentMethod;
    use crate::panel::notifier::MessageKind;

    const WAIT: Duration = Duration::from_secs(5);

    fn controller(agent: &Arc<ScriptedAgent>, config: &Config) -> ViewController {
        ViewController::new(
            AgentClient::new(agent.clone()),
            config,
            ActivityLoggerHandle::disabled(),
        )
    }

    #[test]
    fn mount_fetches_before_polling_starts() {
        let agent = Arc::new(ScriptedAgent::healthy("1.2.0", true, false));
        let mut c = controller(&agent, &Config::default());
        c.mount().unwrap();
        assert_eq!(agent.calls(AgentMethod::GetStatus), 1);
        assert!(c.is_polling());
        assert!(c.model().status.as_ref().unwrap().running);
    }

    #[test]
    fn mount_twice_keeps_one_poll() {
        let agent = Arc::new(ScriptedAgent::healthy("1.2.0", true, false));
        let mut c = controller(&agent, &Config::default());
        c.mount().unwrap();
        c.mount().unwrap();
        assert_eq!(agent.calls(AgentMethod::GetStatus), 1);
    }

    #[test]
    fn poll_ticks_refresh_status() {
        let agent = Arc::new(ScriptedAgent::healthy("1.2.0", false, false));
        let mut config = Config::default();
        config.panel.poll_interval_secs = 1;
        let mut c = controller(&agent, &config);
        c.mount().unwrap();

        agent.respond(
            AgentMethod::GetStatus,
            json!({"available": true, "installed_version": "1.2.0", "running_status": 1}),
        );
        assert!(c.run_until(WAIT, |m| m.status.as_ref().is_some_and(|s| s.running)));
    }

    #[test]
    fn action_outcome_refetches_and_notifies() {
        let agent = Arc::new(ScriptedAgent::healthy("1.2.0", false, false));
        let mut c = controller(&agent, &Config::default());
        c.mount().unwrap();

        agent.respond(
            AgentMethod::GetStatus,
            json!({"available": true, "installed_version": "1.2.0", "running_status": 1}),
        );
        assert!(c.click(ActionRequest::Start));
        assert!(c.settle(WAIT));

        assert_eq!(agent.calls(AgentMethod::StartService), 1);
        assert_eq!(agent.calls(AgentMethod::GetStatus), 2);
        let msg = c.model().notifier.visible().unwrap();
        assert_eq!((msg.text.as_str(), msg.kind), ("Service started", MessageKind::Success));
        assert!(c.model().is_enabled(ActionRequest::Stop));
    }

    #[test]
    fn notice_expires_through_timer() {
        let agent = Arc::new(ScriptedAgent::healthy("1.2.0", false, false));
        let mut config = Config::default();
        config.panel.notice_ttl_secs = 1;
        let mut c = controller(&agent, &config);
        c.mount().unwrap();
        c.click(ActionRequest::Start);
        assert!(c.settle(WAIT));
        assert!(c.model().notifier.visible().is_some());

        // Visibility by elapsed time and the timer agree.
        assert!(c.run_until(WAIT, |m| m.notifier.visible().is_none()));
    }

    #[test]
    fn unmount_stops_polling_and_drops_late_results() {
        let agent = Arc::new(ScriptedAgent::healthy("1.2.0", false, false));
        let gate = agent.hold(AgentMethod::StartService);
        let mut c = controller(&agent, &Config::default());
        c.mount().unwrap();
        c.click(ActionRequest::Start);
        assert!(agent.wait_for_calls(AgentMethod::StartService, 1, WAIT));

        c.unmount();
        assert!(!c.is_polling());
        gate.release();
        c.step(Duration::from_millis(200));
        assert!(c.model().notifier.visible().is_none());
        assert_eq!(agent.calls(AgentMethod::GetStatus), 1);
    }

    #[test]
    fn remount_mode_refetches_synchronously() {
        let agent = Arc::new(ScriptedAgent::healthy("1.2.0", true, false));
        let mut config = Config::default();
        config.panel.refresh_mode = crate::panel::model::RefreshMode::Remount;
        let mut c = controller(&agent, &config);
        c.mount().unwrap();
        c.click(ActionRequest::Restart);
        assert!(c.settle(WAIT));
        assert_eq!(agent.calls(AgentMethod::GetStatus), 2);
        assert!(c.model().mounted);
    }

    #[test]
    fn remount_refresh_logs_a_single_mount() {
        use crate::logger::activity::spawn_logger;
        use crate::logger::jsonl::JsonlConfig;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let (log, join) = spawn_logger(JsonlConfig {
            path: path.clone(),
            fallback_path: None,
            ..JsonlConfig::default()
        })
        .unwrap();

        let agent = Arc::new(ScriptedAgent::healthy("1.2.0", true, false));
        let mut config = Config::default();
        config.panel.refresh_mode = crate::panel::model::RefreshMode::Remount;
        let mut c = ViewController::new(AgentClient::new(agent.clone()), &config, log.clone());
        c.mount().unwrap();
        c.click(ActionRequest::Restart);
        assert!(c.settle(WAIT));
        c.unmount();
        assert_eq!(agent.calls(AgentMethod::GetStatus), 2);

        log.shutdown();
        join.join().unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let count = |name: &str| {
            raw.lines()
                .filter(|l| {
                    serde_json::from_str::<serde_json::Value>(l).unwrap()["event"] == name
                })
                .count()
        };
        assert_eq!(count("panel_mounted"), 1);
        assert_eq!(count("panel_unmounted"), 1);
    }
}
