//! Elm-style state model for the booster panel.
//!
//! All panel state lives in [`PanelModel`]. Fetch results, clicks, and action
//! outcomes arrive as [`PanelMsg`] values; side effects leave as [`PanelCmd`]
//! values that the controller executes. No I/O happens here.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::config::PanelConfig;
use crate::panel::executor::Outcome;
use crate::panel::gate::{self, ActionAvailability, ActionRequest, AvailabilityPolicy};
use crate::panel::notifier::Notifier;
use crate::panel::status::Status;

/// What a successful service action does to refresh the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Re-fetch status, keep everything else.
    #[default]
    Refetch,
    /// Reset view state and re-fetch, like reloading the page.
    Remount,
}

const CONTROL_COUNT: usize = ActionRequest::ALL.len();

/// Per-control lifecycle. There is no persistent failed state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlState {
    #[default]
    Idle,
    InFlight,
}

// ──────────────────── model ────────────────────

#[derive(Debug)]
pub struct PanelModel {
    /// Latest status; `None` until the mount fetch lands.
    pub status: Option<Status>,
    /// Result of the last version check, carried across re-fetches.
    pub latest_version: Option<String>,
    /// Text report of the last action that produced one.
    pub last_report: Option<String>,
    /// Most recent action outcome, for one-shot callers that outlive the notice.
    pub last_outcome: Option<(ActionRequest, Outcome)>,
    pub notifier: Notifier,
    pub policy: AvailabilityPolicy,
    pub refresh_mode: RefreshMode,
    pub exclusive_service_actions: bool,
    pub mounted: bool,
    pub last_fetch: Option<Instant>,
    /// Status fetches issued by commands and not yet answered.
    pub pending_fetches: u32,
    controls: [ControlState; CONTROL_COUNT],
}

impl PanelModel {
    #[must_use]
    pub fn new(policy: AvailabilityPolicy, refresh_mode: RefreshMode, notice_ttl: Duration) -> Self {
        Self {
            status: None,
            latest_version: None,
            last_report: None,
            last_outcome: None,
            notifier: Notifier::new(notice_ttl),
            policy,
            refresh_mode,
            exclusive_service_actions: false,
            mounted: false,
            last_fetch: None,
            pending_fetches: 0,
            controls: [ControlState::Idle; CONTROL_COUNT],
        }
    }

    #[must_use]
    pub fn from_config(panel: &PanelConfig) -> Self {
        let mut model = Self::new(
            panel.availability_policy,
            panel.refresh_mode,
            panel.notice_ttl(),
        );
        model.exclusive_service_actions = panel.exclusive_service_actions;
        model
    }

    #[must_use]
    pub fn control(&self, action: ActionRequest) -> ControlState {
        self.controls[action.index()]
    }

    pub(crate) fn set_control(&mut self, action: ActionRequest, state: ControlState) {
        self.controls[action.index()] = state;
    }

    #[must_use]
    pub fn in_flight(&self) -> impl Iterator<Item = ActionRequest> + '_ {
        ActionRequest::ALL
            .into_iter()
            .filter(|a| self.control(*a) == ControlState::InFlight)
    }

    /// Availability from the current status; nothing is permitted before the
    /// first fetch.
    #[must_use]
    pub fn availability(&self) -> ActionAvailability {
        self.status
            .as_ref()
            .map(|s| gate::derive(s, self.policy))
            .unwrap_or_default()
    }

    /// Whether a click on `action` would be accepted right now.
    #[must_use]
    pub fn is_enabled(&self, action: ActionRequest) -> bool {
        if !self.mounted || self.control(action) == ControlState::InFlight {
            return false;
        }
        if action == ActionRequest::Update
            && self.control(ActionRequest::CheckVersion) == ControlState::InFlight
        {
            return false;
        }
        self.availability().allows(action)
    }

    /// Drop view state the way a page reload would. In-flight controls and
    /// the visible notice survive so outcomes still land and stay readable.
    pub(crate) fn reset_for_remount(&mut self) {
        self.status = None;
        self.latest_version = None;
        self.last_report = None;
    }
}

// ──────────────────── messages ────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelMsg {
    /// Mount fetch finished; start accepting input.
    Mounted(Status),
    /// A status fetch finished (poll tick, refresh, or post-action).
    StatusFetched(Status),
    /// A command-issued fetch finished. Same as `StatusFetched` but settles
    /// the pending-fetch count.
    RefreshFetched(Status),
    Click(ActionRequest),
    ActionFinished {
        action: ActionRequest,
        outcome: Outcome,
        elapsed: Duration,
    },
    /// Manual refresh.
    Refresh,
    NoticeExpired(u64),
    Unmount,
}

// ──────────────────── commands ────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCmd {
    None,
    /// Fetch status off the controller thread and deliver `RefreshFetched`.
    FetchStatus,
    /// Run the action off the controller thread and deliver `ActionFinished`.
    RunAction(ActionRequest),
    /// Deliver `NoticeExpired(generation)` after `after`.
    ScheduleNoticeExpiry { generation: u64, after: Duration },
    /// Reset view state and fetch synchronously.
    Remount,
    /// Stop the poll schedule.
    StopPolling,
    Batch(Vec<Self>),
}

impl PanelCmd {
    /// Flatten nested batches, dropping `None`.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::None => Vec::new(),
            Self::Batch(cmds) => cmds.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }
}
