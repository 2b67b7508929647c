//! Render-ready projection of the panel model.
//!
//! Front ends draw a [`PanelView`]; they never read the model directly.

#![allow(missing_docs)]

use std::time::Instant;

use serde::Serialize;

use crate::panel::gate::ActionRequest;
use crate::panel::model::{ControlState, PanelModel};
use crate::panel::notifier::UiMessage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlView {
    pub action: ActionRequest,
    pub label: &'static str,
    pub enabled: bool,
    pub in_flight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelView {
    pub version_label: String,
    pub running_label: &'static str,
    pub update_label: &'static str,
    pub latest_label: String,
    pub status_text: Option<String>,
    pub controls: Vec<ControlView>,
    pub message: Option<UiMessage>,
    pub report: Option<String>,
}

impl PanelView {
    #[must_use]
    pub fn control(&self, action: ActionRequest) -> Option<&ControlView> {
        self.controls.iter().find(|c| c.action == action)
    }
}

#[must_use]
pub fn project(model: &PanelModel, now: Instant) -> PanelView {
    let (version_label, running_label, update_label) = match &model.status {
        None => ("Loading...".to_string(), "--", "--"),
        Some(s) if !s.available => ("Unavailable".to_string(), "Error", "--"),
        Some(s) => (
            s.installed_version
                .clone()
                .unwrap_or_else(|| "Not installed".to_string()),
            if s.running { "Running" } else { "Stopped" },
            if s.update_available {
                "Update Available"
            } else {
                "Up to date"
            },
        ),
    };

    let latest_label = model
        .status
        .as_ref()
        .and_then(|s| s.latest_version.clone())
        .unwrap_or_else(|| "--".to_string());

    let controls = ActionRequest::ALL
        .into_iter()
        .map(|action| {
            let in_flight = model.control(action) == ControlState::InFlight;
            ControlView {
                action,
                label: if in_flight {
                    action.progress_caption()
                } else {
                    action.caption()
                },
                enabled: model.is_enabled(action),
                in_flight,
            }
        })
        .collect();

    PanelView {
        version_label,
        running_label,
        update_label,
        latest_label,
        status_text: model.status.as_ref().and_then(|s| s.status_text.clone()),
        controls,
        message: model.notifier.visible_at(now).cloned(),
        report: model.last_report.clone(),
    }
}
