//! Pure update function for the panel.
//!
//! `update()` applies one message to the model and returns the side effects
//! for the controller to run. No I/O happens here.

use std::time::Instant;

use crate::panel::executor::{Outcome, version_check_notice};
use crate::panel::gate::ActionRequest;
use crate::panel::model::{ControlState, PanelCmd, PanelModel, PanelMsg, RefreshMode};
use crate::panel::notifier::MessageKind;
use crate::panel::status::Status;

/// Shown when exclusive mode refuses a click.
pub const BUSY_NOTICE: &str = "Another action is in progress";

/// Apply a message to the model and return the next command.
pub fn update(model: &mut PanelModel, msg: PanelMsg) -> PanelCmd {
    match msg {
        PanelMsg::Mounted(status) => {
            model.mounted = true;
            apply_status(model, status);
            PanelCmd::None
        }

        PanelMsg::StatusFetched(status) => {
            if model.mounted {
                apply_status(model, status);
            }
            PanelCmd::None
        }

        PanelMsg::RefreshFetched(status) => {
            model.pending_fetches = model.pending_fetches.saturating_sub(1);
            if model.mounted {
                apply_status(model, status);
            }
            PanelCmd::None
        }

        PanelMsg::Click(action) => handle_click(model, action),

        PanelMsg::ActionFinished {
            action, outcome, ..
        } => {
            if !model.mounted {
                return PanelCmd::None;
            }
            model.set_control(action, ControlState::Idle);
            model.last_outcome = Some((action, outcome.clone()));
            apply_outcome(model, action, outcome)
        }

        PanelMsg::Refresh => {
            if !model.mounted {
                return PanelCmd::None;
            }
            model.pending_fetches += 1;
            PanelCmd::FetchStatus
        }

        PanelMsg::NoticeExpired(generation) => {
            model.notifier.expire(generation);
            PanelCmd::None
        }

        PanelMsg::Unmount => {
            if !model.mounted {
                return PanelCmd::None;
            }
            model.mounted = false;
            PanelCmd::StopPolling
        }
    }
}

fn apply_status(model: &mut PanelModel, status: Status) {
    model.last_fetch = Some(Instant::now());
    model.status = Some(match &model.latest_version {
        Some(latest) => status.with_latest_version(latest),
        None => status,
    });
}

fn handle_click(model: &mut PanelModel, action: ActionRequest) -> PanelCmd {
    if !model.is_enabled(action) {
        return PanelCmd::None;
    }
    if model.exclusive_service_actions
        && action.mutates_service()
        && model.in_flight().any(ActionRequest::mutates_service)
    {
        return notify(model, BUSY_NOTICE, MessageKind::Info);
    }
    model.set_control(action, ControlState::InFlight);
    PanelCmd::RunAction(action)
}

fn apply_outcome(model: &mut PanelModel, action: ActionRequest, outcome: Outcome) -> PanelCmd {
    match outcome {
        Outcome::Success {
            message,
            output,
            latest_version,
        } => {
            if output.is_some() {
                model.last_report = output;
            }

            if action == ActionRequest::CheckVersion {
                let Some(latest) = latest_version else {
                    let text = message.unwrap_or_else(|| "Already up to date".to_string());
                    return notify(model, text, MessageKind::Success);
                };
                let installed = model
                    .status
                    .as_ref()
                    .and_then(|s| s.installed_version.as_deref());
                let (text, kind) = version_check_notice(installed, &latest);
                model.status = model.status.as_ref().map(|s| s.with_latest_version(&latest));
                model.latest_version = Some(latest);
                return notify(model, text, kind);
            }

            let text = message.unwrap_or_else(|| format!("{} complete", action.caption()));
            let expiry = notify(model, text, MessageKind::Success);
            let refresh = match model.refresh_mode {
                RefreshMode::Refetch => {
                    model.pending_fetches += 1;
                    PanelCmd::FetchStatus
                }
                RefreshMode::Remount => PanelCmd::Remount,
            };
            PanelCmd::Batch(vec![expiry, refresh])
        }
        Outcome::Failure { message } => notify(model, message, MessageKind::Error),
    }
}

fn notify(model: &mut PanelModel, text: impl Into<String>, kind: MessageKind) -> PanelCmd {
    let generation = model.notifier.show(text, kind);
    PanelCmd::ScheduleNoticeExpiry {
        generation,
        after: model.notifier.ttl(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;
    use crate::panel::gate::AvailabilityPolicy;

    fn status(running: bool, update_available: bool) -> Status {
        Status {
            available: true,
            installed_version: Some("1.2.0".into()),
            running,
            update_available,
            latest_version: None,
            status_text: None,
        }
    }

    fn mounted(s: Status) -> PanelModel {
        let mut model = PanelModel::new(
            AvailabilityPolicy::Strict,
            RefreshMode::Refetch,
            Duration::from_secs(5),
        );
        update(&mut model, PanelMsg::Mounted(s));
        model
    }

    fn finished(action: ActionRequest, outcome: Outcome) -> PanelMsg {
        PanelMsg::ActionFinished {
            action,
            outcome,
            elapsed: Duration::from_millis(3),
        }
    }

    fn visible_text(model: &PanelModel) -> Option<(String, MessageKind)> {
        model.notifier.visible().map(|m| (m.text.clone(), m.kind))
    }

    #[test]
    fn double_click_runs_once() {
        let mut model = mounted(status(false, false));
        assert_eq!(
            update(&mut model, PanelMsg::Click(ActionRequest::Start)),
            PanelCmd::RunAction(ActionRequest::Start)
        );
        assert_eq!(
            update(&mut model, PanelMsg::Click(ActionRequest::Start)),
            PanelCmd::None
        );
        assert_eq!(model.control(ActionRequest::Start), ControlState::InFlight);
    }

    #[test]
    fn outcome_is_kept_after_notice() {
        let mut model = mounted(status(false, false));
        update(&mut model, PanelMsg::Click(ActionRequest::Start));
        let failure = Outcome::Failure {
            message: "init script missing".into(),
        };
        update(&mut model, finished(ActionRequest::Start, failure.clone()));
        model.notifier.dismiss();
        assert_eq!(model.last_outcome, Some((ActionRequest::Start, failure)));
    }

    #[test]
    fn disabled_control_ignores_click() {
        let mut model = mounted(status(true, false));
        assert_eq!(
            update(&mut model, PanelMsg::Click(ActionRequest::Start)),
            PanelCmd::None
        );
        assert_eq!(
            update(&mut model, PanelMsg::Click(ActionRequest::Update)),
            PanelCmd::None
        );
    }

    #[test]
    fn newer_version_enables_update() {
        let mut model = mounted(status(true, false));
        update(&mut model, PanelMsg::Click(ActionRequest::CheckVersion));
        let cmd = update(
            &mut model,
            finished(
                ActionRequest::CheckVersion,
                Outcome::Success {
                    message: None,
                    output: Some("Latest version: 1.3.0".into()),
                    latest_version: Some("1.3.0".into()),
                },
            ),
        );

        assert!(matches!(cmd, PanelCmd::ScheduleNoticeExpiry { .. }));
        assert_eq!(
            visible_text(&model),
            Some(("New version available!".into(), MessageKind::Info))
        );
        assert!(model.is_enabled(ActionRequest::Update));
        assert_eq!(model.latest_version.as_deref(), Some("1.3.0"));
    }

    #[test]
    fn latest_version_survives_refetch() {
        let mut model = mounted(status(true, false));
        model.latest_version = Some("1.3.0".into());
        update(&mut model, PanelMsg::StatusFetched(status(true, false)));
        let s = model.status.as_ref().unwrap();
        assert!(s.update_available);
        assert_eq!(s.latest_version.as_deref(), Some("1.3.0"));
    }

    #[test]
    fn same_version_reports_up_to_date() {
        let mut model = mounted(status(true, false));
        update(&mut model, PanelMsg::Click(ActionRequest::CheckVersion));
        update(
            &mut model,
            finished(
                ActionRequest::CheckVersion,
                Outcome::Success {
                    message: None,
                    output: None,
                    latest_version: Some("1.2.0".into()),
                },
            ),
        );
        assert_eq!(
            visible_text(&model),
            Some(("Already up to date".into(), MessageKind::Success))
        );
        assert!(!model.is_enabled(ActionRequest::Update));
    }

    #[test]
    fn update_failure_reenables_without_refresh() {
        let mut model = mounted(status(true, true));
        update(&mut model, PanelMsg::Click(ActionRequest::Update));
        assert!(!model.is_enabled(ActionRequest::Update));

        let cmd = update(
            &mut model,
            finished(
                ActionRequest::Update,
                Outcome::Failure {
                    message: "disk full".into(),
                },
            ),
        );
        let cmds = cmd.flatten();
        assert_eq!(cmds.len(), 1);
        assert!(matches!(cmds[0], PanelCmd::ScheduleNoticeExpiry { .. }));
        assert_eq!(
            visible_text(&model),
            Some(("disk full".into(), MessageKind::Error))
        );
        assert!(model.is_enabled(ActionRequest::Update));
        assert_eq!(model.pending_fetches, 0);
    }

    #[test]
    fn service_success_refetches() {
        let mut model = mounted(status(false, false));
        update(&mut model, PanelMsg::Click(ActionRequest::Start));
        let cmds = update(
            &mut model,
            finished(
                ActionRequest::Start,
                Outcome::Success {
                    message: Some("Service started".into()),
                    output: None,
                    latest_version: None,
                },
            ),
        )
        .flatten();
        assert!(cmds.contains(&PanelCmd::FetchStatus));
        assert_eq!(model.pending_fetches, 1);

        update(&mut model, PanelMsg::RefreshFetched(status(true, false)));
        assert_eq!(model.pending_fetches, 0);
        assert!(model.is_enabled(ActionRequest::Stop));
    }

    #[test]
    fn remount_mode_requests_remount() {
        let mut model = mounted(status(true, false));
        model.refresh_mode = RefreshMode::Remount;
        update(&mut model, PanelMsg::Click(ActionRequest::Restart));
        let cmds = update(
            &mut model,
            finished(
                ActionRequest::Restart,
                Outcome::Success {
                    message: Some("Service restarted".into()),
                    output: None,
                    latest_version: None,
                },
            ),
        )
        .flatten();
        assert!(cmds.contains(&PanelCmd::Remount));
        assert!(!cmds.contains(&PanelCmd::FetchStatus));
    }

    #[test]
    fn exclusive_mode_refuses_second_service_action() {
        let mut model = mounted(status(true, true));
        model.exclusive_service_actions = true;
        update(&mut model, PanelMsg::Click(ActionRequest::Update));
        let cmd = update(&mut model, PanelMsg::Click(ActionRequest::Restart));
        assert!(matches!(cmd, PanelCmd::ScheduleNoticeExpiry { .. }));
        assert_eq!(model.control(ActionRequest::Restart), ControlState::Idle);
        assert_eq!(
            visible_text(&model),
            Some((BUSY_NOTICE.into(), MessageKind::Info))
        );
        // Version checks are not service actions.
        assert_eq!(
            update(&mut model, PanelMsg::Click(ActionRequest::CheckVersion)),
            PanelCmd::RunAction(ActionRequest::CheckVersion)
        );
    }

    #[test]
    fn default_allows_concurrent_service_actions() {
        let mut model = mounted(status(true, true));
        update(&mut model, PanelMsg::Click(ActionRequest::Update));
        assert_eq!(
            update(&mut model, PanelMsg::Click(ActionRequest::Restart)),
            PanelCmd::RunAction(ActionRequest::Restart)
        );
    }

    #[test]
    fn late_messages_after_unmount_are_dropped() {
        let mut model = mounted(status(false, false));
        update(&mut model, PanelMsg::Click(ActionRequest::Start));
        assert_eq!(update(&mut model, PanelMsg::Unmount), PanelCmd::StopPolling);
        assert_eq!(update(&mut model, PanelMsg::Unmount), PanelCmd::None);

        let before = model.status.clone();
        let cmd = update(
            &mut model,
            finished(
                ActionRequest::Start,
                Outcome::Success {
                    message: Some("Service started".into()),
                    output: None,
                    latest_version: None,
                },
            ),
        );
        assert_eq!(cmd, PanelCmd::None);
        update(&mut model, PanelMsg::StatusFetched(status(true, false)));
        assert_eq!(model.status, before);
        assert!(model.notifier.visible().is_none());
    }

    #[test]
    fn expired_notice_for_old_generation_is_noop() {
        let mut model = mounted(status(true, false));
        let PanelCmd::ScheduleNoticeExpiry { generation: old, .. } =
            notify(&mut model, "first", MessageKind::Info)
        else {
            panic!("expected expiry");
        };
        notify(&mut model, "second", MessageKind::Info);
        update(&mut model, PanelMsg::NoticeExpired(old));
        assert_eq!(visible_text(&model).unwrap().0, "second");
    }

    #[test]
    fn execute_update_output_becomes_report() {
        let mut model = mounted(status(false, true));
        update(&mut model, PanelMsg::Click(ActionRequest::Update));
        update(
            &mut model,
            finished(
                ActionRequest::Update,
                Outcome::Success {
                    message: Some("Update complete".into()),
                    output: Some("Installed 1.3.0".into()),
                    latest_version: None,
                },
            ),
        );
        assert_eq!(model.last_report.as_deref(), Some("Installed 1.3.0"));
    }

    // ──────────────────── reducer properties ────────────────────

    fn arb_action() -> impl Strategy<Value = ActionRequest> {
        prop::sample::select(ActionRequest::ALL.to_vec())
    }

    fn arb_msg() -> impl Strategy<Value = PanelMsg> {
        prop_oneof![
            arb_action().prop_map(PanelMsg::Click),
            (arb_action(), any::<bool>()).prop_map(|(action, ok)| finished(
                action,
                if ok {
                    Outcome::Success {
                        message: Some("ok".into()),
                        output: None,
                        latest_version: Some("1.3.0".into()),
                    }
                } else {
                    Outcome::Failure {
                        message: "nope".into(),
                    }
                }
            )),
            (any::<bool>(), any::<bool>())
                .prop_map(|(running, update)| PanelMsg::StatusFetched(status(running, update))),
            Just(PanelMsg::StatusFetched(Status::unavailable())),
            Just(PanelMsg::Refresh),
        ]
    }

    proptest! {
        #[test]
        fn run_action_only_from_idle(msgs in prop::collection::vec(arb_msg(), 1..40)) {
            let mut model = mounted(status(false, false));
            for msg in msgs {
                let before = match &msg {
                    PanelMsg::Click(a) => Some((*a, model.control(*a), model.is_enabled(*a))),
                    _ => None,
                };
                let cmd = update(&mut model, msg);
                if let PanelCmd::RunAction(a) = cmd {
                    let (clicked, state, enabled) = before.unwrap();
                    prop_assert_eq!(clicked, a);
                    prop_assert_eq!(state, ControlState::Idle);
                    prop_assert!(enabled);
                    prop_assert_eq!(model.control(a), ControlState::InFlight);
                }
            }
        }

        #[test]
        fn unavailable_status_disables_all(msgs in prop::collection::vec(arb_msg(), 0..20)) {
            let mut model = mounted(status(false, false));
            for msg in msgs {
                update(&mut model, msg);
            }
            update(&mut model, PanelMsg::StatusFetched(Status::unavailable()));
            for action in ActionRequest::ALL {
                prop_assert!(!model.is_enabled(action));
            }
        }
    }
}
