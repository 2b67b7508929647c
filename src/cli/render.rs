//! Text rendering of a [`PanelView`] for the terminal front ends.
//!
//! [`frame_lines`] lays the panel out as plain lines so it can be tested
//! without a terminal; [`draw`] paints those lines with crossterm.

#![allow(missing_docs)]

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

use crate::panel::gate::ActionRequest;
use crate::panel::notifier::MessageKind;
use crate::panel::view::PanelView;

/// Lines of the last report shown under the controls.
const REPORT_TAIL: usize = 8;

const FOOTER: &str = " c check · u update · s start · x stop · r restart · f refresh · q quit ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Frame,
    Heading,
    Normal,
    Good,
    Warn,
    Bad,
    Muted,
    Accent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLine {
    pub indent: u16,
    pub text: String,
    pub tone: Tone,
}

impl FrameLine {
    fn new(indent: u16, text: impl Into<String>, tone: Tone) -> Self {
        Self {
            indent,
            text: text.into(),
            tone,
        }
    }

    fn blank() -> Self {
        Self::new(0, String::new(), Tone::Normal)
    }
}

/// Keyboard shortcut bound to each control.
#[must_use]
pub const fn key_for(action: ActionRequest) -> char {
    match action {
        ActionRequest::CheckVersion => 'c',
        ActionRequest::Update => 'u',
        ActionRequest::Start => 's',
        ActionRequest::Stop => 'x',
        ActionRequest::Restart => 'r',
    }
}

#[must_use]
pub fn action_for_key(key: char) -> Option<ActionRequest> {
    ActionRequest::ALL.into_iter().find(|a| key_for(*a) == key)
}

/// Lay out one frame of the panel.
#[must_use]
pub fn frame_lines(view: &PanelView, object: &str, width: usize) -> Vec<FrameLine> {
    let mut lines = Vec::with_capacity(24);

    let header = format!(" UU Booster · {object} ");
    let pad = width.saturating_sub(header.chars().count() + 4);
    lines.push(FrameLine::new(
        0,
        format!("┌─{header}{:─<pad$}─┐", ""),
        Tone::Frame,
    ));
    lines.push(FrameLine::blank());

    lines.push(FrameLine::new(3, "Service", Tone::Heading));
    let unavailable = view.running_label == "Error";
    lines.push(FrameLine::new(
        3,
        format!("{:<18}{}", "Installed version", view.version_label),
        if unavailable { Tone::Bad } else { Tone::Normal },
    ));
    lines.push(FrameLine::new(
        3,
        format!("{:<18}{}", "Service", view.running_label),
        match view.running_label {
            "Running" => Tone::Good,
            "Error" => Tone::Bad,
            _ => Tone::Muted,
        },
    ));
    lines.push(FrameLine::new(
        3,
        format!("{:<18}{}", "Update", view.update_label),
        match view.update_label {
            "Update Available" => Tone::Warn,
            "Up to date" => Tone::Good,
            _ => Tone::Muted,
        },
    ));
    lines.push(FrameLine::new(
        3,
        format!("{:<18}{}", "Latest version", view.latest_label),
        Tone::Normal,
    ));
    if let Some(text) = &view.status_text {
        lines.push(FrameLine::new(3, text.clone(), Tone::Muted));
    }
    lines.push(FrameLine::blank());

    lines.push(FrameLine::new(3, "Actions", Tone::Heading));
    for control in &view.controls {
        let tone = if control.in_flight {
            Tone::Warn
        } else if control.enabled {
            Tone::Accent
        } else {
            Tone::Muted
        };
        lines.push(FrameLine::new(
            3,
            format!("[{}] {}", key_for(control.action), control.label),
            tone,
        ));
    }
    lines.push(FrameLine::new(3, "[f] Refresh", Tone::Accent));
    lines.push(FrameLine::blank());

    if let Some(message) = &view.message {
        let (marker, tone) = match message.kind {
            MessageKind::Success => ("✔", Tone::Good),
            MessageKind::Error => ("✖", Tone::Bad),
            MessageKind::Info => ("•", Tone::Normal),
        };
        lines.push(FrameLine::new(3, format!("{marker} {}", message.text), tone));
        lines.push(FrameLine::blank());
    }

    if let Some(report) = &view.report {
        lines.push(FrameLine::new(3, "Last report", Tone::Heading));
        let all: Vec<&str> = report.lines().collect();
        let skip = all.len().saturating_sub(REPORT_TAIL);
        for line in &all[skip..] {
            lines.push(FrameLine::new(5, (*line).to_string(), Tone::Muted));
        }
        lines.push(FrameLine::blank());
    }

    let pad = width.saturating_sub(FOOTER.chars().count() + 4);
    lines.push(FrameLine::new(
        0,
        format!("└─{FOOTER}{:─<pad$}─┘", ""),
        Tone::Frame,
    ));
    lines
}

/// Paint a frame from the top-left corner.
pub fn draw<W: Write>(out: &mut W, lines: &[FrameLine], color: bool) -> io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
    for (row, line) in (0u16..).zip(lines) {
        queue!(out, MoveTo(line.indent, row))?;
        if color {
            queue!(out, SetForegroundColor(tone_color(line.tone)))?;
            if matches!(line.tone, Tone::Frame | Tone::Heading) {
                queue!(out, SetAttribute(Attribute::Bold))?;
            }
        }
        write!(out, "{}", line.text)?;
        if color {
            queue!(out, SetAttribute(Attribute::Reset))?;
        }
    }
    out.flush()
}

const fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Frame => Color::Cyan,
        Tone::Heading | Tone::Normal => Color::White,
        Tone::Good => Color::Green,
        Tone::Warn => Color::Yellow,
        Tone::Bad => Color::Red,
        Tone::Muted => Color::DarkGrey,
        Tone::Accent => Color::Blue,
    }
}

/// One-line digest used by `watch`.
#[must_use]
pub fn summary_line(view: &PanelView) -> String {
    let enabled: Vec<&str> = view
        .controls
        .iter()
        .filter(|c| c.enabled)
        .map(|c| c.action.label())
        .collect();
    let mut line = format!(
        "version={} service={} update={} latest={} actions={}",
        view.version_label,
        view.running_label,
        view.update_label,
        view.latest_label,
        if enabled.is_empty() {
            "-".to_string()
        } else {
            enabled.join(",")
        },
    );
    if let Some(message) = &view.message {
        line.push_str(&format!(" notice={:?}", message.text));
    }
    line
}
